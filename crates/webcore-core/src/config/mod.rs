//! # Webcore Configuration
//!
//! Layered configuration binding for the application and its modules.
//!
//! A [`ConfigLoader`] merges a type's [`Configurable::defaults`], an optional
//! configuration file (JSON, or YAML/TOML behind the `yaml-config` and
//! `toml-config` features), automatic environment overrides and explicit
//! environment bindings into a [`ConfigData`] tree, then binds the tree to a
//! `serde` struct such as [`AppConfig`]. Module settings live under
//! `module.<name>` and are bound with [`ConfigLoader::load_module`].
pub mod app;
pub mod data;
pub mod error;
pub mod loader;

pub use app::{AppConfig, AppSection, AuthConfig, CacheConfig, DatabaseConfig, KafkaConfig, LoggingConfig, PubSubConfig};
pub use data::{ConfigData, ConfigFormat};
pub use error::ConfigError;
pub use loader::{ConfigLoader, Configurable, EnvSource, ProcessEnv};

#[cfg(test)]
mod tests;
