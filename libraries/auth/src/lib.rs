//! # Webcore Auth Libraries
//!
//! - `auth.store:yaml` → [`YamlAuthStore`], identities and roles read from a
//!   YAML document.
//! - `authn:apikey` → [`ApiKeyAuthentication`], the authentication chain
//!   built around [`ApiKeyValidator`] and the configured store.
pub mod apikey;
pub mod authn;
pub mod store;

pub use apikey::ApiKeyValidator;
pub use authn::ApiKeyAuthentication;
pub use store::{YamlAuthStore, YamlStoreDocument};

/// Loader name of the YAML store
pub const STORE_LOADER: &str = "auth.store:yaml";
/// Loader name of the API-key authentication library
pub const AUTHN_LOADER: &str = "authn:apikey";
