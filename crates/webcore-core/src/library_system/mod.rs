//! # Webcore Library System
//!
//! Lifecycle management for pluggable libraries (databases, caches,
//! messaging clients, authentication stores, ...).
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`traits`]**: the [`Library`], [`Connector`] and [`LibraryLoader`]
//!   contracts every pluggable component satisfies.
//! - **[`args`]**: [`LibraryArgs`], the typed construction arguments handed to
//!   a loader.
//! - **[`loader`]**: ready-made loaders ([`FnLoader`], [`DefaultLoader`]) and
//!   the shared install-then-connect routine.
//! - **[`registry`]**: the [`LibraryRegistry`], a deduplicating cache of live
//!   instances keyed by `(loader name, instance key)`.
//! - **[`manager`]**: the [`LibraryManager`] kernel component that
//!   materializes configured libraries at start and sweeps them at stop.
//! - **[`error`]**: [`LibrarySystemError`](error::LibrarySystemError).
pub mod args;
pub mod error;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod traits;

pub use args::LibraryArgs;
pub use error::LibrarySystemError;
pub use loader::{construct, DefaultLoader, FnLoader};
pub use manager::LibraryManager;
pub use registry::{downcast_library, InstanceKey, LibraryRegistry, ShutdownReport};
pub use traits::{AsAny, Connector, Library, LibraryLoader, DEFAULT_INSTANCE_KEY};

#[cfg(test)]
mod tests;
