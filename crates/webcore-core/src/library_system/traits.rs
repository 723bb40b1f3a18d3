use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::AuthStore;
use crate::kernel::error::Result;
use crate::library_system::args::LibraryArgs;
use crate::ports::{CacheMemory, Database, Kafka, PubSub};

/// Instance key under which singleton libraries are cached.
pub const DEFAULT_INSTANCE_KEY: &str = "default";

/// Conversion of a shared value into `Arc<dyn Any>` for concrete downcasts.
///
/// Blanket-implemented for every `'static + Send + Sync` type, so library
/// authors never implement it by hand.
pub trait AsAny: Any + Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Connection facet of a library that manages an external connection.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open the connection. Called once, right after a successful install.
    async fn connect(&self) -> Result<()>;

    /// Close the connection. Called before uninstall.
    async fn disconnect(&self) -> Result<()>;
}

/// Core trait that all pluggable libraries must implement
#[async_trait]
pub trait Library: AsAny + Debug {
    /// Short description of the library kind, used in logs
    fn kind(&self) -> &str;

    /// Install the library from its construction arguments
    async fn install(&self, args: &LibraryArgs) -> Result<()>;

    /// Release everything acquired by `install`
    async fn uninstall(&self) -> Result<()>;

    /// The connection facet, for connection-bearing libraries.
    /// The default implementation reports a library without a connection.
    fn connector(&self) -> Option<&dyn Connector> {
        None
    }

    /// Expose this library through the [`Database`] port.
    fn into_database(self: Arc<Self>) -> Option<Arc<dyn Database>> {
        None
    }

    /// Expose this library through the [`CacheMemory`] port.
    fn into_cache(self: Arc<Self>) -> Option<Arc<dyn CacheMemory>> {
        None
    }

    /// Expose this library through the [`PubSub`] port.
    fn into_pubsub(self: Arc<Self>) -> Option<Arc<dyn PubSub>> {
        None
    }

    /// Expose this library through the [`Kafka`] port.
    fn into_kafka(self: Arc<Self>) -> Option<Arc<dyn Kafka>> {
        None
    }

    /// Expose this library through the [`AuthStore`] port.
    fn into_auth_store(self: Arc<Self>) -> Option<Arc<dyn AuthStore>> {
        None
    }
}

/// A named factory that constructs one kind of [`Library`].
///
/// `init` must construct, install and (when applicable) connect a new
/// instance, returning it ready to use or the first error encountered.
#[async_trait]
pub trait LibraryLoader: Send + Sync {
    /// Bind the registration name. Called by the registry constructor.
    fn set_name(&mut self, name: &str);

    /// The registration name
    fn name(&self) -> &str;

    /// Build a ready-to-use library instance
    async fn init(&self, args: LibraryArgs) -> Result<Arc<dyn Library>>;
}
