use std::fmt;
use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthStore;
use crate::config::AppConfig;
use crate::kernel::constants::{self, loader_name};
use crate::kernel::error::Result;
use crate::library_system::{LibraryArgs, LibraryRegistry, LibrarySystemError, ShutdownReport};
use crate::ports::{CacheMemory, Database, Kafka, PubSub};

/// Shared dependencies injected into libraries and modules.
///
/// Replaces any global accessor: the context is built once at startup and
/// handed to whoever needs configuration or library resolution.
pub struct AppContext {
    config: AppConfig,
    registry: Arc<LibraryRegistry>,
    shutdown: CancellationToken,
}

impl AppContext {
    pub fn new(config: AppConfig, registry: Arc<LibraryRegistry>) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<LibraryRegistry> {
        &self.registry
    }

    /// Token cancelled when the application shuts down. Background work
    /// started by libraries should stop when it fires.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Materialize the libraries the configuration asks for.
    ///
    /// Database, cache, pub/sub and the Kafka producer are each loaded as
    /// singletons from `db:<driver>`, `cache:<driver>`, `pubsub:<driver>` and
    /// `kafka.producer:<driver>` when their section is configured. A configured kind without a registered loader
    /// is an error.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let config = &self.config;

        if config.database.is_configured() {
            let name = loader_name(constants::DATABASE_LOADER_PREFIX, &config.database.driver);
            self.load_configured(&name, &config.database).await?;
        }

        if config.cache.is_configured() {
            let name = loader_name(constants::CACHE_LOADER_PREFIX, &config.cache.driver);
            self.load_configured(&name, &config.cache).await?;
        }

        if config.pubsub.is_configured() {
            let name = loader_name(constants::PUBSUB_LOADER_PREFIX, &config.pubsub.driver);
            self.load_configured(&name, &config.pubsub).await?;
        }

        if config.kafka.is_configured() {
            let name = loader_name(constants::KAFKA_PRODUCER_LOADER_PREFIX, &config.kafka.driver);
            self.load_configured(&name, &config.kafka).await?;
        }

        info!("Application context started");
        Ok(())
    }

    async fn load_configured<C: Serialize>(self: &Arc<Self>, name: &str, section: &C) -> Result<()> {
        let loader = self
            .registry
            .loader(name)
            .ok_or_else(|| LibrarySystemError::LoaderNotFound { name: name.to_string() })?;
        let args = LibraryArgs::new().with_context(self.clone()).with_config(section)?;
        self.registry.load_singleton_with(&loader, args).await?;
        debug!("Configured library {} loaded", name);
        Ok(())
    }

    /// Cancel the shutdown token and sweep every loaded library.
    pub async fn destroy(&self) -> ShutdownReport {
        self.shutdown.cancel();
        self.registry.shutdown_all().await
    }

    /// The configured database singleton, if it was materialized.
    pub async fn database(&self) -> Option<Arc<dyn Database>> {
        let name = loader_name(constants::DATABASE_LOADER_PREFIX, &self.config.database.driver);
        self.registry.get_singleton(&name).await?.into_database()
    }

    /// The configured cache singleton, if it was materialized.
    pub async fn cache(&self) -> Option<Arc<dyn CacheMemory>> {
        let name = loader_name(constants::CACHE_LOADER_PREFIX, &self.config.cache.driver);
        self.registry.get_singleton(&name).await?.into_cache()
    }

    /// The configured pub/sub singleton, if it was materialized.
    pub async fn pubsub(&self) -> Option<Arc<dyn PubSub>> {
        let name = loader_name(constants::PUBSUB_LOADER_PREFIX, &self.config.pubsub.driver);
        self.registry.get_singleton(&name).await?.into_pubsub()
    }

    /// The configured Kafka producer singleton, if it was materialized.
    pub async fn kafka(&self) -> Option<Arc<dyn Kafka>> {
        let name = loader_name(constants::KAFKA_PRODUCER_LOADER_PREFIX, &self.config.kafka.driver);
        self.registry.get_singleton(&name).await?.into_kafka()
    }

    /// The configured auth store singleton, if it was materialized.
    pub async fn auth_store(&self) -> Option<Arc<dyn AuthStore>> {
        let name = loader_name(constants::AUTH_STORE_LOADER_PREFIX, &self.config.auth.store);
        self.registry.get_singleton(&name).await?.into_auth_store()
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("app", &self.config.app.name)
            .field("registry", &self.registry)
            .field("cancelled", &self.shutdown.is_cancelled())
            .finish()
    }
}
