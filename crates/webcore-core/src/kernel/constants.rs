/// Application name
pub const APP_NAME: &str = "webcore";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file name (without extension)
pub const DEFAULT_CONFIG_NAME: &str = "config";

/// Default configuration file extension
pub const DEFAULT_CONFIG_EXT: &str = "yaml";

/// Key prefix under which module-specific configuration sections live
pub const MODULE_CONFIG_PREFIX: &str = "module";

/// Loader name prefix for database libraries (`db:<driver>`)
pub const DATABASE_LOADER_PREFIX: &str = "db";

/// Loader name prefix for cache libraries (`cache:<driver>`)
pub const CACHE_LOADER_PREFIX: &str = "cache";

/// Loader name prefix for pub/sub libraries (`pubsub:<driver>`)
pub const PUBSUB_LOADER_PREFIX: &str = "pubsub";

/// Loader name prefix for Kafka producer libraries (`kafka.producer:<driver>`)
pub const KAFKA_PRODUCER_LOADER_PREFIX: &str = "kafka.producer";

/// Loader name prefix for Kafka consumer libraries (`kafka.consumer:<driver>`)
pub const KAFKA_CONSUMER_LOADER_PREFIX: &str = "kafka.consumer";

/// Loader name prefix for authentication store libraries (`auth.store:<driver>`)
pub const AUTH_STORE_LOADER_PREFIX: &str = "auth.store";

/// Loader name prefix for authentication libraries (`authn:<type>`)
pub const AUTHN_LOADER_PREFIX: &str = "authn";

/// Builds a `<kind>:<driver>` loader name.
pub fn loader_name(prefix: &str, driver: &str) -> String {
    format!("{}:{}", prefix, driver)
}
