use serde::{Deserialize, Serialize};

use crate::config::data::ConfigData;
use crate::config::loader::Configurable;

/// Application-wide configuration, bound from `config.yaml` and the
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub pubsub: PubSubConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub environment: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: crate::kernel::constants::APP_NAME.to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Database connection settings. Loaded when `host` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: "memory".to_string(),
            host: String::new(),
            port: 0,
            name: "app".to_string(),
            user: String::new(),
            password: String::new(),
        }
    }
}

impl DatabaseConfig {
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
    }
}

/// Cache settings. Loaded when `host` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub driver: String,
    pub host: String,
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            driver: "memory".to_string(),
            host: String::new(),
            default_ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
    }
}

/// Pub/sub settings. Loaded when both `project_id` and `topic` are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PubSubConfig {
    pub driver: String,
    pub project_id: String,
    pub topic: String,
    pub subscription: String,
    pub max_attempts: u32,
    pub batch_size: usize,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            driver: "memory".to_string(),
            project_id: String::new(),
            topic: String::new(),
            subscription: String::new(),
            max_attempts: 3,
            batch_size: 10,
        }
    }
}

impl PubSubConfig {
    pub fn is_configured(&self) -> bool {
        !self.project_id.is_empty() && !self.topic.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Authentication scheme; must match the validator's name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Driver of the `auth.store:<store>` library.
    pub store: String,
    pub users_file: String,
    pub header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            kind: "apikey".to_string(),
            store: "yaml".to_string(),
            users_file: "users.yaml".to_string(),
            header: "X-API-Key".to_string(),
        }
    }
}

/// Kafka settings. The producer is loaded when `brokers` is non-empty;
/// consumers are loaded by the modules that own their handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub driver: String,
    pub brokers: Vec<String>,
    pub group_id: String,
    /// Topics a consumer subscribes to
    pub topics: Vec<String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            driver: "memory".to_string(),
            brokers: Vec::new(),
            group_id: String::new(),
            topics: Vec::new(),
        }
    }
}

impl KafkaConfig {
    pub fn is_configured(&self) -> bool {
        !self.brokers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Configurable for AppConfig {
    fn defaults() -> ConfigData {
        ConfigData::from_serialize(&AppConfig::default()).unwrap_or_default()
    }

    fn env_bindings() -> Vec<(&'static str, &'static str)> {
        vec![
            ("database.host", "DB_HOST"),
            ("database.port", "DB_PORT"),
            ("database.user", "DB_USER"),
            ("database.password", "DB_PASSWORD"),
            ("cache.host", "REDIS_HOST"),
            ("pubsub.project_id", "GOOGLE_CLOUD_PROJECT"),
            ("kafka.brokers", "KAFKA_BROKERS"),
            ("logging.level", "LOG_LEVEL"),
        ]
    }
}
