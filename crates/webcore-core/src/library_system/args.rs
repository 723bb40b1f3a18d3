use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::ConfigError;
use crate::kernel::context::AppContext;
use crate::kernel::error::Result;
use crate::library_system::error::LibrarySystemError;
use crate::ports::{KafkaConsumer, MessageReceiver};

/// Construction arguments handed to a [`LibraryLoader`](super::LibraryLoader).
///
/// The configuration travels as a JSON value and each library binds it to its
/// own `Deserialize` struct with [`LibraryArgs::config_as`], so a mismatch is
/// reported as a descriptive [`LibrarySystemError::InvalidArguments`].
#[derive(Clone, Default)]
pub struct LibraryArgs {
    context: Option<Arc<AppContext>>,
    config: Value,
    receiver: Option<Arc<dyn MessageReceiver>>,
    kafka_consumer: Option<Arc<dyn KafkaConsumer>>,
}

impl LibraryArgs {
    /// Empty arguments: no context, null config, no receiver.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: Arc<AppContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Attach a configuration value by serializing `config`. A value that
    /// has no JSON form is a [`ConfigError::Serialization`].
    pub fn with_config<T: Serialize>(mut self, config: &T) -> Result<Self> {
        self.config = serde_json::to_value(config).map_err(|e| ConfigError::serialization("json", e))?;
        Ok(self)
    }

    pub fn with_config_value(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_receiver(mut self, receiver: Arc<dyn MessageReceiver>) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Record handler for Kafka consumer libraries.
    pub fn with_kafka_consumer(mut self, consumer: Arc<dyn KafkaConsumer>) -> Self {
        self.kafka_consumer = Some(consumer);
        self
    }

    pub fn context(&self) -> Option<&Arc<AppContext>> {
        self.context.as_ref()
    }

    /// The application context, or an error naming `library` when absent.
    pub fn require_context(&self, library: &str) -> Result<&Arc<AppContext>> {
        self.context
            .as_ref()
            .ok_or_else(|| LibrarySystemError::invalid_arguments(library, "an application context is required").into())
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Bind the configuration to `T`. A null configuration binds as an empty
    /// object so structs with `#[serde(default)]` fields still succeed.
    pub fn config_as<T: DeserializeOwned>(&self, library: &str) -> Result<T> {
        let value = match &self.config {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other.clone(),
        };
        serde_json::from_value(value).map_err(|e| {
            LibrarySystemError::invalid_arguments(
                library,
                format!("config does not match {}: {}", std::any::type_name::<T>(), e),
            )
            .into()
        })
    }

    pub fn receiver(&self) -> Option<&Arc<dyn MessageReceiver>> {
        self.receiver.as_ref()
    }

    pub fn kafka_consumer(&self) -> Option<&Arc<dyn KafkaConsumer>> {
        self.kafka_consumer.as_ref()
    }
}

impl fmt::Debug for LibraryArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryArgs")
            .field("has_context", &self.context.is_some())
            .field("config", &self.config)
            .field("has_receiver", &self.receiver.is_some())
            .field("has_kafka_consumer", &self.kafka_consumer.is_some())
            .finish()
    }
}
