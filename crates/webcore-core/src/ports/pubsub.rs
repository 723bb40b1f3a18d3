use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::kernel::error::Result;

/// A delivered message.
#[derive(Debug, Clone, PartialEq)]
pub struct PubSubMessage {
    pub id: String,
    pub data: Vec<u8>,
    pub publish_time: SystemTime,
    pub attributes: HashMap<String, String>,
    /// 1 on first delivery, incremented on every redelivery.
    pub delivery_attempt: u32,
}

impl PubSubMessage {
    pub fn data_as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// Consumer of delivered batches.
#[async_trait]
pub trait MessageReceiver: Send + Sync {
    /// Process a batch and return `message id -> acked`. Missing ids and
    /// `false` entries are redelivered; an error nacks the whole batch.
    async fn consume(&self, messages: &[PubSubMessage]) -> Result<HashMap<String, bool>>;
}

/// Topic publisher plus subscription consumer.
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Publish a message and return its id.
    async fn publish(&self, data: Vec<u8>, attributes: HashMap<String, String>) -> Result<String>;

    /// Set the receiver batches are delivered to. Replaces any previous one.
    fn register_receiver(&self, receiver: Arc<dyn MessageReceiver>);

    /// Begin delivering to the registered receiver in the background until
    /// `token` is cancelled or the library is uninstalled.
    async fn start_receiving(&self, token: CancellationToken) -> Result<()>;
}
