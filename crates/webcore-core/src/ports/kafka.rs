use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::kernel::error::Result;

/// Handler of records read by a consumer library.
#[async_trait]
pub trait KafkaConsumer: Send + Sync {
    /// Handle one record. `Ok(true)` commits it; `Ok(false)` or an error
    /// leaves it uncommitted.
    async fn consume(&self, message: &[u8]) -> Result<bool>;
}

/// Topic-addressed log producer and reader.
#[async_trait]
pub trait Kafka: Send + Sync {
    async fn publish(&self, topic: &str, message: Vec<u8>) -> Result<()>;

    /// Records published to `topic` from now on. The stream ends when the
    /// library disconnects.
    async fn consume(&self, topic: &str) -> Result<mpsc::Receiver<Vec<u8>>>;
}
