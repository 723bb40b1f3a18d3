//! # Webcore In-Memory Libraries
//!
//! Process-local implementations of the database, cache, pub/sub and Kafka
//! ports, registered under the `memory` driver:
//!
//! - `db:memory` → [`MemoryDatabase`]
//! - `cache:memory` → [`MemoryCache`]
//! - `pubsub:memory` → [`MemoryPubSub`], built by [`MemoryPubSubLoader`]
//! - `kafka.producer:memory` and `kafka.consumer:memory` → [`MemoryKafka`],
//!   built by [`MemoryKafkaProducerLoader`] and [`MemoryKafkaConsumerLoader`]
//!   over a shared [`MemoryBroker`]
pub mod cache;
pub mod db;
pub mod kafka;
pub mod pubsub;

pub use cache::MemoryCache;
pub use db::{MemoryDatabase, ID_COLUMN};
pub use kafka::{
    MemoryBroker, MemoryKafka, MemoryKafkaConfig, MemoryKafkaConsumerLoader, MemoryKafkaProducerLoader,
};
pub use pubsub::{MemoryPubSub, MemoryPubSubConfig, MemoryPubSubLoader};

/// Driver name shared by every library in this crate
pub const DRIVER: &str = "memory";
