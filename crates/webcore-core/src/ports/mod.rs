//! # Webcore Ports
//!
//! Domain traits that libraries expose to modules through the
//! `Library::into_*` accessors. A module asks the registry (or the
//! [`AppContext`](crate::kernel::context::AppContext) helpers) for a
//! materialized library and talks to it only through these traits.
pub mod cache;
pub mod database;
pub mod error;
pub mod kafka;
pub mod pubsub;

pub use cache::CacheMemory;
pub use database::{from_db_map, to_db_map, Database, DbExpression, DbMap, DbOp, FindOptions, SortOrder};
pub use error::PortError;
pub use kafka::{Kafka, KafkaConsumer};
pub use pubsub::{MessageReceiver, PubSub, PubSubMessage};
