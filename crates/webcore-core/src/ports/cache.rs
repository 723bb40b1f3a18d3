use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::kernel::error::Result;

/// Key/value cache with optional per-entry expiry.
#[async_trait]
pub trait CacheMemory: Send + Sync {
    /// Store `value` under `key`. `None` uses the cache's default TTL.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// The live value under `key`; expired entries read as missing.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Remove `key`, returning whether a live entry existed.
    async fn delete(&self, key: &str) -> Result<bool>;
}
