//! TTL cache behind the [`CacheMemory`] port.
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;

use webcore_core::kernel::error::Result;
use webcore_core::library_system::{Library, LibraryArgs};
use webcore_core::ports::CacheMemory;

const DEFAULT_TTL_SECS: u64 = 300;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct MemoryCacheConfig {
    default_ttl_secs: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-process key/value cache. Has no connection facet.
///
/// A TTL of zero, explicit or configured, stores the entry without expiry.
/// Expired entries are dropped lazily on access.
#[derive(Debug, Default)]
pub struct MemoryCache {
    default_ttl: OnceLock<Duration>,
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
            .get()
            .copied()
            .unwrap_or(Duration::from_secs(DEFAULT_TTL_SECS))
    }

    /// Number of stored entries, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }
}

#[async_trait]
impl Library for MemoryCache {
    fn kind(&self) -> &str {
        "memory cache"
    }

    async fn install(&self, args: &LibraryArgs) -> Result<()> {
        let config: MemoryCacheConfig = args.config_as("cache:memory")?;
        let _ = self.default_ttl.set(Duration::from_secs(config.default_ttl_secs));
        debug!("Memory cache installed, default ttl {}s", config.default_ttl_secs);
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    fn into_cache(self: Arc<Self>) -> Option<Arc<dyn CacheMemory>> {
        Some(self)
    }
}

#[async_trait]
impl CacheMemory for MemoryCache {
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let ttl = ttl.unwrap_or_else(|| self.default_ttl());
        // Zero, or a TTL past the clock's range, never expires.
        let expires_at = if ttl.is_zero() { None } else { Instant::now().checked_add(ttl) };
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .write()
            .await
            .remove(key)
            .is_some_and(|entry| entry.is_live(now)))
    }
}
