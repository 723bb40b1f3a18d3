use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::kernel::error::Result;
use crate::library_system::{DefaultLoader, Library, LibraryArgs, LibraryLoader};
use crate::ports::CacheMemory;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KvConfig {
    host: String,
}

/// Minimal cache exposing the `CacheMemory` port; expiry is ignored.
#[derive(Debug, Default)]
pub struct KvCache {
    host: std::sync::Mutex<String>,
    entries: RwLock<HashMap<String, Value>>,
}

impl KvCache {
    pub fn host(&self) -> String {
        self.host.lock().unwrap().clone()
    }
}

#[async_trait]
impl Library for KvCache {
    fn kind(&self) -> &str {
        "kv"
    }

    async fn install(&self, args: &LibraryArgs) -> Result<()> {
        let config: KvConfig = args.config_as("cache:kv")?;
        *self.host.lock().unwrap() = config.host;
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
impl CacheMemory for KvCache {
    async fn set(&self, key: &str, value: Value, _ttl: Option<Duration>) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }
}

pub fn loaders() -> HashMap<String, Box<dyn LibraryLoader>> {
    let mut loaders: HashMap<String, Box<dyn LibraryLoader>> = HashMap::new();
    loaders.insert("cache:kv".to_string(), Box::new(DefaultLoader::<KvCache>::new()));
    loaders
}
