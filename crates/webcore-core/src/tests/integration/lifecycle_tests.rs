use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use super::common::{loaders, KvCache};
use crate::config::AppConfig;
use crate::kernel::bootstrap::Application;
use crate::kernel::context::AppContext;
use crate::kernel::error::{Error, Result};
use crate::module_system::{Module, ModuleManager};
use crate::ports::CacheMemory;

/// Resolves the cache port during init and writes through it.
#[derive(Default)]
struct SessionModule {
    cache: Mutex<Option<Arc<dyn CacheMemory>>>,
}

#[async_trait]
impl Module for SessionModule {
    fn name(&self) -> &'static str {
        "sessions"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    async fn init(&self, context: &Arc<AppContext>) -> Result<()> {
        let cache = context
            .cache()
            .await
            .ok_or_else(|| Error::Other("cache is required".to_string()))?;
        cache.set("session:1", json!({"user": "ayu"}), None).await?;
        *self.cache.lock().await = Some(cache);
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.cache.lock().await.take();
        Ok(())
    }
}

fn cache_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.cache.driver = "kv".to_string();
    config.cache.host = "kv.internal".to_string();
    config
}

#[tokio::test]
async fn test_module_reaches_configured_library_through_port() {
    let module = Arc::new(SessionModule::default());
    let mut app = Application::new(cache_config(), loaders(), vec![module.clone() as Arc<dyn Module>])
        .unwrap();

    app.start().await.unwrap();

    let kv = app
        .registry()
        .get_singleton_as::<KvCache>("cache:kv")
        .await
        .unwrap()
        .expect("cache materialized at start");
    assert_eq!(kv.host(), "kv.internal");

    let cache = app.context().cache().await.expect("cache port");
    assert_eq!(cache.get("session:1").await.unwrap(), Some(json!({"user": "ayu"})));

    let manager = app.get_component::<ModuleManager>().expect("module manager");
    assert_eq!(manager.initialized_modules().await, vec!["sessions"]);

    app.shutdown().await.unwrap();
    assert!(module.cache.lock().await.is_none());
    assert!(app.context().cache().await.is_none());
}

#[tokio::test]
async fn test_module_fails_when_required_library_is_not_configured() {
    let mut app = Application::new(
        AppConfig::default(),
        loaders(),
        vec![Arc::new(SessionModule::default()) as Arc<dyn Module>],
    )
    .unwrap();

    let err = app.start().await.unwrap_err();
    assert!(err.to_string().contains("Start"));
    assert_eq!(app.registry().instance_count().await, 0);
}
