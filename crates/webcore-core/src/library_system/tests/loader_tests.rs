use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::kernel::error::{Error, Result};
use crate::library_system::registry::downcast_library;
use crate::library_system::{construct, Connector, DefaultLoader, FnLoader, Library, LibraryArgs, LibraryLoader};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PoolConfig {
    size: usize,
}

/// Connection-bearing library built from its `Default` value.
#[derive(Debug, Default)]
struct PooledLibrary {
    pool_size: AtomicUsize,
    connected: AtomicBool,
}

#[async_trait]
impl Library for PooledLibrary {
    fn kind(&self) -> &str {
        "pooled"
    }

    async fn install(&self, args: &LibraryArgs) -> Result<()> {
        let config: PoolConfig = args.config_as("pooled")?;
        self.pool_size.store(config.size, Ordering::SeqCst);
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        Ok(())
    }

    fn connector(&self) -> Option<&dyn Connector> {
        Some(self)
    }
}

#[async_trait]
impl Connector for PooledLibrary {
    async fn connect(&self) -> Result<()> {
        if self.pool_size.load(Ordering::SeqCst) == 0 {
            return Err(Error::Other("pool size must be positive".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_default_loader_installs_and_connects() {
    let mut loader = DefaultLoader::<PooledLibrary>::new();
    loader.set_name("db:pooled");
    assert_eq!(loader.name(), "db:pooled");

    let library = loader
        .init(LibraryArgs::new().with_config_value(json!({"size": 4})))
        .await
        .unwrap();
    let pooled = downcast_library::<PooledLibrary>("db:pooled", library).unwrap();

    assert_eq!(pooled.pool_size.load(Ordering::SeqCst), 4);
    assert!(pooled.connected.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_default_loader_reports_connect_failure() {
    let loader = DefaultLoader::<PooledLibrary>::default();
    let err = loader.init(LibraryArgs::new()).await.unwrap_err();
    assert!(err.to_string().contains("pool size must be positive"));
}

#[tokio::test]
async fn test_default_loader_rejects_mismatched_config() {
    let loader = DefaultLoader::<PooledLibrary>::new();
    let err = loader
        .init(LibraryArgs::new().with_config_value(json!({"size": "large"})))
        .await
        .unwrap_err();
    assert!(matches!(
        err.as_library_error(),
        Some(crate::library_system::LibrarySystemError::InvalidArguments { library, .. }) if library == "pooled"
    ));
}

#[derive(Debug, Default)]
struct TrackedLibrary {
    uninstalled: Arc<AtomicBool>,
}

#[async_trait]
impl Library for TrackedLibrary {
    fn kind(&self) -> &str {
        "tracked"
    }

    async fn install(&self, _args: &LibraryArgs) -> Result<()> {
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        self.uninstalled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn connector(&self) -> Option<&dyn Connector> {
        Some(self)
    }
}

#[async_trait]
impl Connector for TrackedLibrary {
    async fn connect(&self) -> Result<()> {
        Err(Error::Other("host unreachable".to_string()))
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_construct_uninstalls_when_connect_fails() {
    let uninstalled = Arc::new(AtomicBool::new(false));
    let library = TrackedLibrary {
        uninstalled: uninstalled.clone(),
    };

    let err = construct(library, &LibraryArgs::new()).await.unwrap_err();

    assert!(err.to_string().contains("host unreachable"));
    assert!(uninstalled.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_fn_loader_passes_arguments_through() {
    let mut loader = FnLoader::new(|args: LibraryArgs| async move {
        let size = args.config()["size"].as_u64().unwrap_or_default();
        let library = PooledLibrary::default();
        library.pool_size.store(size as usize, Ordering::SeqCst);
        Ok(Arc::new(library) as Arc<dyn Library>)
    });
    loader.set_name("db:custom");

    let library = loader
        .init(LibraryArgs::new().with_config_value(json!({"size": 9})))
        .await
        .unwrap();
    let pooled = downcast_library::<PooledLibrary>(loader.name(), library).unwrap();
    assert_eq!(pooled.pool_size.load(Ordering::SeqCst), 9);
    assert!(!pooled.connected.load(Ordering::SeqCst), "FnLoader does not connect on its own");
}
