use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::kernel::bootstrap::Application;
use crate::kernel::context::AppContext;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::library_system::{
    construct, FnLoader, InstanceKey, Library, LibraryArgs, LibraryLoader, LibraryManager,
};
use crate::module_system::{Module, ModuleManager};

type Tracker = Arc<StdMutex<Vec<String>>>;

#[derive(Debug)]
struct TrackedLibrary {
    tracker: Tracker,
}

#[async_trait]
impl Library for TrackedLibrary {
    fn kind(&self) -> &str {
        "tracked"
    }

    async fn install(&self, _args: &LibraryArgs) -> Result<()> {
        self.tracker.lock().unwrap().push("install:db".to_string());
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        self.tracker.lock().unwrap().push("uninstall:db".to_string());
        Ok(())
    }
}

struct ProbeModule {
    name: &'static str,
    tracker: Tracker,
    fail_init: bool,
}

#[async_trait]
impl Module for ProbeModule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    async fn init(&self, context: &Arc<AppContext>) -> Result<()> {
        let db = context.registry().get_singleton("db:memory").await;
        self.tracker
            .lock()
            .unwrap()
            .push(format!("init:{}:db={}", self.name, db.is_some()));
        if self.fail_init {
            return Err(Error::Other("refusing to start".to_string()));
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.tracker.lock().unwrap().push(format!("destroy:{}", self.name));
        Ok(())
    }
}

fn loaders(tracker: &Tracker) -> HashMap<String, Box<dyn LibraryLoader>> {
    let tracker = tracker.clone();
    let mut loaders: HashMap<String, Box<dyn LibraryLoader>> = HashMap::new();
    loaders.insert(
        "db:memory".to_string(),
        Box::new(FnLoader::new(move |args: LibraryArgs| {
            let tracker = tracker.clone();
            async move { construct(TrackedLibrary { tracker }, &args).await }
        })),
    );
    loaders
}

fn configured() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.host = "localhost".to_string();
    config
}

fn tracked_module(name: &'static str, tracker: &Tracker, fail_init: bool) -> Arc<dyn Module> {
    Arc::new(ProbeModule {
        name,
        tracker: tracker.clone(),
        fail_init,
    })
}

fn events(tracker: &Tracker) -> Vec<String> {
    tracker.lock().unwrap().clone()
}

#[tokio::test]
async fn test_application_new_registers_kernel_components() {
    let tracker = Tracker::default();
    let app = Application::new(configured(), loaders(&tracker), vec![]).expect("Application::new failed");

    assert!(app.get_component::<LibraryManager>().is_some());
    assert!(app.get_component::<ModuleManager>().is_some());
    assert!(!app.is_running());
    assert_eq!(app.registry().loader_names(), vec!["db:memory".to_string()]);
    assert!(events(&tracker).is_empty(), "nothing is constructed before start");
}

#[tokio::test]
async fn test_application_lifecycle_orders_libraries_and_modules() {
    let tracker = Tracker::default();
    let modules = vec![tracked_module("users", &tracker, false), tracked_module("orders", &tracker, false)];
    let mut app = Application::new(configured(), loaders(&tracker), modules).unwrap();

    app.start().await.unwrap();
    assert!(app.is_running());
    assert_eq!(app.registry().loaded_keys().await, vec![InstanceKey::singleton("db:memory")]);

    app.shutdown().await.unwrap();
    assert!(!app.is_running());
    assert!(app.context().shutdown_token().is_cancelled());
    assert_eq!(app.registry().instance_count().await, 0);
    assert_eq!(
        events(&tracker),
        vec![
            "install:db",
            "init:users:db=true",
            "init:orders:db=true",
            "destroy:orders",
            "destroy:users",
            "uninstall:db",
        ]
    );
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let tracker = Tracker::default();
    let mut app = Application::new(configured(), loaders(&tracker), vec![]).unwrap();
    app.start().await.unwrap();

    let err = app.start().await.unwrap_err();
    assert!(matches!(
        err,
        Error::KernelLifecycleError { phase: KernelLifecyclePhase::RunPreCheck, .. }
    ));
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_start_failure_releases_materialized_libraries() {
    let tracker = Tracker::default();
    let modules = vec![tracked_module("users", &tracker, false), tracked_module("orders", &tracker, true)];
    let mut app = Application::new(configured(), loaders(&tracker), modules).unwrap();

    let err = app.start().await.unwrap_err();
    match err {
        Error::KernelLifecycleError {
            phase: KernelLifecyclePhase::Start,
            component_name,
            ..
        } => assert_eq!(component_name.as_deref(), Some("ModuleManager")),
        other => panic!("expected a start lifecycle error, got {:?}", other),
    }
    assert!(!app.is_running());
    assert_eq!(app.registry().instance_count().await, 0);
    assert_eq!(
        events(&tracker),
        vec![
            "install:db",
            "init:users:db=true",
            "init:orders:db=true",
            "destroy:users",
            "uninstall:db",
        ]
    );
}

#[tokio::test]
async fn test_missing_loader_fails_library_manager_start() {
    let tracker = Tracker::default();
    let mut config = configured();
    config.database.driver = "postgres".to_string();
    let mut app = Application::new(config, loaders(&tracker), vec![tracked_module("users", &tracker, false)]).unwrap();

    let err = app.start().await.unwrap_err();
    match err {
        Error::KernelLifecycleError { component_name, .. } => {
            assert_eq!(component_name.as_deref(), Some("LibraryManager"))
        }
        other => panic!("expected a lifecycle error, got {:?}", other),
    }
    assert!(events(&tracker).is_empty(), "modules must not initialize");
}

#[tokio::test]
async fn test_duplicate_modules_fail_application_new() {
    let tracker = Tracker::default();
    let modules = vec![tracked_module("users", &tracker, false), tracked_module("users", &tracker, false)];
    let err = Application::new(configured(), loaders(&tracker), modules).unwrap_err();
    assert!(matches!(err, Error::Module { .. }));
}

#[tokio::test]
async fn test_run_until_starts_and_shuts_down() {
    let tracker = Tracker::default();
    let mut app = Application::new(configured(), loaders(&tracker), vec![tracked_module("users", &tracker, false)]).unwrap();

    app.run_until(async {}).await.unwrap();

    assert!(!app.is_running());
    assert_eq!(events(&tracker).last().map(String::as_str), Some("uninstall:db"));
}

#[tokio::test]
async fn test_shutdown_without_start_is_noop() {
    let tracker = Tracker::default();
    let mut app = Application::new(AppConfig::default(), loaders(&tracker), vec![]).unwrap();
    app.shutdown().await.unwrap();
    assert!(!app.is_running());
}
