use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::AppConfig;
use crate::kernel::context::AppContext;
use crate::kernel::error::{Error, Result};
use crate::library_system::{
    construct, FnLoader, InstanceKey, Library, LibraryArgs, LibraryLoader, LibraryRegistry, LibrarySystemError,
};

/// Records the config section and context it was installed with.
#[derive(Debug, Default)]
struct SectionLibrary {
    section: std::sync::Mutex<Value>,
}

#[async_trait]
impl Library for SectionLibrary {
    fn kind(&self) -> &str {
        "section"
    }

    async fn install(&self, args: &LibraryArgs) -> Result<()> {
        args.require_context("section")?;
        *self.section.lock().unwrap() = args.config().clone();
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        Ok(())
    }
}

fn section_loader(calls: Arc<AtomicUsize>) -> Box<dyn LibraryLoader> {
    Box::new(FnLoader::new(move |args: LibraryArgs| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            construct(SectionLibrary::default(), &args).await
        }
    }))
}

fn context_with(config: AppConfig, names: &[&str], calls: &Arc<AtomicUsize>) -> Arc<AppContext> {
    let loaders: HashMap<String, Box<dyn LibraryLoader>> = names
        .iter()
        .map(|name| (name.to_string(), section_loader(calls.clone())))
        .collect();
    AppContext::new(config, Arc::new(LibraryRegistry::new(loaders)))
}

#[tokio::test]
async fn test_start_loads_only_configured_sections() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut config = AppConfig::default();
    config.database.host = "localhost".to_string();
    config.database.name = "orders".to_string();
    let context = context_with(config, &["db:memory", "cache:memory", "pubsub:memory"], &calls);

    context.start().await.unwrap();

    assert_eq!(context.registry().loaded_keys().await, vec![InstanceKey::singleton("db:memory")]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let db = context
        .registry()
        .get_singleton_as::<SectionLibrary>("db:memory")
        .await
        .unwrap()
        .expect("database loaded");
    let section = db.section.lock().unwrap().clone();
    assert_eq!(section["host"], "localhost");
    assert_eq!(section["name"], "orders");
}

#[tokio::test]
async fn test_start_loads_every_configured_kind_by_driver() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut config = AppConfig::default();
    config.database.driver = "mongodb".to_string();
    config.database.host = "mongo.internal".to_string();
    config.cache.host = "redis.internal".to_string();
    config.pubsub.project_id = "project-1".to_string();
    config.pubsub.topic = "events".to_string();
    let context = context_with(config, &["db:mongodb", "cache:memory", "pubsub:memory"], &calls);

    context.start().await.unwrap();

    assert_eq!(
        context.registry().loaded_keys().await,
        vec![
            InstanceKey::singleton("db:mongodb"),
            InstanceKey::singleton("cache:memory"),
            InstanceKey::singleton("pubsub:memory"),
        ]
    );
}

#[tokio::test]
async fn test_start_fails_for_configured_kind_without_loader() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut config = AppConfig::default();
    config.cache.driver = "redis".to_string();
    config.cache.host = "redis.internal".to_string();
    let context = context_with(config, &["cache:memory"], &calls);

    let err = context.start().await.unwrap_err();
    assert!(matches!(
        err,
        Error::LibrarySystem(LibrarySystemError::LoaderNotFound { ref name }) if name == "cache:redis"
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pubsub_needs_project_and_topic() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut config = AppConfig::default();
    config.pubsub.project_id = "project-1".to_string();
    let context = context_with(config, &["pubsub:memory"], &calls);

    context.start().await.unwrap();
    assert_eq!(context.registry().instance_count().await, 0);
}

#[tokio::test]
async fn test_kafka_producer_loads_when_brokers_are_set() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut config = AppConfig::default();
    config.kafka.group_id = "billing".to_string();
    let context = context_with(config.clone(), &["kafka.producer:memory"], &calls);
    context.start().await.unwrap();
    assert_eq!(context.registry().instance_count().await, 0);

    config.kafka.brokers = vec!["broker-1:9092".to_string(), "broker-2:9092".to_string()];
    let context = context_with(config, &["kafka.producer:memory"], &calls);
    context.start().await.unwrap();

    let producer = context
        .registry()
        .get_singleton_as::<SectionLibrary>("kafka.producer:memory")
        .await
        .unwrap()
        .expect("producer loaded");
    let section = producer.section.lock().unwrap().clone();
    assert_eq!(section["brokers"][1], "broker-2:9092");
    assert_eq!(section["group_id"], "billing");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_destroy_cancels_token_and_sweeps_registry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut config = AppConfig::default();
    config.database.host = "localhost".to_string();
    let context = context_with(config, &["db:memory"], &calls);
    let token = context.shutdown_token();

    context.start().await.unwrap();
    assert!(!token.is_cancelled());

    let report = context.destroy().await;

    assert!(token.is_cancelled());
    assert!(report.is_clean());
    assert_eq!(report.unloaded, vec![InstanceKey::singleton("db:memory")]);
    assert_eq!(context.registry().instance_count().await, 0);
}

#[tokio::test]
async fn test_port_helpers_are_empty_when_nothing_is_loaded() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut config = AppConfig::default();
    config.database.host = "localhost".to_string();
    let context = context_with(config, &["db:memory"], &calls);

    assert!(context.database().await.is_none());
    context.start().await.unwrap();
    // Loaded, but this library does not expose the database port.
    assert!(context.database().await.is_none());
    assert!(context.cache().await.is_none());
    assert!(context.pubsub().await.is_none());
    assert!(context.kafka().await.is_none());
    assert!(context.auth_store().await.is_none());
}
