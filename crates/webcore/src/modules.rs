use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::info;

use webcore_core::kernel::context::AppContext;
use webcore_core::kernel::error::Result;
use webcore_core::module_system::Module;

/// Probes the optional database, cache and pub/sub dependencies at init
/// and keeps one line per dependency for the `check` command.
#[derive(Debug, Default)]
pub struct StatusModule {
    report: Mutex<Vec<String>>,
}

impl StatusModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self) -> Vec<String> {
        self.report.lock().map(|lines| lines.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Module for StatusModule {
    fn name(&self) -> &'static str {
        "status"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn init(&self, context: &Arc<AppContext>) -> Result<()> {
        let mut lines = Vec::new();

        match context.database().await {
            Some(db) => {
                db.ping().await?;
                lines.push(format!("database: {} ({})", db.name(), db.driver()));
            }
            None => lines.push("database: not configured".to_string()),
        }

        match context.cache().await {
            Some(cache) => {
                cache.set("webcore:status", serde_json::json!("ok"), None).await?;
                cache.delete("webcore:status").await?;
                lines.push(format!("cache: {}", context.config().cache.driver));
            }
            None => lines.push("cache: not configured".to_string()),
        }

        lines.push(match context.pubsub().await {
            Some(_) => format!("pubsub: {} ({})", context.config().pubsub.driver, context.config().pubsub.topic),
            None => "pubsub: not configured".to_string(),
        });

        lines.push(match context.kafka().await {
            Some(_) => format!("kafka: {} ({})", context.config().kafka.driver, context.config().kafka.brokers.join(",")),
            None => "kafka: not configured".to_string(),
        });

        info!("Status module initialized: {}", lines.join("; "));
        if let Ok(mut report) = self.report.lock() {
            *report = lines;
        }
        Ok(())
    }
}
