use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};

use crate::kernel::component::KernelComponent;
use crate::kernel::context::AppContext;
use crate::kernel::error::Result;

/// Kernel component owning the library lifecycle of the application.
///
/// `start` materializes the configured libraries through the context;
/// `stop` runs the collect-and-continue registry sweep and never fails.
pub struct LibraryManager {
    name: &'static str,
    context: Arc<AppContext>,
}

impl LibraryManager {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self {
            name: "LibraryManager",
            context,
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.context
    }
}

impl fmt::Debug for LibraryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryManager")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KernelComponent for LibraryManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<()> {
        info!(
            "Library loaders registered: {}",
            self.context.registry().loader_names().join(", ")
        );
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.context.start().await
    }

    async fn stop(&self) -> Result<()> {
        let report = self.context.destroy().await;
        for (instance, error) in &report.failures {
            warn!("Library {} left loaded after shutdown: {}", instance, error);
        }
        Ok(())
    }
}
