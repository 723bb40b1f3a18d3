use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::context::AppContext;
use crate::kernel::error::Result;

/// Core trait that all application modules must implement
#[async_trait]
pub trait Module: Send + Sync {
    /// The unique name of the module
    fn name(&self) -> &'static str;

    /// The version of the module
    fn version(&self) -> &str;

    /// Resolve dependencies from the context and prepare the module.
    async fn init(&self, context: &Arc<AppContext>) -> Result<()>;

    /// Release module resources. Called in reverse initialization order.
    async fn destroy(&self) -> Result<()> {
        Ok(())
    }
}
