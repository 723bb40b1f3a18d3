use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info};
use tokio::sync::Mutex;

use crate::kernel::component::KernelComponent;
use crate::kernel::context::AppContext;
use crate::kernel::error::{Error, Result};
use crate::module_system::traits::Module;

/// Kernel component running module initialization and teardown.
pub struct ModuleManager {
    name: &'static str,
    context: Arc<AppContext>,
    modules: Vec<Arc<dyn Module>>,
    /// Names of initialized modules, in initialization order
    initialized: Mutex<Vec<&'static str>>,
}

impl ModuleManager {
    /// Create a manager for `modules`. Two modules with the same name are
    /// rejected.
    pub fn new(context: Arc<AppContext>, modules: Vec<Arc<dyn Module>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for module in &modules {
            if !seen.insert(module.name()) {
                return Err(Error::module(module.name(), "module is registered multiple times", None));
            }
        }

        Ok(Self {
            name: "ModuleManager",
            context,
            modules,
            initialized: Mutex::new(Vec::new()),
        })
    }

    /// Registered module names, in registration order.
    pub fn module_names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Names of the modules initialized so far.
    pub async fn initialized_modules(&self) -> Vec<&'static str> {
        self.initialized.lock().await.clone()
    }

    pub fn get_module(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.iter().find(|m| m.name() == name).cloned()
    }
}

impl fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleManager")
            .field("name", &self.name)
            .field("modules", &self.module_names())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KernelComponent for ModuleManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<()> {
        info!("Modules registered: {}", self.module_names().join(", "));
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let mut initialized = self.initialized.lock().await;
        for module in &self.modules {
            if initialized.contains(&module.name()) {
                continue;
            }
            info!("Initializing module {} v{}", module.name(), module.version());
            module
                .init(&self.context)
                .await
                .map_err(|e| Error::module(module.name(), "initialization failed", Some(e)))?;
            initialized.push(module.name());
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut initialized = self.initialized.lock().await;
        let mut first_error = None;

        while let Some(name) = initialized.pop() {
            let Some(module) = self.get_module(name) else {
                continue;
            };
            info!("Destroying module {}", name);
            if let Err(e) = module.destroy().await {
                error!("Error destroying module {}: {}", name, e);
                if first_error.is_none() {
                    first_error = Some(Error::module(name, "destroy failed", Some(e)));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
