use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::kernel::component::{ComponentRegistry, KernelComponent};
use crate::kernel::constants;
use crate::kernel::context::AppContext;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::library_system::{LibraryLoader, LibraryManager, LibraryRegistry};
use crate::module_system::{Module, ModuleManager};

/// Main application struct coordinating kernel components
pub struct Application {
    running: bool,
    context: Arc<AppContext>,
    components: ComponentRegistry,
}

impl Application {
    /// Build the registry from the static loader table, the context from the
    /// configuration, and the kernel components (libraries first, then
    /// modules).
    pub fn new(
        config: AppConfig,
        loaders: HashMap<String, Box<dyn LibraryLoader>>,
        modules: Vec<Arc<dyn Module>>,
    ) -> Result<Self> {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);

        let registry = Arc::new(LibraryRegistry::new(loaders));
        let context = AppContext::new(config, registry);

        let mut components = ComponentRegistry::new();
        components.register_instance(Arc::new(LibraryManager::new(context.clone())))?;
        components.register_instance(Arc::new(ModuleManager::new(context.clone(), modules)?))?;

        Ok(Application {
            running: false,
            context,
            components,
        })
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.context
    }

    pub fn registry(&self) -> &Arc<LibraryRegistry> {
        self.context.registry()
    }

    /// Gets a specific component instance by its concrete type T.
    pub fn get_component<T: KernelComponent>(&self) -> Option<Arc<T>> {
        self.components.get_concrete::<T>()
    }

    /// Returns whether the application has been started and not yet shut down.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Initialize and start every component in registration order.
    ///
    /// If a component fails to start, it and the components started before it
    /// are stopped in reverse order before the error is returned, so anything
    /// partially materialized is released.
    pub async fn start(&mut self) -> Result<()> {
        if self.running {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::RunPreCheck,
                component_name: None,
                message: "Application already running".to_string(),
                source: None,
            });
        }

        log::info!("Initializing components...");
        for component in self.components.components() {
            log::debug!("Initializing component: {}", component.name());
            component.initialize().await.map_err(|e| Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Initialize,
                component_name: Some(component.name().to_string()),
                message: "Component failed to initialize".to_string(),
                source: Some(Box::new(e)),
            })?;
        }

        log::info!("Starting components...");
        for (index, component) in self.components.components().iter().enumerate() {
            log::debug!("Starting component: {}", component.name());
            if let Err(e) = component.start().await {
                log::error!("Component {} failed to start: {}", component.name(), e);
                let _ = self.stop_components(index + 1).await;
                return Err(Error::KernelLifecycleError {
                    phase: KernelLifecyclePhase::Start,
                    component_name: Some(component.name().to_string()),
                    message: "Component failed to start".to_string(),
                    source: Some(Box::new(e)),
                });
            }
        }

        self.running = true;
        log::info!("Application started.");
        Ok(())
    }

    /// Stop every component in reverse registration order.
    ///
    /// All components are stopped even if one fails; the first failure is
    /// returned afterwards.
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        log::info!("Shutting down components...");
        let result = self.stop_components(self.components.len()).await;
        self.running = false;
        log::info!("Component shutdown complete.");
        result
    }

    /// Start, wait for `signal`, then shut down.
    pub async fn run_until<F>(&mut self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        signal.await;
        self.shutdown().await
    }

    /// Stop the first `count` components, newest first.
    async fn stop_components(&self, count: usize) -> Result<()> {
        let mut first_error = None;
        for component in self.components.components()[..count].iter().rev() {
            log::debug!("Stopping component: {}", component.name());
            if let Err(e) = component.stop().await {
                log::error!("Error stopping component {}: {}", component.name(), e);
                if first_error.is_none() {
                    first_error = Some(Error::KernelLifecycleError {
                        phase: KernelLifecyclePhase::Shutdown,
                        component_name: Some(component.name().to_string()),
                        message: "Component failed to stop".to_string(),
                        source: Some(Box::new(e)),
                    });
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("running", &self.running)
            .field("context", &self.context)
            .field("components", &self.components)
            .finish()
    }
}
