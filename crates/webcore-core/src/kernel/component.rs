use std::any::TypeId;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::error::{Error, Result};
use crate::library_system::traits::AsAny;

/// Core component lifecycle trait for all kernel components
#[async_trait]
pub trait KernelComponent: AsAny + Debug {
    fn name(&self) -> &'static str;
    async fn initialize(&self) -> Result<()>;
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

/// Ordered registry of kernel components.
///
/// Components keep their registration order, which is the initialize/start
/// order; stop runs in reverse. Lookup by concrete type is also supported.
#[derive(Default, Debug)]
pub struct ComponentRegistry {
    ordered: Vec<Arc<dyn KernelComponent>>,
    by_type: HashMap<TypeId, usize>,
}

impl ComponentRegistry {
    /// Create a new empty component registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component instance, keyed by the TypeId of its concrete type.
    /// Registering the same concrete type twice is rejected.
    pub fn register_instance<V>(&mut self, instance: Arc<V>) -> Result<()>
    where
        V: KernelComponent,
    {
        let type_id = TypeId::of::<V>();
        if self.by_type.contains_key(&type_id) {
            return Err(Error::ComponentRegistryError {
                operation: "RegisterComponent".to_string(),
                component_name: Some(instance.name().to_string()),
                message: "a component of this type is already registered".to_string(),
            });
        }
        self.by_type.insert(type_id, self.ordered.len());
        self.ordered.push(instance);
        Ok(())
    }

    /// Get a component instance by concrete type T.
    pub fn get_concrete<T: KernelComponent>(&self) -> Option<Arc<T>> {
        let index = *self.by_type.get(&TypeId::of::<T>())?;
        self.ordered[index].clone().into_any().downcast::<T>().ok()
    }

    /// All components in registration order.
    pub fn components(&self) -> &[Arc<dyn KernelComponent>] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
