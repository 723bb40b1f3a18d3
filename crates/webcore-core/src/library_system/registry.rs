use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{Mutex, OnceCell};

use crate::kernel::error::Result;
use crate::library_system::args::LibraryArgs;
use crate::library_system::error::LibrarySystemError;
use crate::library_system::traits::{Library, LibraryLoader, DEFAULT_INSTANCE_KEY};

/// One cache cell per compound key. The cell stays empty while the first
/// construction is in flight; concurrent callers await the same cell.
type Slot = Arc<OnceCell<Arc<dyn Library>>>;

/// Compound key identifying one cached instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub name: String,
    pub key: String,
}

impl InstanceKey {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }

    pub fn singleton(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_INSTANCE_KEY)
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.key)
    }
}

/// Outcome of [`LibraryRegistry::shutdown_all`].
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Instances torn down and removed from the cache, in teardown order
    pub unloaded: Vec<InstanceKey>,
    /// Instances whose teardown failed; they stay cached
    pub failures: Vec<(InstanceKey, LibrarySystemError)>,
}

impl ShutdownReport {
    /// True when every instance was torn down.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct InstanceTable {
    buckets: HashMap<String, HashMap<String, Slot>>,
    /// Materialization order, used to tear down in reverse
    order: Vec<InstanceKey>,
}

impl InstanceTable {
    fn slot(&mut self, name: &str, key: &str) -> Slot {
        self.buckets
            .entry(name.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    fn ready(&self, name: &str, key: &str) -> Option<Arc<dyn Library>> {
        self.buckets
            .get(name)
            .and_then(|bucket| bucket.get(key))
            .and_then(|slot| slot.get().cloned())
    }

    fn remove(&mut self, name: &str, key: &str) {
        if let Some(bucket) = self.buckets.get_mut(name) {
            bucket.remove(key);
            if bucket.is_empty() {
                self.buckets.remove(name);
            }
        }
        self.order.retain(|k| !(k.name == name && k.key == key));
    }

    /// True while `slot` is the table's cell for `(name, key)`.
    fn owns(&self, name: &str, key: &str, slot: &Slot) -> bool {
        self.buckets
            .get(name)
            .and_then(|bucket| bucket.get(key))
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Drop a slot whose construction failed, unless another caller is
    /// still waiting on it. Callers clone slots under the table lock, so a
    /// strong count of two (table + `slot`) means nobody else holds it.
    fn discard_failed(&mut self, name: &str, key: &str, slot: &Slot) {
        if slot.initialized() || Arc::strong_count(slot) > 2 {
            return;
        }
        if self.owns(name, key, slot) {
            self.remove(name, key);
        }
    }
}

/// Discards an empty slot when a load is dropped while its construction is
/// still running. Best effort: skipped if the table is locked at that time.
struct PendingSlot<'a> {
    registry: &'a LibraryRegistry,
    name: &'a str,
    key: &'a str,
    slot: Slot,
    armed: bool,
}

impl<'a> PendingSlot<'a> {
    fn new(registry: &'a LibraryRegistry, name: &'a str, key: &'a str, slot: Slot) -> Self {
        Self {
            registry,
            name,
            key,
            slot,
            armed: true,
        }
    }

    /// The load completed; hand the slot back to the caller.
    fn disarm(mut self) -> Slot {
        self.armed = false;
        self.slot.clone()
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut table) = self.registry.instances.try_lock() {
            table.discard_failed(self.name, self.key, &self.slot);
        }
    }
}

/// Registry of library loaders and of the instances they produced.
///
/// Instances are cached under `(loader name, instance key)`; at most one live
/// instance exists per compound key. Construction is lazy and single-flight
/// per key. The table lock is never held across a loader's `init`, so a
/// library may call back into the registry while it installs.
pub struct LibraryRegistry {
    loaders: HashMap<String, Arc<dyn LibraryLoader>>,
    instances: Mutex<InstanceTable>,
}

impl LibraryRegistry {
    /// Create a registry from a static name → loader table. Each loader is
    /// bound to its table key.
    pub fn new(loaders: HashMap<String, Box<dyn LibraryLoader>>) -> Self {
        let loaders = loaders
            .into_iter()
            .map(|(name, mut loader)| {
                loader.set_name(&name);
                (name, Arc::from(loader))
            })
            .collect();

        Self {
            loaders,
            instances: Mutex::new(InstanceTable::default()),
        }
    }

    /// Look up a registered loader.
    pub fn loader(&self, name: &str) -> Option<Arc<dyn LibraryLoader>> {
        self.loaders.get(name).cloned()
    }

    pub fn has_loader(&self, name: &str) -> bool {
        self.loaders.contains_key(name)
    }

    /// Registered loader names, sorted.
    pub fn loader_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaders.keys().cloned().collect();
        names.sort();
        names
    }

    /// Cached singleton for `name`, if materialized.
    pub async fn get_singleton(&self, name: &str) -> Option<Arc<dyn Library>> {
        self.get_instance(name, DEFAULT_INSTANCE_KEY).await
    }

    /// Cached instance for `(name, key)`, if materialized. Never constructs.
    pub async fn get_instance(&self, name: &str, key: &str) -> Option<Arc<dyn Library>> {
        self.instances.lock().await.ready(name, key)
    }

    /// Get-or-create the singleton of the loader registered as `name`.
    pub async fn load_singleton(&self, name: &str, args: LibraryArgs) -> Result<Arc<dyn Library>> {
        self.load_instance(name, DEFAULT_INSTANCE_KEY, args).await
    }

    /// Get-or-create the instance `(name, key)`.
    ///
    /// On a cache hit `args` are ignored: construction arguments only matter
    /// the first time a key is materialized.
    pub async fn load_instance(&self, name: &str, key: &str, args: LibraryArgs) -> Result<Arc<dyn Library>> {
        let loader = self.loader(name).ok_or_else(|| LibrarySystemError::LoaderNotFound {
            name: name.to_string(),
        })?;
        self.materialize(loader.as_ref(), key, args).await
    }

    /// Get-or-create the singleton of `loader`, keyed by the loader's name.
    pub async fn load_singleton_with(&self, loader: &Arc<dyn LibraryLoader>, args: LibraryArgs) -> Result<Arc<dyn Library>> {
        self.load_instance_with(loader, DEFAULT_INSTANCE_KEY, args).await
    }

    /// Get-or-create `(loader.name(), key)` using `loader` for construction.
    /// The loader must be registered under its name.
    pub async fn load_instance_with(
        &self,
        loader: &Arc<dyn LibraryLoader>,
        key: &str,
        args: LibraryArgs,
    ) -> Result<Arc<dyn Library>> {
        if !self.has_loader(loader.name()) {
            return Err(LibrarySystemError::LoaderNotFound {
                name: loader.name().to_string(),
            }
            .into());
        }
        self.materialize(loader.as_ref(), key, args).await
    }

    async fn materialize(&self, loader: &dyn LibraryLoader, key: &str, args: LibraryArgs) -> Result<Arc<dyn Library>> {
        let name = loader.name().to_string();
        loop {
            let slot = {
                let mut table = self.instances.lock().await;
                let slot = table.slot(&name, key);
                if let Some(existing) = slot.get() {
                    debug!("Library {}[{}] already loaded; construction arguments ignored", name, key);
                    return Ok(existing.clone());
                }
                slot
            };
            let pending = PendingSlot::new(self, &name, key, slot);

            let constructed = AtomicBool::new(false);
            let result = pending
                .slot
                .get_or_try_init(|| async {
                    info!("Loading library {}[{}]", name, key);
                    let library = loader.init(args.clone()).await?;
                    constructed.store(true, Ordering::SeqCst);
                    Ok::<_, crate::kernel::error::Error>(library)
                })
                .await
                .cloned();

            let mut table = self.instances.lock().await;
            let slot = pending.disarm();
            match result {
                Ok(library) => {
                    // An unload may have run between construction and this lock.
                    if !table.owns(&name, key, &slot) {
                        debug!("Library {}[{}] was unloaded while loading; loading again", name, key);
                        continue;
                    }
                    if constructed.load(Ordering::SeqCst) {
                        table.order.push(InstanceKey::new(name.as_str(), key));
                        info!("Library {}[{}] ready ({})", name, key, library.kind());
                    }
                    return Ok(library);
                }
                Err(e) => {
                    table.discard_failed(&name, key, &slot);
                    return Err(LibrarySystemError::ConstructionFailed {
                        name,
                        key: key.to_string(),
                        source: Box::new(e),
                    }
                    .into());
                }
            }
        }
    }

    /// Unload the singleton of `name`. See [`LibraryRegistry::unload_instance`].
    pub async fn unload_singleton(&self, name: &str) -> Result<Arc<dyn Library>> {
        self.unload_instance(name, DEFAULT_INSTANCE_KEY).await
    }

    /// Tear down one instance, failing fast.
    ///
    /// A connection-bearing instance is disconnected first, then uninstalled.
    /// If either step fails the error is returned and the instance stays
    /// cached so the unload can be retried.
    pub async fn unload_instance(&self, name: &str, key: &str) -> Result<Arc<dyn Library>> {
        let mut table = self.instances.lock().await;
        let library = table.ready(name, key).ok_or_else(|| LibrarySystemError::InstanceNotFound {
            name: name.to_string(),
            key: key.to_string(),
        })?;

        teardown(name, key, library.as_ref()).await?;
        table.remove(name, key);
        info!("Library {}[{}] unloaded", name, key);
        Ok(library)
    }

    /// Tear down every loaded instance, newest first.
    ///
    /// Failures are logged and recorded in the report; the sweep always
    /// continues. Instances that failed stay cached.
    pub async fn shutdown_all(&self) -> ShutdownReport {
        let mut table = self.instances.lock().await;
        let mut report = ShutdownReport::default();
        let order: Vec<InstanceKey> = table.order.iter().rev().cloned().collect();

        for instance in order {
            let Some(library) = table.ready(&instance.name, &instance.key) else {
                continue;
            };
            match teardown(&instance.name, &instance.key, library.as_ref()).await {
                Ok(()) => {
                    table.remove(&instance.name, &instance.key);
                    debug!("Library {} unloaded during shutdown", instance);
                    report.unloaded.push(instance);
                }
                Err(e) => {
                    warn!("{}", e);
                    report.failures.push((instance, e));
                }
            }
        }

        info!(
            "Library shutdown complete: {} unloaded, {} failed",
            report.unloaded.len(),
            report.failures.len()
        );
        report
    }

    /// Compound keys of all materialized instances, oldest first.
    pub async fn loaded_keys(&self) -> Vec<InstanceKey> {
        self.instances.lock().await.order.clone()
    }

    pub async fn instance_count(&self) -> usize {
        self.instances.lock().await.order.len()
    }

    /// Cells in the table, including empty ones.
    #[cfg(test)]
    pub(crate) async fn slot_count(&self) -> usize {
        self.instances.lock().await.buckets.values().map(HashMap::len).sum()
    }

    // --- typed accessors ---

    pub async fn get_singleton_as<T: Library>(&self, name: &str) -> Result<Option<Arc<T>>> {
        self.get_instance_as(name, DEFAULT_INSTANCE_KEY).await
    }

    pub async fn get_instance_as<T: Library>(&self, name: &str, key: &str) -> Result<Option<Arc<T>>> {
        match self.get_instance(name, key).await {
            Some(library) => downcast_library(name, library).map(Some),
            None => Ok(None),
        }
    }

    pub async fn load_singleton_as<T: Library>(&self, name: &str, args: LibraryArgs) -> Result<Arc<T>> {
        self.load_instance_as(name, DEFAULT_INSTANCE_KEY, args).await
    }

    pub async fn load_instance_as<T: Library>(&self, name: &str, key: &str, args: LibraryArgs) -> Result<Arc<T>> {
        let library = self.load_instance(name, key, args).await?;
        downcast_library(name, library)
    }

    pub async fn unload_singleton_as<T: Library>(&self, name: &str) -> Result<Arc<T>> {
        let library = self.unload_singleton(name).await?;
        downcast_library(name, library)
    }
}

impl fmt::Debug for LibraryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryRegistry")
            .field("loaders", &self.loader_names())
            .finish_non_exhaustive()
    }
}

/// Disconnect (when connection-bearing) then uninstall.
async fn teardown(name: &str, key: &str, library: &dyn Library) -> std::result::Result<(), LibrarySystemError> {
    if let Some(connector) = library.connector() {
        connector
            .disconnect()
            .await
            .map_err(|e| LibrarySystemError::DisconnectFailed {
                name: name.to_string(),
                key: key.to_string(),
                source: Box::new(e),
            })?;
    }

    library.uninstall().await.map_err(|e| LibrarySystemError::UninstallFailed {
        name: name.to_string(),
        key: key.to_string(),
        source: Box::new(e),
    })
}

/// Downcast a registry entry to its concrete type.
pub fn downcast_library<T: Library>(name: &str, library: Arc<dyn Library>) -> Result<Arc<T>> {
    library
        .into_any()
        .downcast::<T>()
        .map_err(|_| LibrarySystemError::contract_violation(name, std::any::type_name::<T>()).into())
}
