use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use crate::kernel::error::Result;
use crate::library_system::args::LibraryArgs;
use crate::library_system::traits::{Library, LibraryLoader};

/// Install `library`, connect it when it is connection-bearing, and hand it
/// back as a shared trait object.
///
/// If `connect` fails after a successful install, the half-built library is
/// uninstalled before the connect error is returned.
pub async fn construct<L: Library>(library: L, args: &LibraryArgs) -> Result<Arc<dyn Library>> {
    library.install(args).await?;
    debug!("Library {} installed", library.kind());

    if let Some(connector) = library.connector() {
        if let Err(e) = connector.connect().await {
            if let Err(cleanup) = library.uninstall().await {
                warn!("Failed to uninstall {} after connect error: {}", library.kind(), cleanup);
            }
            return Err(e);
        }
        debug!("Library {} connected", library.kind());
    }

    Ok(Arc::new(library))
}

type InitFuture = Pin<Box<dyn Future<Output = Result<Arc<dyn Library>>> + Send>>;
type InitFn = dyn Fn(LibraryArgs) -> InitFuture + Send + Sync;

/// Loader backed by an async closure.
pub struct FnLoader {
    name: String,
    init: Box<InitFn>,
}

impl FnLoader {
    pub fn new<F, Fut>(init: F) -> Self
    where
        F: Fn(LibraryArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn Library>>> + Send + 'static,
    {
        Self {
            name: String::new(),
            init: Box::new(move |args| Box::pin(init(args))),
        }
    }
}

#[async_trait]
impl LibraryLoader for FnLoader {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self, args: LibraryArgs) -> Result<Arc<dyn Library>> {
        (self.init)(args).await
    }
}

/// Loader for library types that start from their `Default` value.
///
/// The instance is built with `T::default()` and then goes through
/// [`construct`].
pub struct DefaultLoader<T> {
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DefaultLoader<T> {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for DefaultLoader<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Library + Default> LibraryLoader for DefaultLoader<T> {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self, args: LibraryArgs) -> Result<Arc<dyn Library>> {
        construct(T::default(), &args).await
    }
}
