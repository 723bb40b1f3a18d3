//! # Webcore Kernel
//!
//! The `kernel` module bootstraps the application and coordinates the
//! lifecycle of its core components.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Application Bootstrapping**: [`Application`](bootstrap::Application)
//!   builds the library registry and the application context, then runs
//!   every kernel component through initialize → start → stop.
//! - **Component Lifecycle**: the [`KernelComponent`](component::KernelComponent)
//!   trait and the ordered [`ComponentRegistry`](component::ComponentRegistry).
//! - **Application Context**: [`AppContext`](context::AppContext) carries the
//!   configuration, the registry handle and the shutdown token into every
//!   library and module that needs them.
//! - **Core Constants** and **Error Handling** (`constants`, `error`).
pub mod bootstrap;
pub mod component;
pub mod constants;
pub mod context;
pub mod error;

pub use bootstrap::Application;
pub use component::{ComponentRegistry, KernelComponent};
pub use context::AppContext;
pub use error::{Error, Result};

#[cfg(test)]
mod tests;
