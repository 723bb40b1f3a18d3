//! # Webcore Module System
//!
//! A module is a self-contained feature unit. During `init` it resolves the
//! shared libraries it needs from the [`AppContext`](crate::kernel::AppContext)
//! (usually already-materialized singletons) and wires them into its own
//! handler/service/repository layers.
//!
//! The [`ModuleManager`] kernel component initializes modules in
//! registration order and destroys them in reverse.
pub mod manager;
pub mod traits;

pub use manager::ModuleManager;
pub use traits::Module;
