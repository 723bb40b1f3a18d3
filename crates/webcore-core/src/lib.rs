pub mod auth;
pub mod config;
pub mod kernel;
pub mod library_system;
pub mod module_system;
pub mod ports;

// Re-export key public types/traits for easier use by the binary and libraries
pub use kernel::Application;
pub use kernel::AppContext;
pub use kernel::error::Error as KernelError;
pub use library_system::{Library, LibraryArgs, LibraryLoader, LibraryRegistry, Connector};
pub use module_system::Module;
pub use config::{AppConfig, ConfigLoader};

#[cfg(test)]
mod tests;
