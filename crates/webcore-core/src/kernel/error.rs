//! # Webcore Kernel Errors
//!
//! Defines the top-level [`Error`] type shared by every subsystem.
//!
//! Subsystems keep their own typed errors ([`LibrarySystemError`],
//! [`ConfigError`], [`AuthError`], [`PortError`]) and the kernel error wraps them through
//! `#[from]` conversions, so `?` works across module boundaries.
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::auth::error::AuthError;
use crate::config::error::ConfigError;
use crate::library_system::error::LibrarySystemError;
use crate::ports::error::PortError;

/// Top-level error type for webcore
#[derive(Debug, ThisError)]
pub enum Error {
    /// Typed library registry / lifecycle error
    #[error("Library system error: {0}")]
    LibrarySystem(#[from] LibrarySystemError),

    /// Configuration loading or binding error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Authentication chain error
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Failure inside a database, cache or pub/sub implementation
    #[error("Port error: {0}")]
    Port(#[from] PortError),

    /// A module failed during its own initialization or teardown.
    #[error("Module '{module}' failed: {message}")]
    Module {
        module: String,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        component_name: Option<String>,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Error related to component registration or lookup.
    #[error("Component registry error during operation '{operation}': {message}")]
    ComponentRegistryError {
        operation: String,
        component_name: Option<String>,
        message: String,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase in the kernel's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Bootstrap")]
    Bootstrap,
    #[error("Initialize")]
    Initialize,
    #[error("Start")]
    Start,
    #[error("RunPreCheck")]
    RunPreCheck,
    #[error("Shutdown")]
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// Wraps an error raised by a module.
    pub fn module(module: impl Into<String>, message: impl Into<String>, source: Option<Error>) -> Self {
        Error::Module {
            module: module.into(),
            message: message.into(),
            source: source.map(Box::new),
        }
    }

    /// Returns the library-system error carried by this error, if any.
    pub fn as_library_error(&self) -> Option<&LibrarySystemError> {
        match self {
            Error::LibrarySystem(e) => Some(e),
            _ => None,
        }
    }
}
