//! # Webcore Library System Errors
//!
//! [`LibrarySystemError`] covers every failure the registry can report:
//! lookup misses on explicit unloads, construction failures, teardown
//! failures and contract violations.
use crate::kernel::error::Error;

#[derive(Debug, thiserror::Error)]
pub enum LibrarySystemError {
    #[error("Library loader '{name}' is not registered")]
    LoaderNotFound { name: String },

    #[error("Library instance '{name}' with key '{key}' not found")]
    InstanceNotFound { name: String, key: String },

    #[error("Failed to construct library '{name}' (key '{key}'): {source}")]
    ConstructionFailed {
        name: String,
        key: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to disconnect library '{name}' (key '{key}'): {source}")]
    DisconnectFailed {
        name: String,
        key: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to uninstall library '{name}' (key '{key}'): {source}")]
    UninstallFailed {
        name: String,
        key: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Library '{name}' does not satisfy '{expected}'")]
    ContractViolation { name: String, expected: String },

    #[error("Invalid construction arguments for library '{library}': {message}")]
    InvalidArguments { library: String, message: String },
}

impl LibrarySystemError {
    pub fn invalid_arguments(library: impl Into<String>, message: impl Into<String>) -> Self {
        LibrarySystemError::InvalidArguments {
            library: library.into(),
            message: message.into(),
        }
    }

    pub fn contract_violation(name: impl Into<String>, expected: impl Into<String>) -> Self {
        LibrarySystemError::ContractViolation {
            name: name.into(),
            expected: expected.into(),
        }
    }
}
