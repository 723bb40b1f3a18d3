use thiserror::Error;

/// Errors raised by port implementations (database, cache, pub/sub).
#[derive(Debug, Error)]
pub enum PortError {
    #[error("{port} is not available: {message}")]
    Unavailable { port: &'static str, message: String },

    #[error("Invalid filter on '{expr}': {message}")]
    InvalidFilter { expr: String, message: String },

    #[error("Unknown filter operator '{0}'")]
    UnknownOperator(String),

    #[error("Value conversion failed: {0}")]
    Conversion(#[from] serde_json::Error),

    #[error("Receiver failed: {0}")]
    Receiver(String),
}

impl PortError {
    pub fn unavailable(port: &'static str, message: impl Into<String>) -> Self {
        PortError::Unavailable {
            port,
            message: message.into(),
        }
    }

    pub fn invalid_filter(expr: impl Into<String>, message: impl Into<String>) -> Self {
        PortError::InvalidFilter {
            expr: expr.into(),
            message: message.into(),
        }
    }
}
