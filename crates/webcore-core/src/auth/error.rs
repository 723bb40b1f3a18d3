use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP status reported for every authentication failure.
pub const UNAUTHORIZED_HTTP_CODE: u16 = 401;
/// Application error code for authentication failures.
pub const UNAUTHORIZED_ERROR_CODE: u32 = 2;
pub const UNAUTHORIZED_ERROR_NAME: &str = "UNAUTHORIZED";

/// Failure of one step of the authentication chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing credential in header '{header}'")]
    MissingKey { header: String },

    #[error("invalid credential: {0}")]
    InvalidKey(String),

    #[error("unknown identity")]
    UnknownIdentity,

    #[error("{method} {path} is not permitted for '{subject}'")]
    Forbidden {
        subject: String,
        method: String,
        path: String,
    },

    #[error("authentication store failed: {0}")]
    Store(String),

    #[error("authentication misconfigured: {0}")]
    Misconfigured(String),
}

/// The JSON error body returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{error_name} ({http_code}): {message}")]
pub struct ApiError {
    pub http_code: u16,
    pub error_code: u32,
    pub error_name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(http_code: u16, error_code: u32, error_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            http_code,
            error_code,
            error_name: error_name.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(UNAUTHORIZED_HTTP_CODE, UNAUTHORIZED_ERROR_CODE, UNAUTHORIZED_ERROR_NAME, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        ApiError::unauthorized(error.to_string())
    }
}
