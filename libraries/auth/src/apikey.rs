use webcore_core::auth::{AuthError, AuthRequest, Credential, KeyValidator};

/// Scheme name matched against `auth.type`
pub const SCHEME: &str = "apikey";

/// Reads the API key from a request header.
#[derive(Debug, Clone)]
pub struct ApiKeyValidator {
    header: String,
}

impl ApiKeyValidator {
    pub fn new(header: impl Into<String>) -> Self {
        Self { header: header.into() }
    }

    pub fn header(&self) -> &str {
        &self.header
    }
}

impl KeyValidator for ApiKeyValidator {
    fn name(&self) -> &str {
        SCHEME
    }

    fn validate(&self, request: &AuthRequest) -> Result<Credential, AuthError> {
        let raw = request.header(&self.header).ok_or_else(|| AuthError::MissingKey {
            header: self.header.clone(),
        })?;
        let key = raw.trim();
        if key.is_empty() {
            return Err(AuthError::InvalidKey("API key is empty".to_string()));
        }
        if key.chars().any(char::is_whitespace) {
            return Err(AuthError::InvalidKey("API key contains whitespace".to_string()));
        }
        Ok(Credential::new(SCHEME, key))
    }
}
