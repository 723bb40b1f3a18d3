use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::auth::error::{ApiError, AuthError};
use crate::auth::identity::{Credential, Identity};
use crate::auth::traits::{AuthStore, KeyValidator};

/// Framework-agnostic view of an incoming request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRequest {
    pub method: String,
    pub path: String,
    headers: HashMap<String, String>,
}

impl AuthRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
        }
    }

    /// Header names are case-insensitive.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Resolves a credential to an identity with its effective permissions.
pub struct Authenticator {
    store: Arc<dyn AuthStore>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    pub async fn authenticate(&self, credential: &Credential) -> Result<Identity, AuthError> {
        let mut identity = self
            .store
            .lookup(credential)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?
            .ok_or(AuthError::UnknownIdentity)?;

        for role in identity.roles.clone() {
            let granted = self
                .store
                .role_permissions(&role)
                .await
                .map_err(|e| AuthError::Store(e.to_string()))?;
            for permission in granted {
                if !identity.permissions.contains(&permission) {
                    identity.permissions.push(permission);
                }
            }
        }
        Ok(identity)
    }
}

/// Checks an identity's permissions against method and path.
#[derive(Debug, Default, Clone, Copy)]
pub struct Authorizer;

impl Authorizer {
    pub fn new() -> Self {
        Self
    }

    pub fn authorize(&self, identity: &Identity, method: &str, path: &str) -> Result<(), AuthError> {
        if identity.is_allowed(method, path) {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                subject: identity.subject.clone(),
                method: method.to_string(),
                path: path.to_string(),
            })
        }
    }
}

/// Validator, authenticator and authorizer run in that order; the first
/// failure ends the check with an unauthorized [`ApiError`].
pub struct AuthChain {
    validator: Arc<dyn KeyValidator>,
    authenticator: Authenticator,
    authorizer: Authorizer,
}

impl AuthChain {
    pub fn new(validator: Arc<dyn KeyValidator>, authenticator: Authenticator, authorizer: Authorizer) -> Self {
        Self {
            validator,
            authenticator,
            authorizer,
        }
    }

    pub fn validator_name(&self) -> &str {
        self.validator.name()
    }

    pub async fn check(&self, request: &AuthRequest) -> Result<Identity, ApiError> {
        let credential = self.validator.validate(request).map_err(|e| deny("validate", request, e))?;
        let identity = self
            .authenticator
            .authenticate(&credential)
            .await
            .map_err(|e| deny("authenticate", request, e))?;
        self.authorizer
            .authorize(&identity, &request.method, &request.path)
            .map_err(|e| deny("authorize", request, e))?;
        debug!("{} {} allowed for '{}'", request.method, request.path, identity.subject);
        Ok(identity)
    }
}

fn deny(step: &str, request: &AuthRequest, error: AuthError) -> ApiError {
    debug!("{} {} denied at {}: {}", request.method, request.path, step, error);
    error.into()
}
