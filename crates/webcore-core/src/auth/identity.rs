use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::auth::error::AuthError;

/// A credential extracted from a request by a
/// [`KeyValidator`](crate::auth::KeyValidator).
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Name of the validator that produced it (`apikey`, ...).
    pub scheme: String,
    pub value: String,
}

impl Credential {
    pub fn new(scheme: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("scheme", &self.scheme)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// `"<METHOD> <path-pattern>"`.
///
/// Method `*` matches any method. A pattern ending in `*` matches every path
/// starting with what precedes the star; any other pattern must match the
/// path exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission {
    method: String,
    pattern: String,
}

impl Permission {
    pub fn new(method: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            pattern: pattern.into(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, method: &str, path: &str) -> bool {
        if self.method != "*" && !self.method.eq_ignore_ascii_case(method) {
            return false;
        }
        match self.pattern.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => self.pattern == path,
        }
    }
}

impl FromStr for Permission {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(pattern), None) => Ok(Permission::new(method, pattern)),
            _ => Err(AuthError::Misconfigured(format!(
                "permission '{}' must look like '<METHOD> <path>'",
                s
            ))),
        }
    }
}

impl TryFrom<String> for Permission {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        permission.to_string()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.pattern)
    }
}

/// An authenticated principal and its effective permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn is_allowed(&self, method: &str, path: &str) -> bool {
        self.permissions.iter().any(|p| p.matches(method, path))
    }
}
