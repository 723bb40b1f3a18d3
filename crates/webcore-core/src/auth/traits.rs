use async_trait::async_trait;

use crate::auth::chain::AuthRequest;
use crate::auth::error::AuthError;
use crate::auth::identity::{Credential, Identity, Permission};
use crate::kernel::error::Result;

/// First step of the chain: extract and sanity-check a credential.
pub trait KeyValidator: Send + Sync {
    /// Scheme name, compared against the configured `auth.type`.
    fn name(&self) -> &str;

    fn validate(&self, request: &AuthRequest) -> std::result::Result<Credential, AuthError>;
}

/// Backing store of identities and role permissions.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// The identity owning `credential`, with its directly granted
    /// permissions and role names.
    async fn lookup(&self, credential: &Credential) -> Result<Option<Identity>>;

    /// Permissions granted by `role`; unknown roles grant nothing.
    async fn role_permissions(&self, role: &str) -> Result<Vec<Permission>>;
}
