//! # Webcore Authentication
//!
//! A request passes through three strategies in order: a [`KeyValidator`]
//! extracts a [`Credential`], an [`Authenticator`] resolves it to an
//! [`Identity`] through an [`AuthStore`], and an [`Authorizer`] matches the
//! identity's [`Permission`]s against the request method and path.
//! [`AuthChain::check`] stops at the first failing step and reports an
//! unauthorized [`ApiError`].
pub mod chain;
pub mod error;
pub mod identity;
pub mod traits;

pub use chain::{AuthChain, AuthRequest, Authenticator, Authorizer};
pub use error::{ApiError, AuthError};
pub use identity::{Credential, Identity, Permission};
pub use traits::{AuthStore, KeyValidator};

#[cfg(test)]
mod tests;
