use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use log::info;

use webcore_core::auth::{
    ApiError, AuthChain, AuthError, AuthRequest, Authenticator, Authorizer, Identity, KeyValidator,
};
use webcore_core::config::AuthConfig;
use webcore_core::kernel::constants::{self, loader_name};
use webcore_core::kernel::context::AppContext;
use webcore_core::kernel::error::Result;
use webcore_core::library_system::{Library, LibraryArgs, LibrarySystemError};

use crate::apikey::ApiKeyValidator;
use crate::AUTHN_LOADER;

/// API-key authentication.
///
/// `install` checks that `auth.type` names this library's validator, then
/// materializes the `auth.store:<store>` singleton through the context's
/// registry so every consumer shares one store, and assembles the chain.
#[derive(Default)]
pub struct ApiKeyAuthentication {
    chain: OnceLock<AuthChain>,
}

impl ApiKeyAuthentication {
    /// Load (or reuse) the `authn:<auth.type>` singleton for `context`.
    pub async fn load(context: &Arc<AppContext>) -> Result<Arc<Self>> {
        let config = &context.config().auth;
        let name = loader_name(constants::AUTHN_LOADER_PREFIX, &config.kind);
        let args = LibraryArgs::new().with_context(context.clone()).with_config(config)?;
        context.registry().load_singleton_as::<Self>(&name, args).await
    }

    /// Run the chain for one request.
    pub async fn check(&self, request: &AuthRequest) -> std::result::Result<Identity, ApiError> {
        match self.chain.get() {
            Some(chain) => chain.check(request).await,
            None => Err(AuthError::Misconfigured("authentication is not installed".to_string()).into()),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.chain.get().is_some()
    }
}

impl fmt::Debug for ApiKeyAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyAuthentication")
            .field("installed", &self.is_installed())
            .finish()
    }
}

#[async_trait]
impl Library for ApiKeyAuthentication {
    fn kind(&self) -> &str {
        "apikey authentication"
    }

    async fn install(&self, args: &LibraryArgs) -> Result<()> {
        let config: AuthConfig = args.config_as(AUTHN_LOADER)?;
        let validator = Arc::new(ApiKeyValidator::new(config.header.clone()));
        if config.kind != validator.name() {
            return Err(AuthError::Misconfigured(format!(
                "auth type '{}' does not match validator '{}'",
                config.kind,
                validator.name()
            ))
            .into());
        }

        let context = args.require_context(AUTHN_LOADER)?;
        let registry = context.registry();
        let store_name = loader_name(constants::AUTH_STORE_LOADER_PREFIX, &config.store);
        let loader = registry
            .loader(&store_name)
            .ok_or_else(|| LibrarySystemError::LoaderNotFound { name: store_name.clone() })?;
        let store_args = LibraryArgs::new().with_context(context.clone()).with_config(&config)?;
        let store = registry
            .load_singleton_with(&loader, store_args)
            .await?
            .into_auth_store()
            .ok_or_else(|| LibrarySystemError::contract_violation(&store_name, "AuthStore"))?;

        let chain = AuthChain::new(validator, Authenticator::new(store), Authorizer::new());
        let _ = self.chain.set(chain);
        info!("API-key authentication ready (store {}, header {})", store_name, config.header);
        Ok(())
    }

    /// The store is a registry singleton of its own and is swept with it.
    async fn uninstall(&self) -> Result<()> {
        Ok(())
    }
}
