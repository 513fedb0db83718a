use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::OidcConfig;
use crate::database::{RefreshTokenStore, UserStore};
use crate::oidc::CredentialExchange;
use crate::services::TokenIssuer;

/// Shared handler state. Stores and the credential exchanger are trait
/// objects so the Postgres, in-memory and absent backends wire in
/// interchangeably.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub users: Arc<dyn UserStore>,
    pub credentials: Arc<dyn CredentialExchange>,
    pub oidc: Arc<OidcConfig>,
    pub allowed_origins: Arc<Vec<String>>,
    pub default_scopes: Arc<Vec<String>>,
}

impl AppState {
    pub fn issuer(&self) -> TokenIssuer {
        TokenIssuer::new(self.tokens.clone(), self.refresh_tokens.clone())
    }
}
