use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::OidcConfig;

/// Identity established by a successful credential exchange.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Provider subject identifier
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("authorization code was rejected")]
    InvalidCode,

    #[error("identity provider error: {0}")]
    Provider(String),
}

/// Turns an OIDC authorization code into a verified identity.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<VerifiedIdentity, ExchangeError>;
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    sub: String,
    email: String,
    name: Option<String>,
}

/// Real provider client: authorization-code grant against the token
/// endpoint, then a userinfo lookup with the provider access token.
pub struct OidcClient {
    http: reqwest::Client,
    config: OidcConfig,
    dev_mode: bool,
}

impl OidcClient {
    pub fn new(config: OidcConfig, dev_mode: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            dev_mode,
        }
    }

    /// Synthetic codes of the form `dev:<email>` verify without any
    /// provider round trip. Only honored when dev mode is on, which
    /// the production config preset never enables.
    fn dev_identity(&self, code: &str) -> Option<VerifiedIdentity> {
        if !self.dev_mode {
            return None;
        }
        let email = code.strip_prefix("dev:")?;
        if email.is_empty() || !email.contains('@') {
            return None;
        }
        debug!("Dev-mode credential exchange for {}", email);
        Some(VerifiedIdentity {
            subject: format!("dev:{}", email),
            email: email.to_string(),
            name: None,
        })
    }
}

#[async_trait]
impl CredentialExchange for OidcClient {
    async fn exchange_code(&self, code: &str) -> Result<VerifiedIdentity, ExchangeError> {
        if let Some(identity) = self.dev_identity(code) {
            return Ok(identity);
        }

        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| ExchangeError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            warn!("Token endpoint rejected authorization code: {}", response.status());
            return Err(ExchangeError::InvalidCode);
        }

        let tokens: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| ExchangeError::Provider(e.to_string()))?;

        let userinfo: UserInfoResponse = self
            .http
            .get(&self.config.userinfo_endpoint)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| ExchangeError::Provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| ExchangeError::Provider(e.to_string()))?
            .json()
            .await
            .map_err(|e| ExchangeError::Provider(e.to_string()))?;

        Ok(VerifiedIdentity {
            subject: userinfo.sub,
            email: userinfo.email,
            name: userinfo.name,
        })
    }
}

impl From<ExchangeError> for crate::error::ApiError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::InvalidCode => {
                crate::error::ApiError::unauthorized("Authorization code was not accepted")
            }
            ExchangeError::Provider(msg) => {
                tracing::error!("Identity provider failure: {}", msg);
                crate::error::ApiError::service_unavailable("Identity provider is not available")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(dev_mode: bool) -> OidcClient {
        let config = OidcConfig {
            authorization_endpoint: "https://idp.test/auth".to_string(),
            token_endpoint: "https://idp.test/token".to_string(),
            userinfo_endpoint: "https://idp.test/userinfo".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://app.test/callback".to_string(),
            scope: "openid email profile".to_string(),
        };
        OidcClient::new(config, dev_mode)
    }

    #[tokio::test]
    async fn dev_codes_resolve_without_a_provider() {
        let identity = client(true).exchange_code("dev:user@example.com").await.unwrap();
        assert_eq!(identity.email, "user@example.com");
        assert_eq!(identity.subject, "dev:user@example.com");
    }

    #[test]
    fn dev_codes_require_dev_mode_and_an_email() {
        assert!(client(false).dev_identity("dev:user@example.com").is_none());
        assert!(client(true).dev_identity("dev:").is_none());
        assert!(client(true).dev_identity("dev:not-an-email").is_none());
        assert!(client(true).dev_identity("abc123").is_none());
    }
}
