#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};

use mobile_auth_api::auth::TokenService;
use mobile_auth_api::config::OidcConfig;
use mobile_auth_api::database::{
    MemoryRefreshTokenStore, MemoryUserStore, UnconfiguredRefreshTokenStore, UnconfiguredUserStore,
};
use mobile_auth_api::oidc::OidcClient;
use mobile_auth_api::{app, AppState};

pub const ACCESS_TTL_SECS: i64 = 600;

/// In-process server over memory stores and dev-mode credential
/// exchange, bound to an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub tokens: Arc<TokenService>,
    pub store: Arc<MemoryRefreshTokenStore>,
}

fn test_oidc_config() -> OidcConfig {
    OidcConfig {
        authorization_endpoint: "https://idp.test/authorize".to_string(),
        token_endpoint: "https://idp.test/token".to_string(),
        userinfo_endpoint: "https://idp.test/userinfo".to_string(),
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        redirect_uri: "https://app.test/callback".to_string(),
        scope: "openid email profile".to_string(),
    }
}

pub async fn spawn() -> Result<TestServer> {
    spawn_with_origins(vec![]).await
}

pub async fn spawn_with_origins(allowed_origins: Vec<String>) -> Result<TestServer> {
    let tokens = Arc::new(
        TokenService::new("test-access-secret", "test-session-secret", ACCESS_TTL_SECS, 30)
            .unwrap(),
    );
    let store = Arc::new(MemoryRefreshTokenStore::new());
    let oidc = test_oidc_config();

    let state = AppState {
        tokens: tokens.clone(),
        refresh_tokens: store.clone(),
        users: Arc::new(MemoryUserStore::new()),
        credentials: Arc::new(OidcClient::new(oidc.clone(), true)),
        oidc: Arc::new(oidc),
        allowed_origins: Arc::new(allowed_origins),
        default_scopes: Arc::new(vec!["chat".to_string()]),
    };

    let base_url = serve(state).await?;
    Ok(TestServer { base_url, tokens, store })
}

/// Server whose persistence collaborator is absent: any store call
/// surfaces as 503, which makes accidental store access observable.
pub async fn spawn_unconfigured() -> Result<String> {
    let tokens = Arc::new(
        TokenService::new("test-access-secret", "test-session-secret", ACCESS_TTL_SECS, 30)
            .unwrap(),
    );
    let oidc = test_oidc_config();

    let state = AppState {
        tokens,
        refresh_tokens: Arc::new(UnconfiguredRefreshTokenStore),
        users: Arc::new(UnconfiguredUserStore),
        credentials: Arc::new(OidcClient::new(oidc.clone(), true)),
        oidc: Arc::new(oidc),
        allowed_origins: Arc::new(vec![]),
        default_scopes: Arc::new(vec!["chat".to_string()]),
    };

    serve(state).await
}

async fn serve(state: AppState) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.expect("test server");
    });
    Ok(format!("http://{}", addr))
}

impl TestServer {
    /// Run the dev-mode callback flow and return the token response body.
    pub async fn login(
        &self,
        client: &reqwest::Client,
        email: &str,
        device_id: &str,
    ) -> Result<serde_json::Value> {
        let res = client
            .get(format!(
                "{}/auth/callback?code=dev:{}&deviceId={}",
                self.base_url, email, device_id
            ))
            .send()
            .await?;
        anyhow::ensure!(res.status().is_success(), "login failed: {}", res.status());
        Ok(res.json().await?)
    }
}
