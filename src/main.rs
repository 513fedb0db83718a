use std::sync::Arc;

use mobile_auth_api::auth::TokenService;
use mobile_auth_api::config::{self, Environment};
use mobile_auth_api::database::{
    manager, MemoryRefreshTokenStore, MemoryUserStore, PgRefreshTokenStore, PgUserStore,
    UnconfiguredRefreshTokenStore, UnconfiguredUserStore,
};
use mobile_auth_api::oidc::OidcClient;
use mobile_auth_api::{app, AppState};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, AUTH_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting mobile-auth-api in {:?} mode", config.environment);

    // Signing misconfiguration is fatal: the process must never come up
    // able to issue unsigned or weak tokens.
    let tokens = match TokenService::from_config(&config.security) {
        Ok(tokens) => Arc::new(tokens),
        Err(e) => {
            tracing::error!("Cannot start token service: {} (set AUTH_JWT_SECRET / AUTH_SESSION_SECRET)", e);
            std::process::exit(1);
        }
    };

    let state = build_state(tokens, config).await;
    let app = app(state);

    // Allow tests or deployments to override port via env
    let port = std::env::var("AUTH_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("mobile-auth-api listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

/// Wire the persistence backends: Postgres when DATABASE_URL is set,
/// in-memory in dev mode without one, and otherwise fail-closed stores
/// that surface every operation as 503 until persistence is configured.
async fn build_state(
    tokens: Arc<TokenService>,
    config: &'static config::AppConfig,
) -> AppState {
    let security = &config.security;
    let credentials = Arc::new(OidcClient::new(config.oidc.clone(), security.dev_mode));

    let (refresh_tokens, users): (
        Arc<dyn mobile_auth_api::database::RefreshTokenStore>,
        Arc<dyn mobile_auth_api::database::UserStore>,
    ) = if std::env::var("DATABASE_URL").is_ok() {
        match manager::connect_pool(&config.database).await {
            Ok(pool) => (
                Arc::new(PgRefreshTokenStore::new(pool.clone())),
                Arc::new(PgUserStore::new(pool)),
            ),
            Err(e) => {
                tracing::error!("Database connection failed: {}; serving 503 for auth operations", e);
                (
                    Arc::new(UnconfiguredRefreshTokenStore),
                    Arc::new(UnconfiguredUserStore),
                )
            }
        }
    } else if config.environment == Environment::Development {
        tracing::warn!("DATABASE_URL not set; using in-memory stores (development only)");
        (
            Arc::new(MemoryRefreshTokenStore::new()),
            Arc::new(MemoryUserStore::new()),
        )
    } else {
        tracing::error!("DATABASE_URL not set; serving 503 for auth operations");
        (
            Arc::new(UnconfiguredRefreshTokenStore),
            Arc::new(UnconfiguredUserStore),
        )
    };

    AppState {
        tokens,
        refresh_tokens,
        users,
        credentials,
        oidc: Arc::new(config.oidc.clone()),
        allowed_origins: Arc::new(security.allowed_origins.clone()),
        default_scopes: Arc::new(security.default_scopes.clone()),
    }
}
