use axum::{
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::handlers::auth;
use crate::middleware::{auth_middleware, cors_middleware};
use crate::state::AppState;

/// Full application router. The CORS gate wraps everything, so a
/// disallowed Origin is rejected before any handler - including the
/// authorizer on protected routes - ever runs.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_routes())
        .merge(protected_routes(state.clone()))
        .layer(from_fn_with_state(state.clone(), cors_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Token acquisition endpoints. Public: they authenticate by
/// authorization code, refresh token or session cookie themselves.
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/start", get(auth::auth_start))
        .route("/auth/callback", get(auth::auth_callback))
        .route("/auth/refresh", post(auth::auth_refresh))
        .route("/auth/web-token", post(auth::auth_web_token))
}

/// Routes behind the authorizer. Downstream API routers (/api/v1/*)
/// merge here to inherit the same gate ordering.
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(auth::me))
        .layer(from_fn_with_state(state, auth_middleware))
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "name": "mobile-auth-api",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "start": "GET /auth/start (public)",
            "callback": "GET /auth/callback?code=..&deviceId=.. (public)",
            "refresh": "POST /auth/refresh (public)",
            "web_token": "POST /auth/web-token (session cookie)",
            "me": "GET /me (bearer or cookie)",
        },
    }))
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    let now = chrono::Utc::now();
    match state.refresh_tokens.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "store": "ok",
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "timestamp": now,
                "store_error": e.to_string(),
            })),
        ),
    }
}
