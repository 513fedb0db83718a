use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::SESSION_COOKIE;
use crate::error::ApiError;
use crate::state::AppState;

/// Which credential established the caller's identity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthSource {
    Bearer,
    Cookie,
}

/// Kind of token backing the identity. Cookie sessions are opaque to
/// the access-token lifecycle, hence `Unknown`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Unknown,
}

/// Authenticated caller context injected into protected requests.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub scopes: Vec<String>,
    pub source: AuthSource,
    pub token_kind: TokenKind,
    pub device_id: Option<String>,
}

impl AuthUser {
    /// Scope enforcement: authenticated-but-missing-scope is a 403,
    /// distinct from the 401 authentication failures.
    pub fn require_scope(&self, scope: &str) -> Result<(), ApiError> {
        if self.scopes.iter().any(|s| s == scope) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("Missing required scope: {}", scope)))
        }
    }
}

/// The authorization decision function: read-only, side-effect free,
/// and total - malformed tokens are rejections, not panics. Bearer
/// credentials take precedence; the session cookie is consulted only
/// when no Authorization header is present.
pub fn authorize(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    if let Some(token) = bearer_token(headers) {
        let claims = state
            .tokens
            .verify_access_token(&token)
            .map_err(|_| ApiError::unauthorized("Invalid or expired access token"))?;
        return Ok(AuthUser {
            user_id: claims.sub,
            scopes: claims.scopes,
            source: AuthSource::Bearer,
            token_kind: TokenKind::Access,
            device_id: Some(claims.device),
        });
    }

    if let Some(cookie) = session_cookie(headers) {
        let claims = state
            .tokens
            .verify_session_token(&cookie)
            .map_err(|_| ApiError::unauthorized("Invalid or expired session"))?;
        return Ok(AuthUser {
            user_id: claims.sub,
            scopes: state.default_scopes.as_ref().clone(),
            source: AuthSource::Cookie,
            token_kind: TokenKind::Unknown,
            device_id: None,
        });
    }

    Err(ApiError::unauthorized("Authentication required"))
}

/// Middleware wrapper around `authorize` that injects the caller
/// context for downstream handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authorize(&state, request.headers())?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Extract the bearer token from the Authorization header
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Extract the first-party session cookie value
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}
