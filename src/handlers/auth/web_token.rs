// POST /auth/web-token - mint a mobile token pair from a browser session

use axum::{
    extract::State,
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::middleware::auth::session_cookie;
use crate::services::TokenResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebTokenRequest {
    pub device_id: Option<String>,
}

/// Exchanges an established first-party session for a token pair, in
/// place of an authorization code. Prior tokens for the (user, device)
/// pair are always revoked before issuance.
pub async fn auth_web_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<WebTokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let cookie = session_cookie(&headers)
        .ok_or_else(|| ApiError::unauthorized("No session"))?;
    let session = state
        .tokens
        .verify_session_token(&cookie)
        .map_err(|_| ApiError::unauthorized("Invalid or expired session"))?;

    let device_id = body
        .device_id
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::invalid_request("deviceId is required"))?;

    info!(user_id = %session.sub, device_id, "Issuing web token pair from session");

    let response = state
        .issuer()
        .issue_for_device(session.sub, &device_id, &state.default_scopes)
        .await?;
    Ok(Json(response))
}
