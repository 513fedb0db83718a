// POST /auth/refresh - rotate a refresh token into a new pair

use axum::{extract::State, response::Json};
use serde::Deserialize;

use crate::error::ApiError;
use crate::services::TokenResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
    pub device_id: Option<String>,
}

/// Field validation happens before any store interaction; a request
/// missing either field never touches persistence. All substantive
/// rejections (unknown, rotated, revoked, expired, device mismatch)
/// share one generic 401 so the response is not an oracle.
pub async fn auth_refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let refresh_token = body
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::invalid_request("refreshToken is required"))?;
    let device_id = body
        .device_id
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::invalid_request("deviceId is required"))?;

    let response = state.issuer().refresh(&refresh_token, &device_id).await?;
    Ok(Json(response))
}
