// GET /auth/callback - exchange an OIDC authorization code for a token pair

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::services::TokenResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub device_id: Option<String>,
}

/// Credential exchange -> user resolution -> device-scoped issuance.
/// Issuance revokes whatever refresh lineage the device held before,
/// so a re-login never leaves two live chains.
pub async fn auth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<TokenResponse>, ApiError> {
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::invalid_request("code is required"))?;
    let device_id = query
        .device_id
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::invalid_request("deviceId is required"))?;

    let identity = state.credentials.exchange_code(&code).await?;
    let user = state
        .users
        .find_or_create(&identity.email, identity.name.as_deref())
        .await?;

    info!(user_id = %user.id, device_id, "Credential exchange succeeded");

    let response = state
        .issuer()
        .issue_for_device(user.id, &device_id, &state.default_scopes)
        .await?;
    Ok(Json(response))
}
