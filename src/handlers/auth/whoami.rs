// GET /me - current authenticated caller, as the authorizer sees it

use axum::{response::Json, Extension};
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::{AuthSource, AuthUser, TokenKind};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: Uuid,
    pub scopes: Vec<String>,
    pub auth_source: AuthSource,
    pub token_type: TokenKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Authorizer failures never reach here; the middleware has already
/// translated them into their error responses verbatim.
pub async fn me(Extension(user): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        id: user.user_id,
        scopes: user.scopes,
        auth_source: user.source,
        token_type: user.token_kind,
        device_id: user.device_id,
    })
}
