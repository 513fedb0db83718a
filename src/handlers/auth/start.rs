// GET /auth/start - OIDC discovery for the mobile client

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub authorization_endpoint: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub code_challenge_method: &'static str,
}

/// Hands the mobile client everything it needs to begin the
/// authorization-code flow. No side effects.
pub async fn auth_start(State(state): State<AppState>) -> Json<StartResponse> {
    Json(StartResponse {
        authorization_endpoint: state.oidc.authorization_endpoint.clone(),
        client_id: state.oidc.client_id.clone(),
        redirect_uri: state.oidc.redirect_uri.clone(),
        scope: state.oidc.scope.clone(),
        code_challenge_method: "S256",
    })
}
