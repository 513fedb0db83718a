use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{hash_refresh_token, IssuedTokens, TokenError, TokenService};
use crate::database::{NewRefreshToken, RefreshTokenStore, StoreError};
use crate::error::ApiError;

/// Token pair as returned to mobile and web-token clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    /// Seconds until the access token expires
    pub access_token_expires_in: i64,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub device_id: String,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    /// Any stale/unknown/mismatched/replayed presentation. Externally
    /// uniform so the response is not an oracle; the cause is logged
    /// internally before this is constructed.
    #[error("refresh token was not accepted")]
    Rejected,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Rejected => ApiError::unauthorized("Refresh token was not accepted"),
            RefreshError::Store(e) => e.into(),
            RefreshError::Token(e) => e.into(),
        }
    }
}

/// Issues token pairs and drives the refresh rotation protocol over
/// the token service and refresh-token store.
pub struct TokenIssuer {
    tokens: Arc<TokenService>,
    store: Arc<dyn RefreshTokenStore>,
}

impl TokenIssuer {
    pub fn new(tokens: Arc<TokenService>, store: Arc<dyn RefreshTokenStore>) -> Self {
        Self { tokens, store }
    }

    /// Login / web-token path: revoke whatever the device held before
    /// and persist the fresh pair, transactionally.
    pub async fn issue_for_device(
        &self,
        user_id: Uuid,
        device_id: &str,
        scopes: &[String],
    ) -> Result<TokenResponse, RefreshError> {
        let issued = self.tokens.issue_tokens(user_id, device_id, scopes)?;
        self.store
            .replace_for_device(new_row(user_id, device_id, scopes, &issued))
            .await?;

        info!(%user_id, device_id, "Issued token pair");
        Ok(self.response(device_id, issued))
    }

    /// Refresh rotation: a presented token rotates into a replacement
    /// exactly once. Every rejection path is externally identical.
    pub async fn refresh(
        &self,
        raw_token: &str,
        device_id: &str,
    ) -> Result<TokenResponse, RefreshError> {
        let token_hash = hash_refresh_token(raw_token);
        let Some(record) = self.store.find_by_hash(&token_hash).await? else {
            debug!(device_id, "Refresh rejected: token hash not found");
            return Err(RefreshError::Rejected);
        };

        // Logged distinctly for abuse detection, never surfaced
        if record.device_id != device_id {
            warn!(
                user_id = %record.user_id,
                presented_device = device_id,
                token_device = record.device_id,
                "Refresh rejected: device mismatch"
            );
            return Err(RefreshError::Rejected);
        }
        if record.rotated_at.is_some() || record.revoked_at.is_some() {
            // A second presentation of a rotated token is a strong
            // replay/compromise signal
            warn!(
                user_id = %record.user_id,
                device_id,
                rotated = record.rotated_at.is_some(),
                revoked = record.revoked_at.is_some(),
                "Refresh rejected: token already superseded"
            );
            return Err(RefreshError::Rejected);
        }
        if record.expires_at <= Utc::now() {
            debug!(user_id = %record.user_id, device_id, "Refresh rejected: token expired");
            return Err(RefreshError::Rejected);
        }

        let issued = self
            .tokens
            .issue_tokens(record.user_id, device_id, &record.scopes)?;
        let replacement = new_row(record.user_id, device_id, &record.scopes, &issued);

        // The store claim decides races: of two concurrent refreshes
        // with the same raw token, exactly one lands here and wins.
        if !self.store.claim_and_replace(record.id, replacement).await? {
            warn!(user_id = %record.user_id, device_id, "Refresh rejected: lost rotation claim");
            return Err(RefreshError::Rejected);
        }

        info!(user_id = %record.user_id, device_id, "Rotated refresh token");
        Ok(self.response(device_id, issued))
    }

    fn response(&self, device_id: &str, issued: IssuedTokens) -> TokenResponse {
        TokenResponse {
            access_token: issued.access_token,
            access_token_expires_in: self.tokens.access_ttl_secs(),
            refresh_token: issued.refresh_token,
            refresh_token_expires_at: issued.refresh_expires_at,
            device_id: device_id.to_string(),
        }
    }
}

fn new_row(
    user_id: Uuid,
    device_id: &str,
    scopes: &[String],
    issued: &IssuedTokens,
) -> NewRefreshToken {
    NewRefreshToken {
        id: Uuid::new_v4(),
        user_id,
        device_id: device_id.to_string(),
        token_hash: hash_refresh_token(&issued.refresh_token),
        scopes: scopes.to_vec(),
        expires_at: issued.refresh_expires_at,
    }
}
