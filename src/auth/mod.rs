use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;

/// Token issuer claim shared by access and session tokens.
pub const ISSUER: &str = "mobile-auth-api";

/// Name of the first-party session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Claims carried by a self-contained access token. Validity is purely
/// signature + expiry; no server-side state lookup.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub device: String,
    pub scopes: Vec<String>,
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Claims carried by a first-party session cookie. Signed in an
/// independent domain from access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub email: String,
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret not configured")]
    MissingSecret,

    #[error("token encoding failed: {0}")]
    Encoding(String),

    #[error("invalid token")]
    Invalid,
}

/// A freshly minted token pair. The raw refresh token exists only here
/// and in the response body; persistence stores its hash.
#[derive(Debug)]
pub struct IssuedTokens {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Mints and verifies signed tokens. Construction fails if either
/// signing secret is absent, so a misconfigured process can never
/// issue unsigned or weak tokens.
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    session_encoding: EncodingKey,
    session_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        access_secret: &str,
        session_secret: &str,
        access_ttl_secs: i64,
        refresh_ttl_days: i64,
    ) -> Result<Self, TokenError> {
        if access_secret.is_empty() || session_secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        if access_ttl_secs <= 0 || refresh_ttl_days <= 0 {
            return Err(TokenError::Encoding("token TTLs must be positive".to_string()));
        }

        Ok(Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            session_encoding: EncodingKey::from_secret(session_secret.as_bytes()),
            session_decoding: DecodingKey::from_secret(session_secret.as_bytes()),
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::days(refresh_ttl_days),
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, TokenError> {
        Self::new(
            &security.jwt_secret,
            &security.session_secret,
            security.access_token_ttl_secs,
            security.refresh_token_ttl_days,
        )
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    /// Mint a signed access token and a high-entropy refresh token for
    /// one (user, device) pair. Persistence of the refresh token hash
    /// is the caller's responsibility.
    pub fn issue_tokens(
        &self,
        user_id: Uuid,
        device_id: &str,
        scopes: &[String],
    ) -> Result<IssuedTokens, TokenError> {
        let now = Utc::now();
        let access_expires_at = now + self.access_ttl;
        let refresh_expires_at = now + self.refresh_ttl;

        let claims = AccessClaims {
            sub: user_id,
            device: device_id.to_string(),
            scopes: scopes.to_vec(),
            token_type: "access".to_string(),
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
            iss: ISSUER.to_string(),
        };

        let access_token = encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(IssuedTokens {
            access_token,
            access_expires_at,
            refresh_token: generate_refresh_token(),
            refresh_expires_at,
        })
    }

    /// Verify signature, expiry, issuer and token type. Malformed or
    /// expired input is a normal rejection, never a panic.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        validation.leeway = 0;

        let data = decode::<AccessClaims>(token, &self.access_decoding, &validation)
            .map_err(|_| TokenError::Invalid)?;

        if data.claims.token_type != "access" {
            return Err(TokenError::Invalid);
        }
        Ok(data.claims)
    }

    /// Mint a first-party session token. The web application sets this
    /// as the `session` cookie after a browser sign-in.
    pub fn issue_session_token(&self, user_id: Uuid, email: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id,
            email: email.to_string(),
            token_type: "session".to_string(),
            iat: now.timestamp(),
            // Sessions live as long as the refresh lineage
            exp: (now + self.refresh_ttl).timestamp(),
            iss: ISSUER.to_string(),
        };

        encode(&Header::default(), &claims, &self.session_encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    pub fn verify_session_token(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.session_decoding, &validation)
            .map_err(|_| TokenError::Invalid)?;

        if data.claims.token_type != "session" {
            return Err(TokenError::Invalid);
        }
        Ok(data.claims)
    }
}

/// Cryptographically random refresh token: 256 bits, URL-safe base64.
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// One-way hash of a raw refresh token. Only this value is persisted;
/// lookup is by hash equality, so no timing-sensitive comparison of
/// raw secrets happens at the storage layer.
pub fn hash_refresh_token(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    format!("{:x}", digest)
}
