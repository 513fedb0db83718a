use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub oidc: OidcConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Signing secret for access tokens. Empty outside development is a
    /// startup failure; in development a throwaway fallback is substituted.
    pub jwt_secret: String,
    /// Independent signing secret for first-party session cookies.
    pub session_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_days: i64,
    /// Exact-match origin allow-list. An EMPTY list allows any origin -
    /// a deliberate fail-open default for same-origin/dev deployments.
    /// Set AUTH_ALLOWED_ORIGINS on any cross-origin production surface.
    pub allowed_origins: Vec<String>,
    /// Accepts synthetic "dev:<email>" authorization codes without a
    /// provider round trip. Never enabled in the production preset.
    pub dev_mode: bool,
    /// Scopes granted on login and to cookie-authenticated callers.
    pub default_scopes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("AUTH_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("AUTH_SESSION_SECRET") {
            self.security.session_secret = v;
        }
        if let Ok(v) = env::var("AUTH_ACCESS_TTL_SECS") {
            self.security.access_token_ttl_secs =
                v.parse().unwrap_or(self.security.access_token_ttl_secs);
        }
        if let Ok(v) = env::var("AUTH_REFRESH_TTL_DAYS") {
            self.security.refresh_token_ttl_days =
                v.parse().unwrap_or(self.security.refresh_token_ttl_days);
        }
        if let Ok(v) = env::var("AUTH_ALLOWED_ORIGINS") {
            self.security.allowed_origins = v
                .split([',', '\n'])
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("AUTH_DEV_MODE") {
            // Dev-mode codes are a local convenience only; the production
            // preset ignores attempts to switch them on.
            if self.environment != Environment::Production {
                self.security.dev_mode = v.parse().unwrap_or(self.security.dev_mode);
            }
        }
        if let Ok(v) = env::var("AUTH_DEFAULT_SCOPES") {
            self.security.default_scopes =
                v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }

        // OIDC provider overrides
        if let Ok(v) = env::var("OIDC_AUTHORIZATION_ENDPOINT") {
            self.oidc.authorization_endpoint = v;
        }
        if let Ok(v) = env::var("OIDC_TOKEN_ENDPOINT") {
            self.oidc.token_endpoint = v;
        }
        if let Ok(v) = env::var("OIDC_USERINFO_ENDPOINT") {
            self.oidc.userinfo_endpoint = v;
        }
        if let Ok(v) = env::var("OIDC_CLIENT_ID") {
            self.oidc.client_id = v;
        }
        if let Ok(v) = env::var("OIDC_CLIENT_SECRET") {
            self.oidc.client_secret = v;
        }
        if let Ok(v) = env::var("OIDC_REDIRECT_URI") {
            self.oidc.redirect_uri = v;
        }
        if let Ok(v) = env::var("OIDC_SCOPE") {
            self.oidc.scope = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                // Throwaway local secrets; overridden by AUTH_JWT_SECRET / AUTH_SESSION_SECRET
                jwt_secret: "dev-access-token-secret".to_string(),
                session_secret: "dev-session-secret".to_string(),
                access_token_ttl_secs: 600,
                refresh_token_ttl_days: 30,
                allowed_origins: vec![],
                dev_mode: true,
                default_scopes: vec!["chat".to_string()],
            },
            oidc: OidcConfig::placeholder(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                session_secret: String::new(),
                access_token_ttl_secs: 600,
                refresh_token_ttl_days: 14,
                allowed_origins: vec![],
                dev_mode: false,
                default_scopes: vec!["chat".to_string()],
            },
            oidc: OidcConfig::placeholder(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                // Must come from AUTH_JWT_SECRET; startup fails closed otherwise
                jwt_secret: String::new(),
                session_secret: String::new(),
                access_token_ttl_secs: 600,
                refresh_token_ttl_days: 14,
                allowed_origins: vec![],
                dev_mode: false,
                default_scopes: vec!["chat".to_string()],
            },
            oidc: OidcConfig::placeholder(),
        }
    }
}

impl OidcConfig {
    fn placeholder() -> Self {
        Self {
            authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_endpoint: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            scope: "openid email profile".to_string(),
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
