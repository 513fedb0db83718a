pub mod manager;
pub mod models;
pub mod refresh_tokens;
pub mod users;

use thiserror::Error;

/// Errors crossing the storage boundary. `Unavailable` means the
/// persistence collaborator is absent or unreachable and surfaces as
/// HTTP 503 rather than an unhandled failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistence backend not configured or unreachable")]
    Unavailable,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub use refresh_tokens::{
    MemoryRefreshTokenStore, NewRefreshToken, PgRefreshTokenStore, RefreshTokenStore,
    UnconfiguredRefreshTokenStore,
};
pub use users::{MemoryUserStore, PgUserStore, UnconfiguredUserStore, UserStore};
