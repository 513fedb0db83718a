use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::database::StoreError;

/// Connects the single application pool from DATABASE_URL and applies
/// pending migrations. The caller decides what to do when DATABASE_URL
/// is absent (dev-mode memory stores, or fail-closed 503 stores).
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let database_url = std::env::var("DATABASE_URL").map_err(|_| StoreError::Unavailable)?;

    // Validate up front so a malformed URL fails with a clear error
    url::Url::parse(&database_url).map_err(|_| StoreError::Unavailable)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout))
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StoreError::Sqlx(sqlx::Error::Migrate(Box::new(e))))?;

    info!("Connected database pool (max_connections={})", config.max_connections);
    Ok(pool)
}
