use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::models::User;
use crate::database::StoreError;

/// Maps a verified email to a stable internal user, creating the
/// record on first sight.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_or_create(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<User, StoreError>;
}

/// Case-normalization applied before any lookup or insert.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_or_create(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<User, StoreError> {
        let email = normalize_email(email);
        // Upsert keeps this race-free under concurrent first sign-ins
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, display_name, created_at, updated_at)
             VALUES ($1, $2, $3, now(), now())
             ON CONFLICT (email)
             DO UPDATE SET updated_at = now(),
                           display_name = COALESCE(EXCLUDED.display_name, users.display_name)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_or_create(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<User, StoreError> {
        let email = normalize_email(email);
        let mut users = self.users.lock().await;
        let now = Utc::now();
        let user = users.entry(email.clone()).or_insert_with(|| User {
            id: Uuid::new_v4(),
            email,
            display_name: display_name.map(|s| s.to_string()),
            created_at: now,
            updated_at: now,
        });
        user.updated_at = now;
        Ok(user.clone())
    }
}

pub struct UnconfiguredUserStore;

#[async_trait]
impl UserStore for UnconfiguredUserStore {
    async fn find_or_create(
        &self,
        _email: &str,
        _display_name: Option<&str>,
    ) -> Result<User, StoreError> {
        Err(StoreError::Unavailable)
    }
}
