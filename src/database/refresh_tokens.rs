use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::models::RefreshTokenRecord;
use crate::database::StoreError;

/// Insert payload for a refresh-token row. `expires_at` must be
/// strictly in the future; `TokenService` guarantees it by requiring a
/// positive refresh TTL.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub token_hash: String,
    pub scopes: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

/// Storage contract for refresh tokens. The table is the only shared
/// mutable resource in the service and is mutated exclusively through
/// these operations, each of which uses the backend's native atomic
/// primitives - there is no read-decide-write across separate calls.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Keyed lookup by token hash. Returns rows regardless of
    /// rotation/revocation/expiry; callers check `is_active`.
    async fn find_by_hash(&self, token_hash: &str)
        -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Atomic rotation claim: marks the old row rotated iff it is
    /// still active, and inserts the replacement, in one transaction.
    /// Returns `false` when the claim was lost to a concurrent
    /// rotation; the replacement is not inserted in that case.
    async fn claim_and_replace(
        &self,
        old_id: Uuid,
        replacement: NewRefreshToken,
    ) -> Result<bool, StoreError>;

    /// Revokes all active rows for the new row's (user, device) pair
    /// and inserts the new row in one transaction, so stale sessions
    /// cannot coexist with the fresh one.
    async fn replace_for_device(&self, new: NewRefreshToken) -> Result<(), StoreError>;

    /// Marks all active rows for (user, device) revoked. Idempotent;
    /// returns the number of rows touched.
    async fn revoke_for_device(&self, user_id: Uuid, device_id: &str)
        -> Result<u64, StoreError>;

    /// Backend liveness, used by /health.
    async fn ping(&self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres backend

pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT * FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn claim_and_replace(
        &self,
        old_id: Uuid,
        replacement: NewRefreshToken,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Conditional update is the claim: of two concurrent refreshes
        // only one can match the still-active row.
        let claimed = sqlx::query(
            "UPDATE refresh_tokens
             SET rotated_at = now(), updated_at = now()
             WHERE id = $1
               AND rotated_at IS NULL
               AND revoked_at IS NULL
               AND expires_at > now()",
        )
        .bind(old_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_row(&mut tx, &replacement).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn replace_for_device(&self, new: NewRefreshToken) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE refresh_tokens
             SET revoked_at = now(), updated_at = now()
             WHERE user_id = $1 AND device_id = $2
               AND rotated_at IS NULL AND revoked_at IS NULL",
        )
        .bind(new.user_id)
        .bind(&new.device_id)
        .execute(&mut *tx)
        .await?;

        insert_row(&mut tx, &new).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn revoke_for_device(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<u64, StoreError> {
        let revoked = sqlx::query(
            "UPDATE refresh_tokens
             SET revoked_at = now(), updated_at = now()
             WHERE user_id = $1 AND device_id = $2
               AND rotated_at IS NULL AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(device_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(revoked)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn insert_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    new: &NewRefreshToken,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO refresh_tokens
           (id, user_id, device_id, token_hash, scopes, created_at, updated_at, expires_at)
         VALUES ($1, $2, $3, $4, $5, now(), now(), $6)",
    )
    .bind(new.id)
    .bind(new.user_id)
    .bind(&new.device_id)
    .bind(&new.token_hash)
    .bind(&new.scopes)
    .bind(new.expires_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory backend (dev mode without a database, and the test suite)

#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    rows: Mutex<HashMap<Uuid, RefreshTokenRecord>>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn materialize(new: &NewRefreshToken, now: DateTime<Utc>) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: new.id,
            user_id: new.user_id,
            device_id: new.device_id.clone(),
            token_hash: new.token_hash.clone(),
            scopes: new.scopes.clone(),
            created_at: now,
            updated_at: now,
            expires_at: new.expires_at,
            rotated_at: None,
            revoked_at: None,
        }
    }

    /// Test hook: force a row's expiry into the past.
    pub async fn expire(&self, id: Uuid) {
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.get_mut(&id) {
            row.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.values().find(|r| r.token_hash == token_hash).cloned())
    }

    async fn claim_and_replace(
        &self,
        old_id: Uuid,
        replacement: NewRefreshToken,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        // Claim and insert happen under one lock acquisition, so a
        // concurrent reader observes the rotation atomically.
        let mut rows = self.rows.lock().await;

        let claimed = match rows.get_mut(&old_id) {
            Some(row) if row.is_active(now) => {
                row.rotated_at = Some(now);
                row.updated_at = now;
                true
            }
            _ => false,
        };

        if claimed {
            rows.insert(replacement.id, Self::materialize(&replacement, now));
        }
        Ok(claimed)
    }

    async fn replace_for_device(&self, new: NewRefreshToken) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut rows = self.rows.lock().await;
        for row in rows.values_mut() {
            if row.user_id == new.user_id
                && row.device_id == new.device_id
                && row.rotated_at.is_none()
                && row.revoked_at.is_none()
            {
                row.revoked_at = Some(now);
                row.updated_at = now;
            }
        }
        rows.insert(new.id, Self::materialize(&new, now));
        Ok(())
    }

    async fn revoke_for_device(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut rows = self.rows.lock().await;
        let mut revoked = 0;
        for row in rows.values_mut() {
            if row.user_id == user_id
                && row.device_id == device_id
                && row.rotated_at.is_none()
                && row.revoked_at.is_none()
            {
                row.revoked_at = Some(now);
                row.updated_at = now;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Absent backend: every operation reports 503-class unavailability

pub struct UnconfiguredRefreshTokenStore;

#[async_trait]
impl RefreshTokenStore for UnconfiguredRefreshTokenStore {
    async fn find_by_hash(
        &self,
        _token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn claim_and_replace(
        &self,
        _old_id: Uuid,
        _replacement: NewRefreshToken,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn replace_for_device(&self, _new: NewRefreshToken) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn revoke_for_device(
        &self,
        _user_id: Uuid,
        _device_id: &str,
    ) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn new_token(user_id: Uuid, device_id: &str, hash: &str) -> NewRefreshToken {
        NewRefreshToken {
            id: Uuid::new_v4(),
            user_id,
            device_id: device_id.to_string(),
            token_hash: hash.to_string(),
            scopes: vec!["chat".to_string()],
            expires_at: Utc::now() + Duration::days(30),
        }
    }

    #[tokio::test]
    async fn insert_then_find_by_hash() {
        let store = MemoryRefreshTokenStore::new();
        let user_id = Uuid::new_v4();
        store
            .replace_for_device(new_token(user_id, "device-1", "hash-a"))
            .await
            .unwrap();

        let found = store.find_by_hash("hash-a").await.unwrap().unwrap();
        assert_eq!(found.user_id, user_id);
        assert_eq!(found.device_id, "device-1");
        assert!(found.rotated_at.is_none());
        assert!(found.revoked_at.is_none());
    }

    #[tokio::test]
    async fn replace_for_device_revokes_prior_active_rows() {
        let store = MemoryRefreshTokenStore::new();
        let user_id = Uuid::new_v4();
        store
            .replace_for_device(new_token(user_id, "device-1", "hash-old"))
            .await
            .unwrap();
        store
            .replace_for_device(new_token(user_id, "device-1", "hash-new"))
            .await
            .unwrap();

        let old = store.find_by_hash("hash-old").await.unwrap().unwrap();
        assert!(old.revoked_at.is_some());
        let new = store.find_by_hash("hash-new").await.unwrap().unwrap();
        assert!(new.is_active(Utc::now()));
    }

    #[tokio::test]
    async fn claim_is_single_use() {
        let store = MemoryRefreshTokenStore::new();
        let user_id = Uuid::new_v4();
        let original = new_token(user_id, "device-1", "hash-a");
        let original_id = original.id;
        store.replace_for_device(original).await.unwrap();

        let first = store
            .claim_and_replace(original_id, new_token(user_id, "device-1", "hash-b"))
            .await
            .unwrap();
        let second = store
            .claim_and_replace(original_id, new_token(user_id, "device-1", "hash-c"))
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        // The losing claim must not have inserted its replacement
        assert!(store.find_by_hash("hash-c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_claims_yield_exactly_one_winner() {
        let store = Arc::new(MemoryRefreshTokenStore::new());
        let user_id = Uuid::new_v4();
        let original = new_token(user_id, "device-1", "hash-a");
        let original_id = original.id;
        store.replace_for_device(original).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .claim_and_replace(
                        original_id,
                        new_token(user_id, "device-1", &format!("hash-{}", i)),
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn expired_rows_cannot_be_claimed() {
        let store = MemoryRefreshTokenStore::new();
        let user_id = Uuid::new_v4();
        let original = new_token(user_id, "device-1", "hash-a");
        let original_id = original.id;
        store.replace_for_device(original).await.unwrap();
        store.expire(original_id).await;

        let claimed = store
            .claim_and_replace(original_id, new_token(user_id, "device-1", "hash-b"))
            .await
            .unwrap();
        assert!(!claimed);
    }

    #[tokio::test]
    async fn revoke_for_device_is_idempotent_and_scoped() {
        let store = MemoryRefreshTokenStore::new();
        let user_id = Uuid::new_v4();
        store
            .replace_for_device(new_token(user_id, "device-1", "hash-a"))
            .await
            .unwrap();
        store
            .replace_for_device(new_token(user_id, "device-2", "hash-b"))
            .await
            .unwrap();

        assert_eq!(store.revoke_for_device(user_id, "device-1").await.unwrap(), 1);
        assert_eq!(store.revoke_for_device(user_id, "device-1").await.unwrap(), 0);

        // The other device's lineage is untouched
        let other = store.find_by_hash("hash-b").await.unwrap().unwrap();
        assert!(other.is_active(Utc::now()));
    }

    #[tokio::test]
    async fn unconfigured_store_reports_unavailable() {
        let store = UnconfiguredRefreshTokenStore;
        assert!(matches!(
            store.find_by_hash("x").await,
            Err(StoreError::Unavailable)
        ));
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable)));
    }
}
