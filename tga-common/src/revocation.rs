//! Revoked session token store
//!
//! A revoked token is remembered until its natural expiry, after which signature
//! verification rejects it anyway and the marker can be forgotten.
//!
//! The SQLite store is the production implementation: it lives in the database both
//! services already share, so every analysis-service process sees the same set.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::Result;

/// Set-with-expiry membership check for revoked tokens
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Remember `token` as revoked for `ttl`
    ///
    /// A zero or negative ttl is a no-op: the token is already unusable.
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<()>;

    /// Whether `token` is currently revoked
    ///
    /// Absence means not revoked. Storage failures are errors, never "not revoked".
    async fn is_revoked(&self, token: &str) -> Result<bool>;
}

/// Revocation markers in the `revoked_tokens` table
#[derive(Clone)]
pub struct SqliteRevocationStore {
    db: SqlitePool,
}

impl SqliteRevocationStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Drop markers whose token has expired anyway
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= ?")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RevocationStore for SqliteRevocationStore {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<()> {
        if ttl <= Duration::zero() {
            return Ok(());
        }
        let expires_at = Utc::now() + ttl;

        sqlx::query("INSERT OR REPLACE INTO revoked_tokens (token, expires_at) VALUES (?, ?)")
            .bind(token)
            .bind(expires_at)
            .execute(&self.db)
            .await?;

        let purged = self.purge_expired().await?;
        if purged > 0 {
            debug!(purged, "Purged expired revocation markers");
        }
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool> {
        let expires_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT expires_at FROM revoked_tokens WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.db)
                .await?;

        Ok(matches!(expires_at, Some(at) if at > Utc::now()))
    }
}

/// Process-local store for single-instance deployments and tests
#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<()> {
        if ttl <= Duration::zero() {
            return Ok(());
        }
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, expires_at| *expires_at > now);
        entries.insert(token.to_string(), now + ttl);
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool> {
        let entries = self.entries.read().await;
        Ok(matches!(entries.get(token), Some(at) if *at > Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_tracks_revocation() {
        let store = MemoryRevocationStore::new();
        assert!(!store.is_revoked("abc").await.unwrap());

        store.revoke("abc", Duration::minutes(5)).await.unwrap();
        assert!(store.is_revoked("abc").await.unwrap());
        assert!(!store.is_revoked("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_ignores_non_positive_ttl() {
        let store = MemoryRevocationStore::new();
        store.revoke("abc", Duration::zero()).await.unwrap();
        store.revoke("def", Duration::seconds(-10)).await.unwrap();
        assert!(!store.is_revoked("abc").await.unwrap());
        assert!(!store.is_revoked("def").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_marker_expires() {
        let store = MemoryRevocationStore::new();
        store.revoke("abc", Duration::milliseconds(20)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        assert!(!store.is_revoked("abc").await.unwrap());
    }
}
