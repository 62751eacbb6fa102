//! Revocation index storage for PostgreSQL.
//!
//! Tracks revoked token hashes with an expiry for cleanup. Once the covered
//! token would have expired on its own, the entry can be deleted.

use autoauth::RevocationEntry;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use time::OffsetDateTime;

use crate::{PgPool, StorageResult};

/// Revocation index operations.
pub struct RevocationStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> RevocationStorage<'a> {
    /// Create a new revocation storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Index a revoked token hash.
    ///
    /// Idempotent: indexing a hash twice keeps the later expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn insert(&self, entry: &RevocationEntry) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO oauth_revoked_tokens
                (token_hash, reason, user_id, client_id, revoked_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (token_hash) DO UPDATE
            SET expires_at = GREATEST(oauth_revoked_tokens.expires_at, EXCLUDED.expires_at)
            "#,
        )
        .bind(&entry.token_hash)
        .bind(entry.reason.as_str())
        .bind(entry.user_id.as_deref())
        .bind(entry.client_id.as_deref())
        .bind(entry.revoked_at)
        .bind(entry.expires_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Check if a hash has a live entry at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn is_revoked(&self, token_hash: &str, now: OffsetDateTime) -> StorageResult<bool> {
        let exists: bool = query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM oauth_revoked_tokens
                WHERE token_hash = $1 AND expires_at > $2
            )
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Delete entries that expired at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn purge_expired(&self, now: OffsetDateTime) -> StorageResult<u64> {
        let result = query("DELETE FROM oauth_revoked_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Get the number of indexed hashes.
    ///
    /// Useful for monitoring and debugging.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> StorageResult<i64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM oauth_revoked_tokens")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}
