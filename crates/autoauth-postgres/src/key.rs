//! Signing key storage.
//!
//! Concurrent instances race to create a key with `INSERT ... ON CONFLICT DO
//! NOTHING` and then converge on the lowest active kid, so the table is the
//! only authority on which key is active.

use autoauth::SigningKeyRecord;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;

use crate::{PgPool, StorageResult};

type KeyTuple = (
    String,
    String,
    String,
    String,
    OffsetDateTime,
    OffsetDateTime,
    bool,
);

fn from_tuple(row: KeyTuple) -> SigningKeyRecord {
    SigningKeyRecord {
        kid: row.0,
        public_key_pem: row.1,
        private_key_pem: row.2,
        algorithm: row.3,
        created_at: row.4,
        expires_at: row.5,
        active: row.6,
    }
}

/// Signing key storage operations.
pub struct KeyStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> KeyStorage<'a> {
    /// Create a new key storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a key unless the kid is taken.
    ///
    /// Returns `true` if this statement inserted the row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn insert_if_absent(&self, record: &SigningKeyRecord) -> StorageResult<bool> {
        let result = query(
            r#"
            INSERT INTO oauth_signing_keys
                (kid, public_key_pem, private_key_pem, algorithm, created_at, expires_at, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (kid) DO NOTHING
            "#,
        )
        .bind(&record.kid)
        .bind(&record.public_key_pem)
        .bind(&record.private_key_pem)
        .bind(&record.algorithm)
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(record.active)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Find a key by kid.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find(&self, kid: &str) -> StorageResult<Option<SigningKeyRecord>> {
        let row: Option<KeyTuple> = query_as(
            r#"
            SELECT kid, public_key_pem, private_key_pem, algorithm, created_at, expires_at, active
            FROM oauth_signing_keys
            WHERE kid = $1
            "#,
        )
        .bind(kid)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(from_tuple))
    }

    /// List active keys by kid ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_active(&self) -> StorageResult<Vec<SigningKeyRecord>> {
        let rows: Vec<KeyTuple> = query_as(
            r#"
            SELECT kid, public_key_pem, private_key_pem, algorithm, created_at, expires_at, active
            FROM oauth_signing_keys
            WHERE active = TRUE
            ORDER BY kid ASC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(from_tuple).collect())
    }

    /// List every key by kid ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_all(&self) -> StorageResult<Vec<SigningKeyRecord>> {
        let rows: Vec<KeyTuple> = query_as(
            r#"
            SELECT kid, public_key_pem, private_key_pem, algorithm, created_at, expires_at, active
            FROM oauth_signing_keys
            ORDER BY kid ASC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(from_tuple).collect())
    }

    /// Set the active flag. Returns `true` if it changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn set_active(&self, kid: &str, active: bool) -> StorageResult<bool> {
        let result = query(
            r#"
            UPDATE oauth_signing_keys
            SET active = $2
            WHERE kid = $1 AND active <> $2
            "#,
        )
        .bind(kid)
        .bind(active)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete inactive keys that expired at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_expired(&self, now: OffsetDateTime) -> StorageResult<u64> {
        let result = query(
            "DELETE FROM oauth_signing_keys WHERE active = FALSE AND expires_at <= $1",
        )
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
