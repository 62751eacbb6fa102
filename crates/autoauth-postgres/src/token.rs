//! Issued token metadata storage.
//!
//! Tokens are stored by SHA-256 hash; the raw JWT never reaches the database.

use autoauth::{ScopeSet, TokenRecord, TokenType};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{PgPool, StorageError, StorageResult};

type TokenTuple = (
    Uuid,
    String,
    String,
    String,
    String,
    String,
    OffsetDateTime,
    OffsetDateTime,
    bool,
    Option<OffsetDateTime>,
    Option<Uuid>,
);

const SELECT_COLUMNS: &str = "id, user_id, client_id, token_type, token_hash, scope, \
     issued_at, expires_at, revoked, revoked_at, parent_token_id";

fn from_tuple(row: TokenTuple) -> StorageResult<TokenRecord> {
    let token_type = TokenType::parse(&row.3)
        .ok_or_else(|| StorageError::corrupt_row(format!("token_type '{}'", row.3)))?;

    Ok(TokenRecord {
        id: row.0,
        user_id: row.1,
        client_id: row.2,
        token_type,
        token_hash: row.4,
        scope: ScopeSet::parse(&row.5),
        issued_at: row.6,
        expires_at: row.7,
        revoked: row.8,
        revoked_at: row.9,
        parent_token_id: row.10,
    })
}

/// Token metadata storage operations.
pub struct TokenStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenStorage<'a> {
    /// Create a new token storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a token record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(&self, record: &TokenRecord) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO oauth_tokens
                (id, user_id, client_id, token_type, token_hash, scope,
                 issued_at, expires_at, revoked, revoked_at, parent_token_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id)
        .bind(&record.user_id)
        .bind(&record.client_id)
        .bind(record.token_type.as_str())
        .bind(&record.token_hash)
        .bind(record.scope.as_string())
        .bind(record.issued_at)
        .bind(record.expires_at)
        .bind(record.revoked)
        .bind(record.revoked_at)
        .bind(record.parent_token_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Find a record by token hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_hash(&self, token_hash: &str) -> StorageResult<Option<TokenRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM oauth_tokens WHERE token_hash = $1");
        let row: Option<TokenTuple> = query_as(&sql)
            .bind(token_hash)
            .fetch_optional(self.pool)
            .await?;

        row.map(from_tuple).transpose()
    }

    /// Find a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<TokenRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM oauth_tokens WHERE id = $1");
        let row: Option<TokenTuple> = query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(from_tuple).transpose()
    }

    /// Flip `revoked` from false to true.
    ///
    /// Returns `true` only when this statement changed the row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn revoke(&self, token_hash: &str, revoked_at: OffsetDateTime) -> StorageResult<bool> {
        let row: Option<(Uuid,)> = query_as(
            r#"
            UPDATE oauth_tokens
            SET revoked = TRUE, revoked_at = $2
            WHERE token_hash = $1 AND revoked = FALSE
            RETURNING id
            "#,
        )
        .bind(token_hash)
        .bind(revoked_at)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// List every record of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_user(&self, user_id: &str) -> StorageResult<Vec<TokenRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM oauth_tokens WHERE user_id = $1 ORDER BY issued_at DESC"
        );
        let rows: Vec<TokenTuple> = query_as(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(from_tuple).collect()
    }

    /// Delete records that expired at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_expired(&self, now: OffsetDateTime) -> StorageResult<u64> {
        let result = query("DELETE FROM oauth_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
