//! Authorization code storage.
//!
//! Single use is enforced in the database: `mark_used` only reports success
//! for the statement that actually flipped the flag.

use autoauth::oauth::PkceChallengeMethod;
use autoauth::{AuthorizationCode, ScopeSet};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;

use crate::{PgPool, StorageError, StorageResult};

type CodeTuple = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    OffsetDateTime,
    OffsetDateTime,
    bool,
    Option<OffsetDateTime>,
);

fn from_tuple(row: CodeTuple) -> StorageResult<AuthorizationCode> {
    let code_challenge_method = row
        .6
        .as_deref()
        .map(PkceChallengeMethod::parse)
        .transpose()
        .map_err(|e| StorageError::corrupt_row(e.to_string()))?;

    Ok(AuthorizationCode {
        code: row.0,
        user_id: row.1,
        client_id: row.2,
        scope: ScopeSet::parse(&row.3),
        redirect_uri: row.4,
        code_challenge: row.5,
        code_challenge_method,
        issued_at: row.7,
        expires_at: row.8,
        used: row.9,
        used_at: row.10,
    })
}

/// Authorization code storage operations.
pub struct CodeStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> CodeStorage<'a> {
    /// Create a new code storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a freshly issued code.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the code value already exists.
    pub async fn create(&self, code: &AuthorizationCode) -> StorageResult<()> {
        let result = query(
            r#"
            INSERT INTO oauth_authorization_codes
                (code, user_id, client_id, scope, redirect_uri, code_challenge,
                 code_challenge_method, issued_at, expires_at, used, used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(&code.code)
        .bind(&code.user_id)
        .bind(&code.client_id)
        .bind(code.scope.as_string())
        .bind(&code.redirect_uri)
        .bind(code.code_challenge.as_deref())
        .bind(code.code_challenge_method.map(|m| m.as_str()))
        .bind(code.issued_at)
        .bind(code.expires_at)
        .bind(code.used)
        .bind(code.used_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::conflict("authorization code already exists"));
        }
        Ok(())
    }

    /// Find a code by value, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find(&self, code: &str) -> StorageResult<Option<AuthorizationCode>> {
        let row: Option<CodeTuple> = query_as(
            r#"
            SELECT code, user_id, client_id, scope, redirect_uri, code_challenge,
                   code_challenge_method, issued_at, expires_at, used, used_at
            FROM oauth_authorization_codes
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        row.map(from_tuple).transpose()
    }

    /// Flip `used` from false to true.
    ///
    /// Returns `true` only when this statement changed the row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn mark_used(&self, code: &str, used_at: OffsetDateTime) -> StorageResult<bool> {
        let row: Option<(String,)> = query_as(
            r#"
            UPDATE oauth_authorization_codes
            SET used = TRUE, used_at = $2
            WHERE code = $1 AND used = FALSE
            RETURNING code
            "#,
        )
        .bind(code)
        .bind(used_at)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Delete codes that expired before `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_expired(&self, now: OffsetDateTime) -> StorageResult<u64> {
        let result = query("DELETE FROM oauth_authorization_codes WHERE expires_at < $1")
            .bind(now)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn test_from_tuple() {
        let code = from_tuple((
            "abc".to_string(),
            "42".to_string(),
            "c1".to_string(),
            "profile email".to_string(),
            "https://app/cb".to_string(),
            Some("challenge".to_string()),
            Some("S256".to_string()),
            datetime!(2026-10-16 12:00 UTC),
            datetime!(2026-10-16 12:10 UTC),
            false,
            None,
        ))
        .unwrap();

        assert_eq!(code.scope.to_vec(), vec!["profile", "email"]);
        assert_eq!(code.code_challenge_method, Some(PkceChallengeMethod::S256));
    }

    #[test]
    fn test_unknown_method_is_corrupt() {
        let err = from_tuple((
            "abc".to_string(),
            "42".to_string(),
            "c1".to_string(),
            String::new(),
            "https://app/cb".to_string(),
            Some("challenge".to_string()),
            Some("S512".to_string()),
            datetime!(2026-10-16 12:00 UTC),
            datetime!(2026-10-16 12:10 UTC),
            false,
            None,
        ))
        .unwrap_err();

        assert!(matches!(err, StorageError::CorruptRow(_)));
    }
}
