//! Issued token storage trait.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::TokenRecord;

/// Storage trait for issued token metadata.
///
/// Records are looked up by the SHA-256 hash of the token string; the raw
/// token is never stored.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Stores a new token record.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn create(&self, record: &TokenRecord) -> AuthResult<()>;

    /// Finds a token record by its hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<TokenRecord>>;

    /// Finds a token record by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<TokenRecord>>;

    /// Atomically flips `revoked` from `false` to `true`.
    ///
    /// # Returns
    ///
    /// Returns `true` only for the caller that changed the flag; `false` if
    /// the record was already revoked or does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    ///
    /// # Atomicity
    ///
    /// ```sql
    /// UPDATE oauth_tokens SET revoked = TRUE, revoked_at = $2
    /// WHERE token_hash = $1 AND revoked = FALSE
    /// ```
    async fn revoke(&self, token_hash: &str, revoked_at: OffsetDateTime) -> AuthResult<bool>;

    /// Lists every token record issued to a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list_by_user(&self, user_id: &str) -> AuthResult<Vec<TokenRecord>>;

    /// Deletes records that expired before `now`.
    ///
    /// # Returns
    ///
    /// Returns the number of records deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
