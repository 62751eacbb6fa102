//! Authorization code storage trait.
//!
//! # Security Considerations
//!
//! - A code must be redeemable at most once, across all server instances
//! - `mark_used` is the only mutation after creation
//! - Expired codes should be cleaned up periodically

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::AuthorizationCode;

/// Storage trait for authorization codes.
#[async_trait]
pub trait CodeStorage: Send + Sync {
    /// Persists a freshly issued code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` if a code with the same value
    /// already exists, or a storage error.
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()>;

    /// Finds a code by value.
    ///
    /// Expired codes may still be returned; callers check expiry themselves
    /// so they can report `Expired` rather than `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find(&self, code: &str) -> AuthResult<Option<AuthorizationCode>>;

    /// Atomically flips `used` from `false` to `true`.
    ///
    /// # Returns
    ///
    /// Returns `true` for exactly one caller per code: the one whose update
    /// changed the flag. Every other caller, concurrent or later, gets
    /// `false`. Also `false` if the code does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    ///
    /// # Atomicity
    ///
    /// Must be a compare-and-set at the store, for example:
    ///
    /// ```sql
    /// UPDATE oauth_authorization_codes
    /// SET used = TRUE, used_at = $2
    /// WHERE code = $1 AND used = FALSE
    /// RETURNING code
    /// ```
    async fn mark_used(&self, code: &str, used_at: OffsetDateTime) -> AuthResult<bool>;

    /// Deletes codes that expired before `now`.
    ///
    /// # Returns
    ///
    /// Returns the number of codes deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
