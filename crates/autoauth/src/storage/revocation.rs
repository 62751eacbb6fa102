//! Revocation index trait.
//!
//! A fast "is this hash revoked" lookup kept separate from the token table.
//! Entries carry their own expiry so the index stays bounded: once the
//! covered token would have expired, the entry is irrelevant.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::RevocationEntry;

/// Storage trait for the revocation index.
#[async_trait]
pub trait RevocationIndex: Send + Sync {
    /// Records a revoked token hash.
    ///
    /// Idempotent: revoking an already-indexed hash succeeds and keeps the
    /// later of the two expiries.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn insert(&self, entry: &RevocationEntry) -> AuthResult<()>;

    /// Checks if a token hash is revoked.
    ///
    /// Entries whose `expires_at` is at or before `now` no longer count.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn is_revoked(&self, token_hash: &str, now: OffsetDateTime) -> AuthResult<bool>;

    /// Deletes entries that expired before `now`.
    ///
    /// # Returns
    ///
    /// Returns the number of entries deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn purge_expired(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
