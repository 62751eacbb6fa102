//! Signing key storage trait.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::SigningKeyRecord;

/// Storage trait for RSA signing keys.
///
/// The store is the only place the "active key" lives; there is no process
/// global. Concurrent creators race through [`insert_if_absent`] and then
/// converge on the lowest active kid.
///
/// [`insert_if_absent`]: KeyStorage::insert_if_absent
#[async_trait]
pub trait KeyStorage: Send + Sync {
    /// Inserts a key unless one with the same kid already exists.
    ///
    /// # Returns
    ///
    /// Returns `true` if this call inserted the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    ///
    /// # Atomicity
    ///
    /// ```sql
    /// INSERT INTO oauth_signing_keys (...) VALUES (...)
    /// ON CONFLICT (kid) DO NOTHING
    /// ```
    async fn insert_if_absent(&self, record: &SigningKeyRecord) -> AuthResult<bool>;

    /// Finds a key by kid, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find(&self, kid: &str) -> AuthResult<Option<SigningKeyRecord>>;

    /// Lists active keys ordered by kid ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list_active(&self) -> AuthResult<Vec<SigningKeyRecord>>;

    /// Lists every stored key ordered by kid ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list_all(&self) -> AuthResult<Vec<SigningKeyRecord>>;

    /// Sets the active flag of a key.
    ///
    /// # Returns
    ///
    /// Returns `true` if the flag changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn set_active(&self, kid: &str, active: bool) -> AuthResult<bool>;

    /// Deletes inactive keys whose own expiry passed before `now`.
    ///
    /// # Returns
    ///
    /// Returns the number of keys deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
