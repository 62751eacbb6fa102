//! OAuth client storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::OAuthClient;

/// Storage trait for OAuth client registrations.
///
/// The core only reads clients. `upsert` exists so a deployment can seed
/// static registrations from configuration.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Finds a client by its client ID.
    ///
    /// # Returns
    ///
    /// Returns `None` if the client does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<OAuthClient>>;

    /// Creates or replaces a client registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn upsert(&self, client: &OAuthClient) -> AuthResult<()>;
}
