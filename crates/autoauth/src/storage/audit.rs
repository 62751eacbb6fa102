//! Session activity audit storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::audit::ActivityEvent;

/// Storage trait for session activity events.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Appends an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn record(&self, event: &ActivityEvent) -> AuthResult<()>;

    /// Lists the most recent events of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list_for_user(&self, user_id: &str, limit: usize) -> AuthResult<Vec<ActivityEvent>>;
}
