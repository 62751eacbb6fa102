//! OAuth client storage.
//!
//! Registrations are stored as JSONB documents keyed by `client_id`.

use autoauth::OAuthClient;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;

use crate::{PgPool, StorageResult};

/// Client storage operations.
pub struct ClientStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ClientStorage<'a> {
    /// Create a new client storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a client by its OAuth client_id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored document does not
    /// deserialize.
    pub async fn find_by_client_id(&self, client_id: &str) -> StorageResult<Option<OAuthClient>> {
        let row: Option<(serde_json::Value,)> = query_as(
            r#"
            SELECT resource
            FROM oauth_clients
            WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some((resource,)) => Ok(Some(serde_json::from_value(resource)?)),
            None => Ok(None),
        }
    }

    /// Insert or replace a client registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn upsert(&self, client: &OAuthClient) -> StorageResult<()> {
        let resource = serde_json::to_value(client)?;

        query(
            r#"
            INSERT INTO oauth_clients (client_id, resource, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (client_id)
            DO UPDATE SET resource = EXCLUDED.resource, updated_at = NOW()
            "#,
        )
        .bind(&client.client_id)
        .bind(&resource)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
