//! Session activity storage.

use autoauth::{ActivityEvent, ActivityType};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{PgPool, StorageError, StorageResult};

type ActivityTuple = (
    Uuid,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    OffsetDateTime,
);

fn from_tuple(row: ActivityTuple) -> StorageResult<ActivityEvent> {
    let activity = ActivityType::parse(&row.3)
        .ok_or_else(|| StorageError::corrupt_row(format!("activity '{}'", row.3)))?;

    Ok(ActivityEvent {
        id: row.0,
        user_id: row.1,
        client_id: row.2,
        activity,
        ip_address: row.4,
        user_agent: row.5,
        occurred_at: row.6,
    })
}

/// Session activity storage operations.
pub struct ActivityStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ActivityStorage<'a> {
    /// Create a new activity storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn record(&self, event: &ActivityEvent) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO oauth_session_activity
                (id, user_id, client_id, activity, ip_address, user_agent, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.id)
        .bind(&event.user_id)
        .bind(event.client_id.as_deref())
        .bind(event.activity.as_str())
        .bind(event.ip_address.as_deref())
        .bind(event.user_agent.as_deref())
        .bind(event.occurred_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// List the most recent events of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<ActivityEvent>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<ActivityTuple> = query_as(
            r#"
            SELECT id, user_id, client_id, activity, ip_address, user_agent, occurred_at
            FROM oauth_session_activity
            WHERE user_id = $1
            ORDER BY occurred_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(from_tuple).collect()
    }
}
