//! Session activity audit trail.
//!
//! Records who did what through the authorization server: codes issued and
//! redeemed, tokens issued, refreshed and revoked. Each event is emitted as a
//! `tracing` event and, when an [`AuditStorage`] is configured, persisted.
//!
//! Audit failures never fail the operation being audited.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::storage::AuditStorage;

/// Kind of activity being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    CodeIssued,
    CodeRedeemed,
    TokensIssued,
    TokensRefreshed,
    TokenRevoked,
    UserTokensRevoked,
}

impl ActivityType {
    /// Returns the storage form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeIssued => "code_issued",
            Self::CodeRedeemed => "code_redeemed",
            Self::TokensIssued => "tokens_issued",
            Self::TokensRefreshed => "tokens_refreshed",
            Self::TokenRevoked => "token_revoked",
            Self::UserTokensRevoked => "user_tokens_revoked",
        }
    }

    /// Parses the storage form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "code_issued" => Some(Self::CodeIssued),
            "code_redeemed" => Some(Self::CodeRedeemed),
            "tokens_issued" => Some(Self::TokensIssued),
            "tokens_refreshed" => Some(Self::TokensRefreshed),
            "token_revoked" => Some(Self::TokenRevoked),
            "user_tokens_revoked" => Some(Self::UserTokensRevoked),
            _ => None,
        }
    }
}

/// Caller-side details attached to an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Client IP address as seen by the HTTP layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// `User-Agent` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// One recorded activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub activity: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
}

impl ActivityEvent {
    /// Creates an event for `user_id` at `now` with the caller's context.
    #[must_use]
    pub fn new(
        activity: ActivityType,
        user_id: impl Into<String>,
        client_id: Option<&str>,
        context: &RequestContext,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            client_id: client_id.map(str::to_string),
            activity,
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
            occurred_at: now,
        }
    }
}

/// Writes activity events to the log and, optionally, to storage.
#[derive(Clone, Default)]
pub struct AuditLog {
    storage: Option<Arc<dyn AuditStorage>>,
}

impl AuditLog {
    /// Creates an audit log that only emits tracing events.
    #[must_use]
    pub fn tracing_only() -> Self {
        Self { storage: None }
    }

    /// Creates an audit log that also persists events.
    #[must_use]
    pub fn with_storage(storage: Arc<dyn AuditStorage>) -> Self {
        Self {
            storage: Some(storage),
        }
    }

    /// Records an event. Storage failures are logged and swallowed.
    pub async fn record(&self, event: ActivityEvent) {
        tracing::info!(
            target: "autoauth::audit",
            activity = event.activity.as_str(),
            user_id = %event.user_id,
            client_id = event.client_id.as_deref().unwrap_or("-"),
            ip = event.ip_address.as_deref().unwrap_or("-"),
            "session activity"
        );

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.record(&event).await {
                tracing::warn!(
                    error = %e,
                    activity = event.activity.as_str(),
                    "Failed to persist audit event"
                );
            }
        }
    }

    /// Lists recent events of a user. Empty when no storage is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn recent_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> crate::AuthResult<Vec<ActivityEvent>> {
        match &self.storage {
            Some(storage) => storage.list_for_user(user_id, limit).await,
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_activity_type_parse() {
        for activity in [
            ActivityType::CodeIssued,
            ActivityType::CodeRedeemed,
            ActivityType::TokensIssued,
            ActivityType::TokensRefreshed,
            ActivityType::TokenRevoked,
            ActivityType::UserTokensRevoked,
        ] {
            assert_eq!(ActivityType::parse(activity.as_str()), Some(activity));
        }
        assert_eq!(ActivityType::parse("login"), None);
    }

    #[tokio::test]
    async fn test_record_persists_event() {
        let storage = Arc::new(MemoryStorage::new());
        let log = AuditLog::with_storage(storage.clone());
        let context = RequestContext {
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: Some("curl/8".to_string()),
        };

        log.record(ActivityEvent::new(
            ActivityType::CodeIssued,
            "42",
            Some("c1"),
            &context,
            OffsetDateTime::now_utc(),
        ))
        .await;

        let events = log.recent_for_user("42", 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].activity, ActivityType::CodeIssued);
        assert_eq!(events[0].ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_tracing_only_has_no_history() {
        let log = AuditLog::tracing_only();
        log.record(ActivityEvent::new(
            ActivityType::TokenRevoked,
            "42",
            None,
            &RequestContext::default(),
            OffsetDateTime::now_utc(),
        ))
        .await;
        assert!(log.recent_for_user("42", 10).await.unwrap().is_empty());
    }
}
