//! Issued token metadata and revocation entries.
//!
//! # Security
//!
//! - Tokens are stored as SHA-256 hashes, never plaintext
//! - Revocation is recorded twice: on the token record (authoritative) and in
//!   a bounded-lifetime revocation index keyed by hash (fast path)

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::ScopeSet;

/// Kind of JWT issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Bearer token presented to resource servers.
    Access,
    /// Single-use token exchanged for a new pair.
    Refresh,
}

impl TokenType {
    /// Returns the string form used in claims and storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }

    /// Parses the storage form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "access" => Some(Self::Access),
            "refresh" => Some(Self::Refresh),
            _ => None,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata recorded for every issued token.
///
/// Immutable after creation except for the revocation fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Unique identifier; also carried in the token as `jti` / `token_id`.
    pub id: Uuid,

    /// Subject the token was issued for.
    pub user_id: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// Access or refresh.
    pub token_type: TokenType,

    /// SHA-256 hex digest of the signed token string.
    pub token_hash: String,

    /// Granted scopes.
    pub scope: ScopeSet,

    /// When the token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When the token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Whether the token has been revoked.
    #[serde(default)]
    pub revoked: bool,

    /// When the token was revoked.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub revoked_at: Option<OffsetDateTime>,

    /// Refresh token this one was rotated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_token_id: Option<Uuid>,
}

impl TokenRecord {
    /// Returns `true` if this token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if this token is neither revoked nor expired at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }
}

/// Hash a token value using SHA-256.
///
/// Used both when recording issued tokens and when looking them up for
/// revocation checks.
#[must_use]
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Why a token was revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    /// The user or client asked for it.
    UserRequested,
    /// The refresh token was exchanged for a new pair.
    Rotated,
    /// An operator revoked every token of a user.
    Admin,
}

impl RevocationReason {
    /// Returns the string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRequested => "user_requested",
            Self::Rotated => "rotated",
            Self::Admin => "admin",
        }
    }

    /// Parses the storage form, falling back to `UserRequested`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "rotated" => Self::Rotated,
            "admin" => Self::Admin,
            _ => Self::UserRequested,
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An entry in the revocation index.
///
/// Entries only need to outlive the token they cover; past `expires_at`
/// the token would be rejected as expired anyway and the entry can go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    /// SHA-256 hex digest of the revoked token.
    pub token_hash: String,

    /// Why the token was revoked.
    pub reason: RevocationReason,

    /// Owner of the token, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Client of the token, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// When the revocation happened.
    #[serde(with = "time::serde::rfc3339")]
    pub revoked_at: OffsetDateTime,

    /// When the entry may be dropped.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl RevocationEntry {
    /// Returns `true` if the entry still counts at `now`.
    #[must_use]
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_hash_token() {
        let hash = hash_token("test-token-value");

        // SHA-256 produces 64 hex characters
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token("test-token-value"));
        assert_ne!(hash, hash_token("test-token-valuf"));
    }

    #[test]
    fn test_hash_known_vector() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_token_type_parse() {
        assert_eq!(TokenType::parse("access"), Some(TokenType::Access));
        assert_eq!(TokenType::parse("refresh"), Some(TokenType::Refresh));
        assert_eq!(TokenType::parse("id"), None);
        assert_eq!(TokenType::Refresh.to_string(), "refresh");
    }

    #[test]
    fn test_record_activity() {
        let now = OffsetDateTime::now_utc();
        let mut record = TokenRecord {
            id: Uuid::new_v4(),
            user_id: "42".to_string(),
            client_id: "c1".to_string(),
            token_type: TokenType::Access,
            token_hash: hash_token("t"),
            scope: ScopeSet::parse("profile"),
            issued_at: now,
            expires_at: now + Duration::hours(1),
            revoked: false,
            revoked_at: None,
            parent_token_id: None,
        };
        assert!(record.is_active_at(now));
        assert!(!record.is_active_at(now + Duration::hours(1)));

        record.revoked = true;
        assert!(!record.is_active_at(now));
    }

    #[test]
    fn test_revocation_reason_parse() {
        assert_eq!(RevocationReason::parse("rotated"), RevocationReason::Rotated);
        assert_eq!(RevocationReason::parse("admin"), RevocationReason::Admin);
        assert_eq!(
            RevocationReason::parse("anything"),
            RevocationReason::UserRequested
        );
    }

    #[test]
    fn test_revocation_entry_liveness() {
        let now = OffsetDateTime::now_utc();
        let entry = RevocationEntry {
            token_hash: hash_token("t"),
            reason: RevocationReason::UserRequested,
            user_id: None,
            client_id: None,
            revoked_at: now,
            expires_at: now + Duration::seconds(10),
        };
        assert!(entry.is_live_at(now));
        assert!(!entry.is_live_at(now + Duration::seconds(10)));
    }
}
