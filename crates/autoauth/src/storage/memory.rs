//! In-memory storage backend.
//!
//! Implements every storage trait over `dashmap` maps. Compare-and-set
//! operations run under the shard lock of `get_mut`/`entry`, so concurrent
//! callers in one process observe the same single-winner semantics a
//! database would give across processes.
//!
//! Suitable for tests and single-instance deployments; nothing survives a
//! restart.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{AuditStorage, ClientStorage, CodeStorage, KeyStorage, RevocationIndex, TokenStorage};
use crate::audit::ActivityEvent;
use crate::types::{AuthorizationCode, OAuthClient, RevocationEntry, SigningKeyRecord, TokenRecord};
use crate::{AuthError, AuthResult};

/// `dashmap`-backed implementation of all storage traits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    clients: DashMap<String, OAuthClient>,
    codes: DashMap<String, AuthorizationCode>,
    tokens: DashMap<Uuid, TokenRecord>,
    /// token hash -> token id
    token_hashes: DashMap<String, Uuid>,
    revocations: DashMap<String, RevocationEntry>,
    keys: DashMap<String, SigningKeyRecord>,
    activity: DashMap<String, Vec<ActivityEvent>>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: while unavailable every call fails with
    /// `StoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check_available(&self) -> AuthResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(AuthError::store_unavailable("memory store marked unavailable"))
        } else {
            Ok(())
        }
    }

    /// Number of live revocation entries, expired ones included.
    #[must_use]
    pub fn revocation_count(&self) -> usize {
        self.revocations.len()
    }
}

#[async_trait]
impl ClientStorage for MemoryStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<OAuthClient>> {
        self.check_available()?;
        Ok(self.clients.get(client_id).map(|c| c.clone()))
    }

    async fn upsert(&self, client: &OAuthClient) -> AuthResult<()> {
        self.check_available()?;
        self.clients.insert(client.client_id.clone(), client.clone());
        Ok(())
    }
}

#[async_trait]
impl CodeStorage for MemoryStorage {
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()> {
        self.check_available()?;
        match self.codes.entry(code.code.clone()) {
            Entry::Occupied(_) => Err(AuthError::invalid_request("authorization code collision")),
            Entry::Vacant(slot) => {
                slot.insert(code.clone());
                Ok(())
            }
        }
    }

    async fn find(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        self.check_available()?;
        Ok(self.codes.get(code).map(|c| c.clone()))
    }

    async fn mark_used(&self, code: &str, used_at: OffsetDateTime) -> AuthResult<bool> {
        self.check_available()?;
        let Some(mut record) = self.codes.get_mut(code) else {
            return Ok(false);
        };
        if record.used {
            return Ok(false);
        }
        record.used = true;
        record.used_at = Some(used_at);
        Ok(true)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        self.check_available()?;
        let before = self.codes.len();
        self.codes.retain(|_, code| !code.is_expired_at(now));
        Ok(before.saturating_sub(self.codes.len()) as u64)
    }
}

#[async_trait]
impl TokenStorage for MemoryStorage {
    async fn create(&self, record: &TokenRecord) -> AuthResult<()> {
        self.check_available()?;
        self.token_hashes
            .insert(record.token_hash.clone(), record.id);
        self.tokens.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<TokenRecord>> {
        self.check_available()?;
        let Some(id) = self.token_hashes.get(token_hash).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.tokens.get(&id).map(|t| t.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<TokenRecord>> {
        self.check_available()?;
        Ok(self.tokens.get(&id).map(|t| t.clone()))
    }

    async fn revoke(&self, token_hash: &str, revoked_at: OffsetDateTime) -> AuthResult<bool> {
        self.check_available()?;
        let Some(id) = self.token_hashes.get(token_hash).map(|id| *id) else {
            return Ok(false);
        };
        let Some(mut record) = self.tokens.get_mut(&id) else {
            return Ok(false);
        };
        if record.revoked {
            return Ok(false);
        }
        record.revoked = true;
        record.revoked_at = Some(revoked_at);
        Ok(true)
    }

    async fn list_by_user(&self, user_id: &str) -> AuthResult<Vec<TokenRecord>> {
        self.check_available()?;
        let mut records: Vec<TokenRecord> = self
            .tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.clone())
            .collect();
        records.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(records)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        self.check_available()?;
        let expired: Vec<(Uuid, String)> = self
            .tokens
            .iter()
            .filter(|t| t.is_expired_at(now))
            .map(|t| (t.id, t.token_hash.clone()))
            .collect();
        for (id, hash) in &expired {
            self.tokens.remove(id);
            self.token_hashes.remove(hash);
        }
        Ok(expired.len() as u64)
    }
}

#[async_trait]
impl RevocationIndex for MemoryStorage {
    async fn insert(&self, entry: &RevocationEntry) -> AuthResult<()> {
        self.check_available()?;
        match self.revocations.entry(entry.token_hash.clone()) {
            Entry::Occupied(mut existing) => {
                if entry.expires_at > existing.get().expires_at {
                    existing.get_mut().expires_at = entry.expires_at;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
            }
        }
        Ok(())
    }

    async fn is_revoked(&self, token_hash: &str, now: OffsetDateTime) -> AuthResult<bool> {
        self.check_available()?;
        Ok(self
            .revocations
            .get(token_hash)
            .is_some_and(|entry| entry.is_live_at(now)))
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        self.check_available()?;
        let before = self.revocations.len();
        self.revocations.retain(|_, entry| entry.is_live_at(now));
        Ok(before.saturating_sub(self.revocations.len()) as u64)
    }
}

#[async_trait]
impl KeyStorage for MemoryStorage {
    async fn insert_if_absent(&self, record: &SigningKeyRecord) -> AuthResult<bool> {
        self.check_available()?;
        match self.keys.entry(record.kid.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(true)
            }
        }
    }

    async fn find(&self, kid: &str) -> AuthResult<Option<SigningKeyRecord>> {
        self.check_available()?;
        Ok(self.keys.get(kid).map(|k| k.clone()))
    }

    async fn list_active(&self) -> AuthResult<Vec<SigningKeyRecord>> {
        self.check_available()?;
        let mut keys: Vec<SigningKeyRecord> = self
            .keys
            .iter()
            .filter(|k| k.active)
            .map(|k| k.clone())
            .collect();
        keys.sort_by(|a, b| a.kid.cmp(&b.kid));
        Ok(keys)
    }

    async fn list_all(&self) -> AuthResult<Vec<SigningKeyRecord>> {
        self.check_available()?;
        let mut keys: Vec<SigningKeyRecord> = self.keys.iter().map(|k| k.clone()).collect();
        keys.sort_by(|a, b| a.kid.cmp(&b.kid));
        Ok(keys)
    }

    async fn set_active(&self, kid: &str, active: bool) -> AuthResult<bool> {
        self.check_available()?;
        let Some(mut record) = self.keys.get_mut(kid) else {
            return Ok(false);
        };
        if record.active == active {
            return Ok(false);
        }
        record.active = active;
        Ok(true)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        self.check_available()?;
        let before = self.keys.len();
        self.keys
            .retain(|_, key| key.active || !key.is_expired_at(now));
        Ok(before.saturating_sub(self.keys.len()) as u64)
    }
}

#[async_trait]
impl AuditStorage for MemoryStorage {
    async fn record(&self, event: &ActivityEvent) -> AuthResult<()> {
        self.check_available()?;
        self.activity
            .entry(event.user_id.clone())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str, limit: usize) -> AuthResult<Vec<ActivityEvent>> {
        self.check_available()?;
        let mut events = self
            .activity
            .get(user_id)
            .map(|events| events.clone())
            .unwrap_or_default();
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        events.truncate(limit);
        Ok(events)
    }
}
