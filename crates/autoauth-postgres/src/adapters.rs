//! `autoauth` storage trait implementations.
//!
//! [`PostgresAuthStorage`] owns an `Arc<PgPool>`, so it can be handed to
//! `AuthorizationServerBuilder::with_storage` and back every store at once.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use autoauth::storage::{
    AuditStorage as AuditStorageTrait, ClientStorage as ClientStorageTrait,
    CodeStorage as CodeStorageTrait, KeyStorage as KeyStorageTrait, RevocationIndex,
    TokenStorage as TokenStorageTrait,
};
use autoauth::{
    ActivityEvent, AuthResult, AuthorizationCode, OAuthClient, RevocationEntry, SigningKeyRecord,
    TokenRecord,
};

use crate::PostgresAuthStorage;

#[async_trait]
impl ClientStorageTrait for PostgresAuthStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<OAuthClient>> {
        Ok(self.clients().find_by_client_id(client_id).await?)
    }

    async fn upsert(&self, client: &OAuthClient) -> AuthResult<()> {
        Ok(self.clients().upsert(client).await?)
    }
}

#[async_trait]
impl CodeStorageTrait for PostgresAuthStorage {
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()> {
        Ok(self.codes().create(code).await?)
    }

    async fn find(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        Ok(self.codes().find(code).await?)
    }

    async fn mark_used(&self, code: &str, used_at: OffsetDateTime) -> AuthResult<bool> {
        Ok(self.codes().mark_used(code, used_at).await?)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        Ok(self.codes().delete_expired(now).await?)
    }
}

#[async_trait]
impl TokenStorageTrait for PostgresAuthStorage {
    async fn create(&self, record: &TokenRecord) -> AuthResult<()> {
        Ok(self.tokens().create(record).await?)
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<TokenRecord>> {
        Ok(self.tokens().find_by_hash(token_hash).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<TokenRecord>> {
        Ok(self.tokens().find_by_id(id).await?)
    }

    async fn revoke(&self, token_hash: &str, revoked_at: OffsetDateTime) -> AuthResult<bool> {
        Ok(self.tokens().revoke(token_hash, revoked_at).await?)
    }

    async fn list_by_user(&self, user_id: &str) -> AuthResult<Vec<TokenRecord>> {
        Ok(self.tokens().list_by_user(user_id).await?)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        Ok(self.tokens().delete_expired(now).await?)
    }
}

#[async_trait]
impl RevocationIndex for PostgresAuthStorage {
    async fn insert(&self, entry: &RevocationEntry) -> AuthResult<()> {
        Ok(self.revocations().insert(entry).await?)
    }

    async fn is_revoked(&self, token_hash: &str, now: OffsetDateTime) -> AuthResult<bool> {
        Ok(self.revocations().is_revoked(token_hash, now).await?)
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        Ok(self.revocations().purge_expired(now).await?)
    }
}

#[async_trait]
impl KeyStorageTrait for PostgresAuthStorage {
    async fn insert_if_absent(&self, record: &SigningKeyRecord) -> AuthResult<bool> {
        Ok(self.keys().insert_if_absent(record).await?)
    }

    async fn find(&self, kid: &str) -> AuthResult<Option<SigningKeyRecord>> {
        Ok(self.keys().find(kid).await?)
    }

    async fn list_active(&self) -> AuthResult<Vec<SigningKeyRecord>> {
        Ok(self.keys().list_active().await?)
    }

    async fn list_all(&self) -> AuthResult<Vec<SigningKeyRecord>> {
        Ok(self.keys().list_all().await?)
    }

    async fn set_active(&self, kid: &str, active: bool) -> AuthResult<bool> {
        Ok(self.keys().set_active(kid, active).await?)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        Ok(self.keys().delete_expired(now).await?)
    }
}

#[async_trait]
impl AuditStorageTrait for PostgresAuthStorage {
    async fn record(&self, event: &ActivityEvent) -> AuthResult<()> {
        Ok(self.activity().record(event).await?)
    }

    async fn list_for_user(&self, user_id: &str, limit: usize) -> AuthResult<Vec<ActivityEvent>> {
        Ok(self.activity().list_for_user(user_id, limit).await?)
    }
}
