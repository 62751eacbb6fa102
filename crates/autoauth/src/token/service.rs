//! Token issuance, validation, rotation and revocation.
//!
//! Access and refresh tokens are RS256 JWTs signed with the active key of the
//! [`KeyManager`]. Every issued token is recorded in the [`TokenStorage`] by
//! the SHA-256 hash of its string; the raw token is never persisted.
//!
//! # Usage
//!
//! ```ignore
//! use autoauth::token::{TokenManager, UserIdentity};
//!
//! let manager = TokenManager::new(keys, tokens, revocations, clock, issuer, config);
//! let pair = manager.issue_token_pair(&identity, "c1", &scope, None).await?;
//!
//! let claims = manager.validate(&pair.access_token).await?;
//! let rotated = manager.refresh(&pair.refresh_token, "c1").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::jwt::{TokenClaims, UserIdentity, unverified_kid};
use super::keys::KeyManager;
use crate::clock::Clock;
use crate::config::TokenConfig;
use crate::storage::{RevocationIndex, TokenStorage};
use crate::types::{
    RevocationEntry, RevocationReason, ScopeSet, TokenRecord, TokenType, hash_token,
};
use crate::{AuthError, AuthResult};

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The signed JWT.
    pub token: String,
    /// Id of the stored token record.
    pub id: Uuid,
    /// When the token expires.
    pub expires_at: OffsetDateTime,
}

/// Access and refresh token returned by issuance and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `"Bearer"`.
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub scope: String,
}

/// Outcome of a refresh token rotation.
#[derive(Debug, Clone)]
pub struct Rotation {
    /// The new token pair.
    pub pair: TokenPair,
    /// Subject of the rotated token.
    pub user_id: String,
    /// Record id of the retired refresh token.
    pub replaced: Uuid,
}

/// Issues, validates, rotates and revokes JWTs.
pub struct TokenManager {
    keys: Arc<KeyManager>,
    tokens: Arc<dyn TokenStorage>,
    revocations: Arc<dyn RevocationIndex>,
    clock: Arc<dyn Clock>,
    issuer: String,
    config: TokenConfig,
}

impl TokenManager {
    /// Creates a new token manager.
    #[must_use]
    pub fn new(
        keys: Arc<KeyManager>,
        tokens: Arc<dyn TokenStorage>,
        revocations: Arc<dyn RevocationIndex>,
        clock: Arc<dyn Clock>,
        issuer: impl Into<String>,
        config: TokenConfig,
    ) -> Self {
        Self {
            keys,
            tokens,
            revocations,
            clock,
            issuer: issuer.into(),
            config,
        }
    }

    /// Returns the key manager tokens are signed through.
    #[must_use]
    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    /// Returns the configured token lifetimes.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issues an access token carrying the user's profile claims.
    ///
    /// `ttl` defaults to `tokens.access_token_ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if no signing key is available or the token cannot
    /// be recorded.
    pub async fn issue_access_token(
        &self,
        identity: &UserIdentity,
        client_id: &str,
        scope: &ScopeSet,
        ttl: Option<Duration>,
    ) -> AuthResult<IssuedToken> {
        let key = self.keys.get_active_key().await?;
        let now = self.clock.now();
        let id = Uuid::new_v4();
        let expires_at = now + ttl.unwrap_or(self.config.access_token_ttl);

        let claims =
            TokenClaims::access(&self.issuer, identity, client_id, scope, id, now, expires_at);
        let token = key.sign(&claims)?;

        self.record(
            id,
            &identity.user_id,
            client_id,
            TokenType::Access,
            &token,
            scope,
            now,
            expires_at,
            None,
        )
        .await?;

        tracing::debug!(
            token_id = %id,
            kid = %key.kid,
            client_id = %client_id,
            user_id = %identity.user_id,
            "Issued access token"
        );

        Ok(IssuedToken {
            token,
            id,
            expires_at,
        })
    }

    /// Issues a refresh token, optionally linked to the refresh token it replaces.
    ///
    /// `ttl` defaults to `tokens.refresh_token_ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if no signing key is available or the token cannot
    /// be recorded.
    pub async fn issue_refresh_token(
        &self,
        user_id: &str,
        client_id: &str,
        scope: &ScopeSet,
        parent_token_id: Option<Uuid>,
        ttl: Option<Duration>,
    ) -> AuthResult<IssuedToken> {
        let key = self.keys.get_active_key().await?;
        let now = self.clock.now();
        let id = Uuid::new_v4();
        let expires_at = now + ttl.unwrap_or(self.config.refresh_token_ttl);

        let claims = TokenClaims::refresh(&self.issuer, user_id, client_id, scope, id, now, expires_at);
        let token = key.sign(&claims)?;

        self.record(
            id,
            user_id,
            client_id,
            TokenType::Refresh,
            &token,
            scope,
            now,
            expires_at,
            parent_token_id,
        )
        .await?;

        tracing::debug!(
            token_id = %id,
            kid = %key.kid,
            client_id = %client_id,
            parent = ?parent_token_id,
            "Issued refresh token"
        );

        Ok(IssuedToken {
            token,
            id,
            expires_at,
        })
    }

    /// Issues an access token and a refresh token for the same grant.
    ///
    /// # Errors
    ///
    /// Returns an error if either token cannot be issued.
    pub async fn issue_token_pair(
        &self,
        identity: &UserIdentity,
        client_id: &str,
        scope: &ScopeSet,
        parent_token_id: Option<Uuid>,
    ) -> AuthResult<TokenPair> {
        let access = self
            .issue_access_token(identity, client_id, scope, None)
            .await?;
        let refresh = self
            .issue_refresh_token(&identity.user_id, client_id, scope, parent_token_id, None)
            .await?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_ttl.as_secs(),
            scope: scope.as_string(),
        })
    }

    /// Verifies a token and returns its claims.
    ///
    /// Checks run in order: signing key lookup by header `kid`, signature and
    /// issuer, revocation index, expiry. A revoked token is reported as
    /// revoked even if it has also expired.
    ///
    /// # Errors
    ///
    /// - `NotFound` - the `kid` is unknown or its key expired
    /// - `SignatureInvalid` - malformed token, bad signature or wrong issuer
    /// - `Revoked` - the token hash is in the revocation index
    /// - `Expired` - `exp` is not in the future
    pub async fn validate(&self, token: &str) -> AuthResult<TokenClaims> {
        let kid = unverified_kid(token).map_err(|e| AuthError::signature_invalid(e.to_string()))?;
        let key = self.keys.verification_key(&kid).await?;
        let claims = key.decode::<TokenClaims>(token, &self.issuer)?.claims;

        let now = self.clock.now();
        let token_hash = hash_token(token);
        if self.revocations.is_revoked(&token_hash, now).await? {
            tracing::debug!(hash = %&token_hash[..8], "Rejected revoked token");
            return Err(AuthError::Revoked);
        }

        if claims.is_expired_at(now) {
            return Err(AuthError::expired("token has expired"));
        }

        Ok(claims)
    }

    /// Exchanges a refresh token for a new pair and retires the old one.
    ///
    /// The presented token is revoked with a compare-and-set before anything
    /// is issued, so of two concurrent refreshes with the same token exactly
    /// one succeeds. Refreshed access tokens carry no profile claims.
    ///
    /// # Errors
    ///
    /// - Any error of [`validate`](Self::validate)
    /// - `InvalidRequest` - the token is not a refresh token
    /// - `ClientMismatch` - the token was issued to another client
    /// - `NotFound` - the token has no record
    /// - `Revoked` - the token was already rotated or revoked
    pub async fn refresh(&self, refresh_token: &str, client_id: &str) -> AuthResult<TokenPair> {
        self.rotate_refresh_token(refresh_token, client_id)
            .await
            .map(|rotation| rotation.pair)
    }

    /// Same as [`refresh`](Self::refresh), also reporting whose token was
    /// rotated and which record it replaced.
    ///
    /// # Errors
    ///
    /// See [`refresh`](Self::refresh).
    pub async fn rotate_refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> AuthResult<Rotation> {
        let claims = self.validate(refresh_token).await?;

        if claims.kind() != TokenType::Refresh {
            return Err(AuthError::invalid_request("token is not a refresh token"));
        }
        if claims.aud != client_id {
            tracing::warn!(
                expected = %claims.aud,
                actual = %client_id,
                "Refresh token presented by another client"
            );
            return Err(AuthError::client_mismatch(
                "refresh token was issued to a different client",
            ));
        }

        let now = self.clock.now();
        let token_hash = hash_token(refresh_token);
        let record = self
            .tokens
            .find_by_hash(&token_hash)
            .await?
            .ok_or_else(|| AuthError::not_found("refresh token is not on record"))?;

        if !self.tokens.revoke(&token_hash, now).await? {
            tracing::warn!(
                token_id = %record.id,
                client_id = %client_id,
                "Refresh token replay rejected"
            );
            return Err(AuthError::Revoked);
        }
        self.index_revocation(
            &token_hash,
            RevokedToken::from(&record),
            RevocationReason::Rotated,
            now,
        )
        .await?;

        let identity = UserIdentity::new(claims.sub.clone());
        let pair = self
            .issue_token_pair(&identity, client_id, &claims.scopes(), Some(record.id))
            .await?;

        tracing::info!(
            parent = %record.id,
            client_id = %client_id,
            user_id = %claims.sub,
            "Refresh token rotated"
        );
        Ok(Rotation {
            pair,
            user_id: claims.sub,
            replaced: record.id,
        })
    }

    /// Revokes a token. Returns `true` if a token record was known.
    ///
    /// A token without a record here (for instance one issued by another
    /// instance whose record is not visible yet) is still indexed when it
    /// verifies against one of our signing keys. Anything else is ignored and
    /// reported as a successful no-op.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if a store cannot be reached.
    pub async fn revoke(&self, token: &str) -> AuthResult<bool> {
        let record = self
            .revoke_with_reason(token, RevocationReason::UserRequested)
            .await?;
        Ok(record.is_some())
    }

    /// Revokes a token, recording why. Returns the token record when one exists.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if a store cannot be reached.
    pub async fn revoke_with_reason(
        &self,
        token: &str,
        reason: RevocationReason,
    ) -> AuthResult<Option<TokenRecord>> {
        let now = self.clock.now();
        let token_hash = hash_token(token);
        let Some(record) = self.tokens.find_by_hash(&token_hash).await? else {
            match self.signed_claims(token).await? {
                Some(claims) => {
                    self.index_revocation(&token_hash, RevokedToken::from(&claims), reason, now)
                        .await?;
                    tracing::info!(
                        hash = %&token_hash[..8],
                        reason = %reason,
                        "Revoked token without a record"
                    );
                }
                None => {
                    tracing::debug!(
                        hash = %&token_hash[..8],
                        "Ignored revocation of a token not signed here"
                    );
                }
            }
            return Ok(None);
        };

        self.index_revocation(&token_hash, RevokedToken::from(&record), reason, now)
            .await?;
        if self.tokens.revoke(&token_hash, now).await? {
            tracing::info!(
                token_id = %record.id,
                token_type = %record.token_type,
                reason = %reason,
                "Token revoked"
            );
        }
        Ok(Some(record))
    }

    /// Revokes every active token of a user and returns how many were revoked.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if a store cannot be reached.
    pub async fn revoke_all_for_user(
        &self,
        user_id: &str,
        reason: RevocationReason,
    ) -> AuthResult<u64> {
        let now = self.clock.now();
        let mut revoked = 0;

        for record in self.tokens.list_by_user(user_id).await? {
            if !record.is_active_at(now) {
                continue;
            }
            if self.tokens.revoke(&record.token_hash, now).await? {
                self.index_revocation(&record.token_hash, RevokedToken::from(&record), reason, now)
                    .await?;
                revoked += 1;
            }
        }

        tracing::info!(user_id = %user_id, revoked, reason = %reason, "Revoked user tokens");
        Ok(revoked)
    }

    /// Lists the token records of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the token store cannot be reached.
    pub async fn list_user_tokens(&self, user_id: &str) -> AuthResult<Vec<TokenRecord>> {
        self.tokens.list_by_user(user_id).await
    }

    /// Deletes expired token records.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the token store cannot be reached.
    pub async fn cleanup_expired_tokens(&self) -> AuthResult<u64> {
        self.tokens.delete_expired(self.clock.now()).await
    }

    /// Drops revocation entries past their own expiry.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the revocation index cannot be reached.
    pub async fn purge_revocations(&self) -> AuthResult<u64> {
        self.revocations.purge_expired(self.clock.now()).await
    }

    /// Claims of a token signed by one of our keys, ignoring expiry and the
    /// revocation index. `None` when the string is not such a token.
    async fn signed_claims(&self, token: &str) -> AuthResult<Option<TokenClaims>> {
        let Ok(kid) = unverified_kid(token) else {
            return Ok(None);
        };
        let key = match self.keys.verification_key(&kid).await {
            Ok(key) => key,
            Err(e) if e.is_server_error() => return Err(e),
            Err(_) => return Ok(None),
        };
        Ok(key
            .decode::<TokenClaims>(token, &self.issuer)
            .ok()
            .map(|data| data.claims))
    }

    /// Inserts a revocation entry that lives as long as the token could, capped
    /// at the configured ceiling.
    async fn index_revocation(
        &self,
        token_hash: &str,
        token: RevokedToken<'_>,
        reason: RevocationReason,
        now: OffsetDateTime,
    ) -> AuthResult<()> {
        let ceiling = now + self.config.revocation_ceiling;
        let entry = RevocationEntry {
            token_hash: token_hash.to_string(),
            reason,
            user_id: Some(token.user_id.to_string()),
            client_id: Some(token.client_id.to_string()),
            revoked_at: now,
            expires_at: token.expires_at.min(ceiling).max(now),
        };
        self.revocations.insert(&entry).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        id: Uuid,
        user_id: &str,
        client_id: &str,
        token_type: TokenType,
        token: &str,
        scope: &ScopeSet,
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
        parent_token_id: Option<Uuid>,
    ) -> AuthResult<()> {
        let record = TokenRecord {
            id,
            user_id: user_id.to_string(),
            client_id: client_id.to_string(),
            token_type,
            token_hash: hash_token(token),
            scope: scope.clone(),
            issued_at,
            expires_at,
            revoked: false,
            revoked_at: None,
            parent_token_id,
        };
        self.tokens.create(&record).await
    }
}

/// Owner and lifetime of a token being revoked, from its record or claims.
struct RevokedToken<'a> {
    user_id: &'a str,
    client_id: &'a str,
    expires_at: OffsetDateTime,
}

impl<'a> From<&'a TokenRecord> for RevokedToken<'a> {
    fn from(record: &'a TokenRecord) -> Self {
        Self {
            user_id: &record.user_id,
            client_id: &record.client_id,
            expires_at: record.expires_at,
        }
    }
}

impl<'a> From<&'a TokenClaims> for RevokedToken<'a> {
    fn from(claims: &'a TokenClaims) -> Self {
        Self {
            user_id: &claims.sub,
            client_id: &claims.aud,
            expires_at: claims.expires_at(),
        }
    }
}
