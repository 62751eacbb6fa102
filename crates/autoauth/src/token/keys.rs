//! Signing key lifecycle.
//!
//! The [`KeyManager`] owns every RSA key pair the server signs with. Keys live
//! in a [`KeyStorage`]; the manager only caches parsed key material by kid.
//!
//! # Active key election
//!
//! There is no process-wide "current key". Instances that find no active key
//! generate one and race through [`KeyStorage::insert_if_absent`]. A loser
//! adopts whatever became active. If two differently named keys end up
//! active anyway, the lexicographically lowest kid wins and the others are
//! deactivated ([`KeyManager::converge`]). Deactivated keys keep verifying
//! until their own expiry.

use std::sync::Arc;

use dashmap::DashMap;
use time::OffsetDateTime;
use time::macros::format_description;

use super::jwt::{Jwks, KeyMaterial, SIGNING_ALGORITHM_NAME, SigningKeyPair};
use crate::clock::Clock;
use crate::config::KeyConfig;
use crate::storage::KeyStorage;
use crate::types::SigningKeyRecord;
use crate::{AuthError, AuthResult};

/// Attempts at inserting a freshly generated key before giving up.
const MAX_CREATE_ATTEMPTS: usize = 3;

/// Highest numeric suffix tried when picking a kid for a day.
const MAX_KID_SUFFIX: usize = 1000;

struct CachedKey {
    pair: Arc<SigningKeyPair>,
    expires_at: OffsetDateTime,
}

/// Creates, rotates, resolves and publishes signing keys.
pub struct KeyManager {
    storage: Arc<dyn KeyStorage>,
    clock: Arc<dyn Clock>,
    config: KeyConfig,
    cache: DashMap<String, CachedKey>,
}

impl KeyManager {
    /// Creates a key manager over the given store.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyStorage>, clock: Arc<dyn Clock>, config: KeyConfig) -> Self {
        Self {
            storage,
            clock,
            config,
            cache: DashMap::new(),
        }
    }

    /// Returns the key new tokens are signed with, creating one if none is active.
    ///
    /// # Errors
    ///
    /// Returns `KeyGeneration` if a new key could not be generated, or
    /// `StoreUnavailable` if the key store cannot be reached.
    pub async fn get_active_key(&self) -> AuthResult<Arc<SigningKeyPair>> {
        if let Some(kid) = self.converge().await? {
            return self.load(&kid).await;
        }

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let now = self.clock.now();
            let record = self.generate_record(now).await?;
            let kid = record.kid.clone();

            if self.storage.insert_if_absent(&record).await? {
                tracing::info!(kid = %kid, "Created signing key");
                self.cache_record(&record)?;
            } else {
                tracing::debug!(kid = %kid, attempt, "Signing key kid taken by a concurrent creator");
            }

            // Whoever won, the store now decides which key is active.
            if let Some(winner) = self.converge().await? {
                if winner != kid {
                    tracing::info!(kid = %winner, discarded = %kid, "Adopted concurrently created signing key");
                }
                return self.load(&winner).await;
            }
        }

        Err(AuthError::key_generation(
            "no active signing key after repeated creation attempts",
        ))
    }

    /// Returns the public PEM of a key that has not expired, active or not.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown or expired kids.
    pub async fn get_key_by_id(&self, kid: &str) -> AuthResult<String> {
        let record = self.find_unexpired(kid).await?;
        Ok(record.public_key_pem)
    }

    /// Deactivates the active key and starts signing with a fresh one.
    ///
    /// The new key material is generated before anything is deactivated, so
    /// a generation failure leaves the current active key in place.
    ///
    /// # Errors
    ///
    /// Returns `KeyGeneration` or `StoreUnavailable`.
    pub async fn rotate(&self) -> AuthResult<Arc<SigningKeyPair>> {
        let now = self.clock.now();
        let material = self.generate_material().await?;

        let previous = self.storage.list_active().await?;
        for key in &previous {
            if self.storage.set_active(&key.kid, false).await? {
                tracing::info!(kid = %key.kid, "Deactivated signing key for rotation");
            }
        }

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let kid = self.next_kid(now).await?;
            let record = SigningKeyRecord {
                kid: kid.clone(),
                public_key_pem: material.public_pem.clone(),
                private_key_pem: material.private_pem.clone(),
                algorithm: SIGNING_ALGORITHM_NAME.to_string(),
                created_at: now,
                expires_at: now + self.config.key_lifetime,
                active: true,
            };

            if self.storage.insert_if_absent(&record).await? {
                tracing::info!(kid = %kid, "Rotated signing key");
                return self.cache_record(&record);
            }
        }

        Err(AuthError::key_generation(
            "could not allocate a kid for the rotated key",
        ))
    }

    /// Publishes the public half of every unexpired key.
    ///
    /// Rotated-out keys stay listed until they expire, since tokens they
    /// signed are still accepted until then. The active key comes first.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the key store cannot be reached.
    pub async fn publish_jwks(&self) -> AuthResult<Jwks> {
        let now = self.clock.now();
        let mut records: Vec<SigningKeyRecord> = self
            .storage
            .list_all()
            .await?
            .into_iter()
            .filter(|record| !record.is_expired_at(now))
            .collect();
        records.sort_by(|a, b| b.active.cmp(&a.active).then_with(|| a.kid.cmp(&b.kid)));

        let mut keys = Vec::with_capacity(records.len());
        for record in &records {
            keys.push(self.cache_record(record)?.to_jwk());
        }
        Ok(Jwks { keys })
    }

    /// Settles the active key set and returns the winning kid.
    ///
    /// Expired active keys are deactivated. Of the remaining active keys the
    /// lowest kid stays active and the rest are deactivated. Returns `None`
    /// when no usable active key is left.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the key store cannot be reached.
    pub async fn converge(&self) -> AuthResult<Option<String>> {
        let now = self.clock.now();
        let mut winner: Option<String> = None;

        // list_active is sorted by kid, so the first usable key wins.
        for key in self.storage.list_active().await? {
            if key.is_expired_at(now) {
                if self.storage.set_active(&key.kid, false).await? {
                    tracing::info!(kid = %key.kid, "Deactivated expired signing key");
                }
                continue;
            }

            match &winner {
                None => winner = Some(key.kid),
                Some(kept) => {
                    if self.storage.set_active(&key.kid, false).await? {
                        tracing::warn!(
                            kid = %key.kid,
                            kept = %kept,
                            "Multiple active signing keys; deactivated the higher kid"
                        );
                    }
                }
            }
        }

        Ok(winner)
    }

    /// Resolves an unexpired key for signature verification.
    pub(crate) async fn verification_key(&self, kid: &str) -> AuthResult<Arc<SigningKeyPair>> {
        let now = self.clock.now();
        if let Some(cached) = self.cache.get(kid) {
            if now < cached.expires_at {
                return Ok(Arc::clone(&cached.pair));
            }
        }

        let record = self.find_unexpired(kid).await?;
        self.cache_record(&record)
    }

    async fn find_unexpired(&self, kid: &str) -> AuthResult<SigningKeyRecord> {
        let now = self.clock.now();
        match self.storage.find(kid).await? {
            Some(record) if !record.is_expired_at(now) => Ok(record),
            Some(_) => {
                self.cache.remove(kid);
                Err(AuthError::not_found(format!("signing key {kid} has expired")))
            }
            None => Err(AuthError::not_found(format!("unknown signing key {kid}"))),
        }
    }

    async fn load(&self, kid: &str) -> AuthResult<Arc<SigningKeyPair>> {
        if let Some(cached) = self.cache.get(kid) {
            return Ok(Arc::clone(&cached.pair));
        }
        let record = self.find_unexpired(kid).await?;
        self.cache_record(&record)
    }

    fn cache_record(&self, record: &SigningKeyRecord) -> AuthResult<Arc<SigningKeyPair>> {
        if let Some(cached) = self.cache.get(&record.kid) {
            return Ok(Arc::clone(&cached.pair));
        }

        let pair = Arc::new(SigningKeyPair::from_pem(
            &record.kid,
            &record.private_key_pem,
            &record.public_key_pem,
        )?);
        self.cache.insert(
            record.kid.clone(),
            CachedKey {
                pair: Arc::clone(&pair),
                expires_at: record.expires_at,
            },
        );
        Ok(pair)
    }

    async fn generate_record(&self, now: OffsetDateTime) -> AuthResult<SigningKeyRecord> {
        let material = self.generate_material().await?;
        let kid = self.next_kid(now).await?;

        Ok(SigningKeyRecord {
            kid,
            public_key_pem: material.public_pem,
            private_key_pem: material.private_pem,
            algorithm: SIGNING_ALGORITHM_NAME.to_string(),
            created_at: now,
            expires_at: now + self.config.key_lifetime,
            active: true,
        })
    }

    async fn generate_material(&self) -> AuthResult<KeyMaterial> {
        let bits = self.config.key_size;
        let material =
            tokio::task::spawn_blocking(move || SigningKeyPair::generate_rsa_material(bits))
                .await
                .map_err(|e| AuthError::key_generation(format!("key generation task failed: {e}")))?;

        material.map_err(|e| {
            tracing::error!(error = %e, "RSA key generation failed");
            AuthError::from(e)
        })
    }

    /// `{prefix}{YYYY-MM-DD}`, or the first free `-N` suffix of it.
    async fn next_kid(&self, now: OffsetDateTime) -> AuthResult<String> {
        let date = now
            .date()
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(|e| AuthError::internal(format!("failed to format key date: {e}")))?;
        let base = format!("{}{}", self.config.kid_prefix, date);

        if self.storage.find(&base).await?.is_none() {
            return Ok(base);
        }
        for suffix in 2..=MAX_KID_SUFFIX {
            let candidate = format!("{base}-{suffix}");
            if self.storage.find(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }

        Err(AuthError::key_generation(format!(
            "all kids for {date} are taken"
        )))
    }
}
