//! Authorization code issuance and redemption.
//!
//! Codes are single-use. Redemption checks everything it can against the
//! stored record first and only then performs the atomic mark-used at the
//! store, so exactly one of any number of concurrent redemptions wins.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::CodeConfig;
use crate::oauth::pkce::{self, PkceChallengeMethod};
use crate::storage::CodeStorage;
use crate::types::{AuthorizationCode, ScopeSet};
use crate::{AuthError, AuthResult};

/// Parameters for minting a code.
#[derive(Debug, Clone)]
pub struct CodeRequest {
    pub user_id: String,
    pub client_id: String,
    pub scope: ScopeSet,
    pub redirect_uri: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    /// Requested lifetime; clamped into the configured bounds.
    pub ttl: Option<Duration>,
}

/// A freshly minted code.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub expires_in: Duration,
}

/// What a successful redemption yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemedCode {
    pub user_id: String,
    pub client_id: String,
    pub scope: ScopeSet,
}

/// Issues and redeems authorization codes.
pub struct AuthorizationCodeManager {
    codes: Arc<dyn CodeStorage>,
    clock: Arc<dyn Clock>,
    config: CodeConfig,
}

impl AuthorizationCodeManager {
    /// Creates a manager over a code store.
    pub fn new(codes: Arc<dyn CodeStorage>, clock: Arc<dyn Clock>, config: CodeConfig) -> Self {
        Self {
            codes,
            clock,
            config,
        }
    }

    /// Mints a code bound to the request's client, redirect URI and optional
    /// PKCE challenge.
    ///
    /// A challenge without a method is treated as `plain`, as RFC 7636
    /// prescribes. A method without a challenge is rejected.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for an unknown method, a malformed challenge, or a
    ///   method without challenge
    /// - storage errors
    pub async fn issue(&self, request: CodeRequest) -> AuthResult<IssuedCode> {
        let (challenge, method) = match (request.code_challenge, request.code_challenge_method) {
            (Some(challenge), method) => {
                let method = PkceChallengeMethod::parse(method.as_deref().unwrap_or("plain"))?;
                method.check_challenge(&challenge)?;
                (Some(challenge), Some(method))
            }
            (None, Some(_)) => {
                return Err(AuthError::invalid_request(
                    "code_challenge_method given without code_challenge",
                ));
            }
            (None, None) => (None, None),
        };

        let ttl = self.config.clamp_ttl(request.ttl);
        let now = self.clock.now();
        let record = AuthorizationCode {
            code: AuthorizationCode::generate_code(),
            user_id: request.user_id,
            client_id: request.client_id,
            scope: request.scope,
            redirect_uri: request.redirect_uri,
            code_challenge: challenge,
            code_challenge_method: method,
            issued_at: now,
            expires_at: now + ttl,
            used: false,
            used_at: None,
        };

        self.codes.create(&record).await?;

        tracing::info!(
            code = AuthorizationCode::log_prefix(&record.code),
            client_id = %record.client_id,
            user_id = %record.user_id,
            pkce = record.code_challenge_method.map(|m| m.as_str()).unwrap_or("none"),
            ttl_secs = ttl.as_secs(),
            "Authorization code issued"
        );

        Ok(IssuedCode {
            code: record.code,
            expires_in: ttl,
        })
    }

    /// Redeems a code.
    ///
    /// Checks, in order: existence, used flag, expiry, client id, redirect
    /// URI, then PKCE when a challenge was recorded. A code issued without a
    /// challenge does not require (and ignores) a verifier. On success the
    /// code is atomically marked used; losing that race yields `AlreadyUsed`.
    ///
    /// Failed checks do not consume the code.
    ///
    /// # Errors
    ///
    /// `NotFound`, `AlreadyUsed`, `Expired`, `ClientMismatch`,
    /// `InvalidRequest` (verifier missing), `PkceVerificationFailed`, or a
    /// storage error.
    pub async fn redeem(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        verifier: Option<&str>,
    ) -> AuthResult<RedeemedCode> {
        let prefix = AuthorizationCode::log_prefix(code);
        let record = self
            .codes
            .find(code)
            .await?
            .ok_or_else(|| AuthError::not_found("authorization code"))?;

        if record.used {
            tracing::warn!(code = prefix, client_id = %client_id, "Authorization code replay");
            return Err(AuthError::AlreadyUsed);
        }

        let now = self.clock.now();
        if record.is_expired_at(now) {
            return Err(AuthError::expired("authorization code"));
        }

        if record.client_id != client_id {
            tracing::warn!(code = prefix, expected = %record.client_id, got = %client_id, "Client mismatch on redemption");
            return Err(AuthError::client_mismatch("client_id does not match"));
        }
        if record.redirect_uri != redirect_uri {
            return Err(AuthError::client_mismatch("redirect_uri does not match"));
        }

        if let (Some(challenge), Some(method)) =
            (record.code_challenge.as_deref(), record.code_challenge_method)
        {
            let verifier =
                verifier.ok_or_else(|| AuthError::invalid_request("code_verifier required"))?;
            if !pkce::verify(verifier, challenge, method) {
                tracing::warn!(code = prefix, client_id = %client_id, "PKCE verification failed");
                return Err(AuthError::PkceVerificationFailed);
            }
        }

        if !self.codes.mark_used(code, now).await? {
            tracing::warn!(code = prefix, client_id = %client_id, "Lost redemption race");
            return Err(AuthError::AlreadyUsed);
        }

        tracing::info!(code = prefix, client_id = %client_id, user_id = %record.user_id, "Authorization code redeemed");

        Ok(RedeemedCode {
            user_id: record.user_id,
            client_id: record.client_id,
            scope: record.scope,
        })
    }

    /// Deletes expired codes.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn cleanup_expired(&self) -> AuthResult<u64> {
        self.codes.delete_expired(self.clock.now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    fn manager() -> (AuthorizationCodeManager, Arc<ManualClock>, Arc<MemoryStorage>) {
        let store = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::starting_now());
        let manager =
            AuthorizationCodeManager::new(store.clone(), clock.clone(), CodeConfig::default());
        (manager, clock, store)
    }

    fn request(challenge: Option<&str>, method: Option<&str>) -> CodeRequest {
        CodeRequest {
            user_id: "42".to_string(),
            client_id: "c1".to_string(),
            scope: ScopeSet::parse("profile email"),
            redirect_uri: "https://app/cb".to_string(),
            code_challenge: challenge.map(str::to_string),
            code_challenge_method: method.map(str::to_string),
            ttl: None,
        }
    }

    #[tokio::test]
    async fn test_issue_and_redeem_with_s256() {
        let (manager, _, _) = manager();
        let issued = manager
            .issue(request(Some(CHALLENGE), Some("S256")))
            .await
            .unwrap();
        assert_eq!(issued.expires_in, Duration::from_secs(600));

        let redeemed = manager
            .redeem(&issued.code, "c1", "https://app/cb", Some(VERIFIER))
            .await
            .unwrap();
        assert_eq!(redeemed.user_id, "42");
        assert_eq!(redeemed.scope, ScopeSet::parse("profile email"));
    }

    #[tokio::test]
    async fn test_second_redemption_is_already_used() {
        let (manager, _, _) = manager();
        let issued = manager
            .issue(request(Some(CHALLENGE), Some("S256")))
            .await
            .unwrap();

        manager
            .redeem(&issued.code, "c1", "https://app/cb", Some(VERIFIER))
            .await
            .unwrap();
        let err = manager
            .redeem(&issued.code, "c1", "https://app/cb", Some(VERIFIER))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AlreadyUsed));
    }

    #[tokio::test]
    async fn test_unknown_code_not_found() {
        let (manager, _, _) = manager();
        let err = manager
            .redeem("nope", "c1", "https://app/cb", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_expired_after_61_seconds() {
        let (manager, clock, _) = manager();
        let mut req = request(Some(CHALLENGE), Some("S256"));
        req.ttl = Some(Duration::from_secs(60));
        let issued = manager.issue(req).await.unwrap();

        clock.advance(Duration::from_secs(61));
        let err = manager
            .redeem(&issued.code, "c1", "https://app/cb", Some(VERIFIER))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Expired { .. }));
    }

    #[tokio::test]
    async fn test_redeemable_at_expiry_instant() {
        let (manager, clock, _) = manager();
        let mut req = request(Some(CHALLENGE), Some("S256"));
        req.ttl = Some(Duration::from_secs(60));
        let issued = manager.issue(req).await.unwrap();

        clock.advance(Duration::from_secs(60));
        let redeemed = manager
            .redeem(&issued.code, "c1", "https://app/cb", Some(VERIFIER))
            .await
            .unwrap();
        assert_eq!(redeemed.client_id, "c1");
    }

    #[tokio::test]
    async fn test_ttl_is_clamped() {
        let (manager, _, store) = manager();
        let mut req = request(None, None);
        req.ttl = Some(Duration::from_secs(5));
        let issued = manager.issue(req).await.unwrap();
        assert_eq!(issued.expires_in, Duration::from_secs(60));

        let record = CodeStorage::find(store.as_ref(), &issued.code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.expires_at - record.issued_at, time::Duration::seconds(60));

        let mut req = request(None, None);
        req.ttl = Some(Duration::from_secs(86_400));
        assert_eq!(
            manager.issue(req).await.unwrap().expires_in,
            Duration::from_secs(600)
        );
    }

    #[tokio::test]
    async fn test_client_and_redirect_mismatch() {
        let (manager, _, _) = manager();
        let issued = manager
            .issue(request(Some(CHALLENGE), Some("S256")))
            .await
            .unwrap();

        let err = manager
            .redeem(&issued.code, "c2", "https://app/cb", Some(VERIFIER))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ClientMismatch { .. }));

        let err = manager
            .redeem(&issued.code, "c1", "https://evil/cb", Some(VERIFIER))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ClientMismatch { .. }));

        // Failed attempts do not consume the code
        assert!(
            manager
                .redeem(&issued.code, "c1", "https://app/cb", Some(VERIFIER))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_missing_and_wrong_verifier() {
        let (manager, _, _) = manager();
        let issued = manager
            .issue(request(Some(CHALLENGE), Some("S256")))
            .await
            .unwrap();

        let err = manager
            .redeem(&issued.code, "c1", "https://app/cb", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        let err = manager
            .redeem(&issued.code, "c1", "https://app/cb", Some("wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PkceVerificationFailed));
    }

    #[tokio::test]
    async fn test_code_without_challenge_ignores_verifier() {
        let (manager, _, _) = manager();
        let issued = manager.issue(request(None, None)).await.unwrap();
        assert!(
            manager
                .redeem(&issued.code, "c1", "https://app/cb", Some("anything"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_plain_is_default_method() {
        let (manager, _, store) = manager();
        let issued = manager
            .issue(request(Some("verifier123"), None))
            .await
            .unwrap();
        let record = CodeStorage::find(store.as_ref(), &issued.code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.code_challenge_method, Some(PkceChallengeMethod::Plain));

        assert!(
            manager
                .redeem(&issued.code, "c1", "https://app/cb", Some("verifier123"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_bad_method_rejected_at_issue() {
        let (manager, _, _) = manager();
        let err = manager
            .issue(request(Some(CHALLENGE), Some("S512")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        let err = manager.issue(request(None, Some("S256"))).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_store_outage_propagates() {
        let (manager, _, store) = manager();
        let issued = manager.issue(request(None, None)).await.unwrap();
        store.set_available(false);
        let err = manager
            .redeem(&issued.code, "c1", "https://app/cb", None)
            .await
            .unwrap_err();
        assert!(err.is_store_unavailable());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let (manager, clock, _) = manager();
        manager.issue(request(None, None)).await.unwrap();
        clock.advance(Duration::from_secs(601));
        assert_eq!(manager.cleanup_expired().await.unwrap(), 1);
    }
}
