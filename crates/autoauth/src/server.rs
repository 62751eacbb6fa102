//! The authorization server façade.
//!
//! [`AuthorizationServer`] wires the code manager, key manager and token
//! manager to a set of stores and exposes the operations the HTTP layer
//! serves: generate-code, validate-code, issue-tokens, refresh-tokens,
//! validate-token, revoke-token, jwks, and bulk revocation per user.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use autoauth::{AuthConfig, AuthorizationServer, MemoryStorage};
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let server = AuthorizationServer::builder(AuthConfig::default())
//!     .with_storage(storage)
//!     .build()?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audit::{ActivityEvent, ActivityType, AuditLog, RequestContext};
use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::maintenance::Maintenance;
use crate::oauth::{AuthorizationCodeManager, CodeRequest, PkceChallengeMethod};
use crate::storage::{
    AuditStorage, ClientStorage, CodeStorage, KeyStorage, RevocationIndex, TokenStorage,
};
use crate::token::{Jwks, KeyManager, TokenManager, TokenPair, UserIdentity};
use crate::types::{OAuthClient, RevocationReason, ScopeSet, TokenType};
use crate::{AuthError, AuthResult};

// ============================================================================
// Operation payloads
// ============================================================================

/// `generate-code` input.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateCodeRequest {
    pub user_id: String,
    pub client_id: String,
    /// Space-separated scopes.
    #[serde(default)]
    pub scope: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    /// Requested lifetime in seconds, clamped to the configured bounds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// `generate-code` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateCodeResponse {
    pub code: String,
    pub expires_in: u64,
}

/// `validate-code` input.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateCodeRequest {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub code_verifier: Option<String>,
}

/// `validate-code` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateCodeResponse {
    pub user_id: String,
    pub client_id: String,
    pub scope: Vec<String>,
}

/// `issue-tokens` input.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueTokensRequest {
    pub user_id: String,
    pub client_id: String,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

/// `refresh-tokens` input.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokensRequest {
    pub refresh_token: String,
    pub client_id: String,
}

/// `validate-token` / `revoke-token` input.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

/// `validate-token` output.
///
/// Client-side failures are reported in-band with `valid = false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    /// Unix timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidateTokenResponse {
    fn invalid(error: &AuthError) -> Self {
        Self {
            valid: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// `revoke-token` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeTokenResponse {
    pub message: String,
}

/// Bulk revocation output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeUserTokensResponse {
    pub user_id: String,
    pub revoked: u64,
}

// ============================================================================
// Server
// ============================================================================

/// The authorization server core.
pub struct AuthorizationServer {
    config: AuthConfig,
    clients: Arc<dyn ClientStorage>,
    codes: AuthorizationCodeManager,
    tokens: TokenManager,
    keys: Arc<KeyManager>,
    audit: AuditLog,
    clock: Arc<dyn Clock>,
    maintenance: Maintenance,
}

impl AuthorizationServer {
    /// Starts building a server from configuration.
    #[must_use]
    pub fn builder(config: AuthConfig) -> AuthorizationServerBuilder {
        AuthorizationServerBuilder::new(config)
    }

    /// Returns the configuration the server was built with.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Returns the key manager.
    #[must_use]
    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    /// Returns the token manager.
    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Returns the clock expiry decisions are made with.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the sweeper over this server's stores.
    #[must_use]
    pub fn maintenance(&self) -> Maintenance {
        self.maintenance.clone()
    }

    /// Returns the audit log.
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Registers or replaces a client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an invalid registration, or a storage error.
    pub async fn register_client(&self, client: &OAuthClient) -> AuthResult<()> {
        client
            .validate()
            .map_err(|e| AuthError::invalid_request(e.to_string()))?;
        self.clients.upsert(client).await
    }

    /// Mints an authorization code for a registered client.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` - unknown or inactive client, disallowed scope,
    ///   missing or malformed PKCE challenge, `plain` where not allowed
    /// - `ClientMismatch` - the redirect URI is not registered for the client
    /// - storage errors
    pub async fn generate_code(
        &self,
        request: GenerateCodeRequest,
        context: &RequestContext,
    ) -> AuthResult<GenerateCodeResponse> {
        let client = self.active_client(&request.client_id).await?;

        if !client.is_redirect_uri_allowed(&request.redirect_uri) {
            return Err(AuthError::client_mismatch(
                "redirect_uri is not registered for this client",
            ));
        }

        let scope = ScopeSet::parse(&request.scope);
        ensure_scope_allowed(&client, &scope)?;

        let policy = &self.config.codes;
        match request.code_challenge {
            None if client.requires_pkce(policy.require_pkce) => {
                return Err(AuthError::invalid_request("code_challenge is required"));
            }
            Some(_) => {
                let method = request.code_challenge_method.as_deref().unwrap_or("plain");
                if PkceChallengeMethod::parse(method)? == PkceChallengeMethod::Plain
                    && !client.allows_plain_pkce(policy.allow_plain_pkce)
                {
                    return Err(AuthError::invalid_request(
                        "plain code_challenge_method is not allowed for this client",
                    ));
                }
            }
            None => {}
        }

        let issued = self
            .codes
            .issue(CodeRequest {
                user_id: request.user_id.clone(),
                client_id: client.client_id.clone(),
                scope,
                redirect_uri: request.redirect_uri,
                code_challenge: request.code_challenge,
                code_challenge_method: request.code_challenge_method,
                ttl: request.expires_in.map(Duration::from_secs),
            })
            .await?;

        self.record(
            ActivityType::CodeIssued,
            &request.user_id,
            Some(&client.client_id),
            context,
        )
        .await;

        Ok(GenerateCodeResponse {
            code: issued.code,
            expires_in: issued.expires_in.as_secs(),
        })
    }

    /// Redeems an authorization code.
    ///
    /// # Errors
    ///
    /// See [`AuthorizationCodeManager::redeem`].
    pub async fn validate_code(
        &self,
        request: ValidateCodeRequest,
        context: &RequestContext,
    ) -> AuthResult<ValidateCodeResponse> {
        let redeemed = self
            .codes
            .redeem(
                &request.code,
                &request.client_id,
                &request.redirect_uri,
                request.code_verifier.as_deref(),
            )
            .await?;

        self.record(
            ActivityType::CodeRedeemed,
            &redeemed.user_id,
            Some(&redeemed.client_id),
            context,
        )
        .await;

        Ok(ValidateCodeResponse {
            user_id: redeemed.user_id,
            client_id: redeemed.client_id,
            scope: redeemed.scope.to_vec(),
        })
    }

    /// Issues an access and refresh token pair to a registered, active client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an empty user or client id, an unknown or
    /// inactive client or a scope outside the client's allowed set, or any
    /// issuance error.
    pub async fn issue_tokens(
        &self,
        request: IssueTokensRequest,
        context: &RequestContext,
    ) -> AuthResult<TokenPair> {
        if request.user_id.trim().is_empty() || request.client_id.trim().is_empty() {
            return Err(AuthError::invalid_request("user_id and client_id are required"));
        }

        let client = self.active_client(&request.client_id).await?;
        let scope = ScopeSet::from_scopes(request.scope);
        ensure_scope_allowed(&client, &scope)?;

        let identity = UserIdentity::new(request.user_id)
            .with_profile(request.user_email, request.user_name);
        let pair = self
            .tokens
            .issue_token_pair(&identity, &request.client_id, &scope, None)
            .await?;

        self.record(
            ActivityType::TokensIssued,
            &identity.user_id,
            Some(&request.client_id),
            context,
        )
        .await;

        Ok(pair)
    }

    /// Rotates a refresh token. A deactivated client can no longer rotate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an unknown or inactive client, otherwise
    /// see [`TokenManager::refresh`].
    pub async fn refresh_tokens(
        &self,
        request: RefreshTokensRequest,
        context: &RequestContext,
    ) -> AuthResult<TokenPair> {
        self.active_client(&request.client_id).await?;

        let rotation = self
            .tokens
            .rotate_refresh_token(&request.refresh_token, &request.client_id)
            .await?;

        self.record(
            ActivityType::TokensRefreshed,
            &rotation.user_id,
            Some(&request.client_id),
            context,
        )
        .await;

        Ok(rotation.pair)
    }

    /// Validates an access token.
    ///
    /// Client-side failures, including presenting a refresh token, come back
    /// as `valid = false` with an error message.
    ///
    /// # Errors
    ///
    /// Only server-side faults such as `StoreUnavailable` are returned as errors.
    pub async fn validate_token(&self, request: TokenRequest) -> AuthResult<ValidateTokenResponse> {
        let claims = match self.tokens.validate(&request.token).await {
            Ok(claims) => claims,
            Err(e) if e.is_client_error() => {
                tracing::debug!(error = %e, "Token rejected");
                return Ok(ValidateTokenResponse::invalid(&e));
            }
            Err(e) => return Err(e),
        };

        if claims.kind() != TokenType::Access {
            return Ok(ValidateTokenResponse::invalid(&AuthError::invalid_request(
                "token is not an access token",
            )));
        }

        Ok(ValidateTokenResponse {
            valid: true,
            scope: Some(claims.scopes().to_vec()),
            token_id: claims.id().map(|id| id.to_string()),
            expires_at: Some(claims.exp),
            user_id: Some(claims.sub),
            client_id: Some(claims.aud),
            error: None,
        })
    }

    /// Revokes a token. Revoking an unknown token succeeds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an empty token, or a storage error.
    pub async fn revoke_token(
        &self,
        request: TokenRequest,
        context: &RequestContext,
    ) -> AuthResult<RevokeTokenResponse> {
        if request.token.trim().is_empty() {
            return Err(AuthError::invalid_request("token is required"));
        }

        let record = self
            .tokens
            .revoke_with_reason(&request.token, RevocationReason::UserRequested)
            .await?;

        if let Some(record) = record {
            self.record(
                ActivityType::TokenRevoked,
                &record.user_id,
                Some(&record.client_id),
                context,
            )
            .await;
        }

        Ok(RevokeTokenResponse {
            message: "Token revoked successfully".to_string(),
        })
    }

    /// Revokes every active token of a user.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an empty user id, or a storage error.
    pub async fn revoke_user_tokens(
        &self,
        user_id: &str,
        context: &RequestContext,
    ) -> AuthResult<RevokeUserTokensResponse> {
        if user_id.trim().is_empty() {
            return Err(AuthError::invalid_request("user_id is required"));
        }

        let revoked = self
            .tokens
            .revoke_all_for_user(user_id, RevocationReason::Admin)
            .await?;

        self.record(ActivityType::UserTokensRevoked, user_id, None, context)
            .await;

        Ok(RevokeUserTokensResponse {
            user_id: user_id.to_string(),
            revoked,
        })
    }

    /// Publishes the JWKS, creating the first signing key if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns `KeyGeneration` or `StoreUnavailable`.
    pub async fn jwks(&self) -> AuthResult<Jwks> {
        let jwks = self.keys.publish_jwks().await?;
        if !jwks.keys.is_empty() {
            return Ok(jwks);
        }
        self.keys.get_active_key().await?;
        self.keys.publish_jwks().await
    }

    async fn active_client(&self, client_id: &str) -> AuthResult<OAuthClient> {
        let client = self
            .clients
            .find_by_client_id(client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_request(format!("unknown client: {client_id}")))?;

        if !client.active {
            return Err(AuthError::invalid_request(format!(
                "client is inactive: {client_id}"
            )));
        }
        Ok(client)
    }

    async fn record(
        &self,
        activity: ActivityType,
        user_id: &str,
        client_id: Option<&str>,
        context: &RequestContext,
    ) {
        let event = ActivityEvent::new(activity, user_id, client_id, context, self.clock.now());
        self.audit.record(event).await;
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`AuthorizationServer`].
pub struct AuthorizationServerBuilder {
    config: AuthConfig,
    clients: Option<Arc<dyn ClientStorage>>,
    codes: Option<Arc<dyn CodeStorage>>,
    tokens: Option<Arc<dyn TokenStorage>>,
    revocations: Option<Arc<dyn RevocationIndex>>,
    keys: Option<Arc<dyn KeyStorage>>,
    audit: Option<Arc<dyn AuditStorage>>,
    clock: Arc<dyn Clock>,
}

impl AuthorizationServerBuilder {
    fn new(config: AuthConfig) -> Self {
        Self {
            config,
            clients: None,
            codes: None,
            tokens: None,
            revocations: None,
            keys: None,
            audit: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Uses one backend for every store.
    #[must_use]
    pub fn with_storage<S>(mut self, storage: Arc<S>) -> Self
    where
        S: ClientStorage
            + CodeStorage
            + TokenStorage
            + RevocationIndex
            + KeyStorage
            + AuditStorage
            + 'static,
    {
        self.clients = Some(storage.clone());
        self.codes = Some(storage.clone());
        self.tokens = Some(storage.clone());
        self.revocations = Some(storage.clone());
        self.keys = Some(storage.clone());
        self.audit = Some(storage);
        self
    }

    #[must_use]
    pub fn clients(mut self, storage: Arc<dyn ClientStorage>) -> Self {
        self.clients = Some(storage);
        self
    }

    #[must_use]
    pub fn codes(mut self, storage: Arc<dyn CodeStorage>) -> Self {
        self.codes = Some(storage);
        self
    }

    #[must_use]
    pub fn tokens(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.tokens = Some(storage);
        self
    }

    #[must_use]
    pub fn revocations(mut self, index: Arc<dyn RevocationIndex>) -> Self {
        self.revocations = Some(index);
        self
    }

    #[must_use]
    pub fn keys(mut self, storage: Arc<dyn KeyStorage>) -> Self {
        self.keys = Some(storage);
        self
    }

    /// Persists audit events. Without it events are only logged.
    #[must_use]
    pub fn audit(mut self, storage: Arc<dyn AuditStorage>) -> Self {
        self.audit = Some(storage);
        self
    }

    /// Replaces the wall clock, e.g. with a `ManualClock` in tests.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validates the configuration and assembles the server.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the configuration is invalid or a store is missing.
    pub fn build(self) -> AuthResult<AuthorizationServer> {
        self.config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let clients = self.clients.ok_or_else(|| missing("client"))?;
        let codes = self.codes.ok_or_else(|| missing("code"))?;
        let tokens = self.tokens.ok_or_else(|| missing("token"))?;
        let revocations = self.revocations.ok_or_else(|| missing("revocation"))?;
        let key_storage = self.keys.ok_or_else(|| missing("key"))?;

        let keys = Arc::new(KeyManager::new(
            key_storage.clone(),
            self.clock.clone(),
            self.config.keys.clone(),
        ));
        let code_manager =
            AuthorizationCodeManager::new(codes.clone(), self.clock.clone(), self.config.codes.clone());
        let token_manager = TokenManager::new(
            keys.clone(),
            tokens.clone(),
            revocations.clone(),
            self.clock.clone(),
            self.config.issuer.clone(),
            self.config.tokens.clone(),
        );
        let maintenance = Maintenance::new(codes, tokens, revocations, key_storage);
        let audit = match self.audit {
            Some(storage) => AuditLog::with_storage(storage),
            None => AuditLog::tracing_only(),
        };

        Ok(AuthorizationServer {
            config: self.config,
            clients,
            codes: code_manager,
            tokens: token_manager,
            keys,
            audit,
            clock: self.clock,
            maintenance,
        })
    }
}

fn missing(store: &str) -> AuthError {
    AuthError::configuration(format!("{store} storage is not configured"))
}

fn ensure_scope_allowed(client: &OAuthClient, scope: &ScopeSet) -> AuthResult<()> {
    let disallowed = client.disallowed_scopes(scope);
    if disallowed.is_empty() {
        return Ok(());
    }
    Err(AuthError::invalid_request(format!(
        "scope not allowed for client: {}",
        disallowed.join(" ")
    )))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::clock::ManualClock;
    use crate::oauth::pkce;
    use crate::storage::MemoryStorage;

    const REDIRECT: &str = "https://app/cb";

    fn server() -> (Arc<MemoryStorage>, Arc<ManualClock>, AuthorizationServer) {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(datetime!(2026-10-16 12:00 UTC)));
        let server = AuthorizationServer::builder(AuthConfig::default())
            .with_storage(storage.clone())
            .clock(clock.clone())
            .build()
            .unwrap();
        (storage, clock, server)
    }

    async fn register(server: &AuthorizationServer, client: OAuthClient) {
        server.register_client(&client).await.unwrap();
    }

    fn code_request(challenge: Option<&str>, method: Option<&str>) -> GenerateCodeRequest {
        GenerateCodeRequest {
            user_id: "42".to_string(),
            client_id: "c1".to_string(),
            scope: "profile email".to_string(),
            redirect_uri: REDIRECT.to_string(),
            code_challenge: challenge.map(str::to_string),
            code_challenge_method: method.map(str::to_string),
            expires_in: None,
        }
    }

    #[tokio::test]
    async fn test_generate_code_checks_registry() {
        let (_storage, _clock, server) = server();
        let challenge = pkce::s256("verifier123");
        let ctx = RequestContext::default();

        let err = server
            .generate_code(code_request(Some(&challenge), Some("S256")), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        register(
            &server,
            OAuthClient::new("c1", REDIRECT).with_allowed_scopes(["profile", "email"]),
        )
        .await;

        let mut request = code_request(Some(&challenge), Some("S256"));
        request.redirect_uri = "https://app/cb/".to_string();
        let err = server.generate_code(request, &ctx).await.unwrap_err();
        assert!(matches!(err, AuthError::ClientMismatch { .. }));

        let mut request = code_request(Some(&challenge), Some("S256"));
        request.scope = "profile admin".to_string();
        let err = server.generate_code(request, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("admin"));

        let issued = server
            .generate_code(code_request(Some(&challenge), Some("S256")), &ctx)
            .await
            .unwrap();
        assert_eq!(issued.expires_in, 600);
    }

    #[tokio::test]
    async fn test_pkce_policy() {
        let (_storage, _clock, server) = server();
        let ctx = RequestContext::default();
        register(&server, OAuthClient::new("c1", REDIRECT)).await;

        // Required by default.
        let err = server
            .generate_code(code_request(None, None), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        let mut strict = OAuthClient::new("c1", REDIRECT);
        strict.allow_plain_pkce = Some(false);
        register(&server, strict).await;
        let err = server
            .generate_code(code_request(Some("verifier123"), Some("plain")), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("plain"));

        // Opt-out per client allows verifier-less redemption.
        register(&server, OAuthClient::new("c1", REDIRECT).with_require_pkce(false)).await;
        let code = server
            .generate_code(code_request(None, None), &ctx)
            .await
            .unwrap()
            .code;
        let redeemed = server
            .validate_code(
                ValidateCodeRequest {
                    code,
                    client_id: "c1".to_string(),
                    redirect_uri: REDIRECT.to_string(),
                    code_verifier: None,
                },
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(redeemed.user_id, "42");
    }

    #[tokio::test]
    async fn test_inactive_client_rejected() {
        let (_storage, _clock, server) = server();
        let mut client = OAuthClient::new("c1", REDIRECT);
        client.active = false;
        register(&server, client).await;

        let err = server
            .generate_code(
                code_request(Some("verifier123"), Some("plain")),
                &RequestContext::default(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("inactive"));
    }

    fn issue_request(client_id: &str, scope: &[&str]) -> IssueTokensRequest {
        IssueTokensRequest {
            user_id: "42".to_string(),
            client_id: client_id.to_string(),
            scope: scope.iter().map(|s| s.to_string()).collect(),
            user_email: None,
            user_name: None,
        }
    }

    #[tokio::test]
    async fn test_token_operations_require_active_client() {
        let (_storage, _clock, server) = server();
        let ctx = RequestContext::default();

        let err = server
            .issue_tokens(issue_request("c1", &["profile"]), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));
        assert!(err.to_string().contains("unknown client"));

        register(
            &server,
            OAuthClient::new("c1", REDIRECT).with_allowed_scopes(["profile"]),
        )
        .await;
        let err = server
            .issue_tokens(issue_request("c1", &["profile", "admin"]), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("admin"));

        let pair = server
            .issue_tokens(issue_request("c1", &["profile"]), &ctx)
            .await
            .unwrap();

        let mut deactivated = OAuthClient::new("c1", REDIRECT).with_allowed_scopes(["profile"]);
        deactivated.active = false;
        register(&server, deactivated).await;

        let refresh = RefreshTokensRequest {
            refresh_token: pair.refresh_token,
            client_id: "c1".to_string(),
        };
        let err = server
            .refresh_tokens(refresh.clone(), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("inactive"));
        let err = server
            .issue_tokens(issue_request("c1", &["profile"]), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("inactive"));

        // The rejected refresh did not consume the token.
        register(
            &server,
            OAuthClient::new("c1", REDIRECT).with_allowed_scopes(["profile"]),
        )
        .await;
        server.refresh_tokens(refresh, &ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_token_reports_in_band() {
        let (storage, _clock, server) = server();
        register(&server, OAuthClient::new("c1", REDIRECT)).await;
        let pair = server
            .issue_tokens(
                IssueTokensRequest {
                    user_id: "42".to_string(),
                    client_id: "c1".to_string(),
                    scope: vec!["profile".to_string()],
                    user_email: None,
                    user_name: None,
                },
                &RequestContext::default(),
            )
            .await
            .unwrap();

        let ok = server
            .validate_token(TokenRequest {
                token: pair.access_token.clone(),
            })
            .await
            .unwrap();
        assert!(ok.valid);
        assert_eq!(ok.user_id.as_deref(), Some("42"));
        assert!(ok.token_id.is_some());

        let refresh = server
            .validate_token(TokenRequest {
                token: pair.refresh_token,
            })
            .await
            .unwrap();
        assert!(!refresh.valid);
        assert!(refresh.error.is_some());

        let garbage = server
            .validate_token(TokenRequest {
                token: "garbage".to_string(),
            })
            .await
            .unwrap();
        assert!(!garbage.valid);

        storage.set_available(false);
        let err = server
            .validate_token(TokenRequest {
                token: pair.access_token,
            })
            .await
            .unwrap_err();
        assert!(err.is_store_unavailable());
    }

    #[tokio::test]
    async fn test_revoke_token_audits_owner() {
        let (_storage, _clock, server) = server();
        register(&server, OAuthClient::new("c1", REDIRECT)).await;
        let ctx = RequestContext {
            ip_address: Some("10.1.2.3".to_string()),
            user_agent: Some("test".to_string()),
        };
        let pair = server
            .issue_tokens(
                IssueTokensRequest {
                    user_id: "42".to_string(),
                    client_id: "c1".to_string(),
                    scope: vec!["profile".to_string()],
                    user_email: None,
                    user_name: None,
                },
                &ctx,
            )
            .await
            .unwrap();

        server
            .revoke_token(
                TokenRequest {
                    token: pair.access_token,
                },
                &ctx,
            )
            .await
            .unwrap();
        let err = server
            .revoke_token(
                TokenRequest {
                    token: " ".to_string(),
                },
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        let events = server.audit().recent_for_user("42", 10).await.unwrap();
        let kinds: Vec<ActivityType> = events.iter().map(|e| e.activity).collect();
        assert!(kinds.contains(&ActivityType::TokensIssued));
        assert!(kinds.contains(&ActivityType::TokenRevoked));
        assert!(events.iter().all(|e| e.ip_address.as_deref() == Some("10.1.2.3")));
    }

    #[tokio::test]
    async fn test_jwks_bootstraps_key() {
        let (_storage, _clock, server) = server();
        let jwks = server.jwks().await.unwrap();
        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys[0].kid, "oauth-key-2026-10-16");
    }

    #[test]
    fn test_build_requires_stores() {
        let err = AuthorizationServer::builder(AuthConfig::default())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Configuration { .. }));

        let mut config = AuthConfig::default();
        config.keys.key_size = 1024;
        let err = AuthorizationServer::builder(config)
            .with_storage(Arc::new(MemoryStorage::new()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }
}
