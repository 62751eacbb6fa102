//! # autoauth
//!
//! OAuth 2.0 authorization server core.
//!
//! This crate provides:
//! - Authorization codes with PKCE (`S256` and `plain`)
//! - RS256 access and refresh tokens with single-use refresh rotation
//! - Signing key lifecycle and JWKS publication
//! - A revocation index consulted on every validation
//! - Periodic cleanup of expired records
//! - An audit trail of authorization activity
//!
//! ## Modules
//!
//! - [`config`] - Server configuration
//! - [`oauth`] - PKCE and the authorization code flow
//! - [`token`] - Signing keys, JWTs and the token lifecycle
//! - [`server`] - The [`AuthorizationServer`] façade
//! - [`storage`] - Storage traits and the in-memory backend
//! - [`maintenance`] - Expired-record sweeps
//! - [`audit`] - Activity logging
//! - [`http`] - Axum handlers and router

pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod maintenance;
pub mod oauth;
pub mod server;
pub mod storage;
pub mod token;
pub mod types;

pub use audit::{ActivityEvent, ActivityType, AuditLog, RequestContext};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, CodeConfig, ConfigError, KeyConfig, MaintenanceConfig, TokenConfig};
pub use error::{AuthError, ErrorCategory};
pub use http::router;
pub use maintenance::{Maintenance, SweepReport};
pub use oauth::{AuthorizationCodeManager, PkceChallenge, PkceChallengeMethod, PkceVerifier};
pub use server::{
    AuthorizationServer, AuthorizationServerBuilder, GenerateCodeRequest, GenerateCodeResponse,
    IssueTokensRequest, RefreshTokensRequest, RevokeTokenResponse, RevokeUserTokensResponse,
    TokenRequest, ValidateCodeRequest, ValidateCodeResponse, ValidateTokenResponse,
};
pub use storage::{
    AuditStorage, ClientStorage, CodeStorage, KeyStorage, MemoryStorage, RevocationIndex,
    TokenStorage,
};
pub use token::{Jwk, Jwks, KeyManager, TokenClaims, TokenManager, TokenPair, UserIdentity};
pub use types::{
    AuthorizationCode, OAuthClient, RevocationEntry, RevocationReason, ScopeSet,
    SigningKeyRecord, TokenRecord, TokenType,
};

/// Type alias for authorization server results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use autoauth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::audit::RequestContext;
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::server::{AuthorizationServer, AuthorizationServerBuilder};
    pub use crate::storage::{
        AuditStorage, ClientStorage, CodeStorage, KeyStorage, MemoryStorage, RevocationIndex,
        TokenStorage,
    };
    pub use crate::token::{Jwks, TokenClaims, TokenPair, UserIdentity};
    pub use crate::types::{OAuthClient, ScopeSet};
}
