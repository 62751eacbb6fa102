//! Error types for the authorization server core.
//!
//! Every operation returns [`AuthResult`]. Client-caused failures (bad input,
//! unknown or expired credentials, replays) are distinguishable from each
//! other and from infrastructure faults, so callers can map them onto
//! protocol responses without string matching.

use std::fmt;

/// Errors that can occur while issuing or validating codes, keys and tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request is malformed: bad challenge method, missing verifier, bad scope.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// An authorization code, token or key id is unknown.
    #[error("Not found: {message}")]
    NotFound {
        /// What was looked up.
        message: String,
    },

    /// A code or token is past its expiry.
    #[error("Expired: {message}")]
    Expired {
        /// What expired.
        message: String,
    },

    /// The authorization code has already been redeemed.
    #[error("Authorization code already used")]
    AlreadyUsed,

    /// The token is present in the revocation index.
    #[error("Token revoked")]
    Revoked,

    /// JWT verification failed (bad signature, malformed token, wrong issuer).
    #[error("Signature invalid: {message}")]
    SignatureInvalid {
        /// Description of the verification failure.
        message: String,
    },

    /// The client id or redirect URI does not match the record.
    #[error("Client mismatch: {message}")]
    ClientMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// The PKCE verifier does not match the recorded challenge.
    #[error("PKCE verification failed")]
    PkceVerificationFailed,

    /// A backing store could not be reached or failed to answer.
    #[error("Store unavailable: {message}")]
    StoreUnavailable {
        /// Description of the store failure.
        message: String,
    },

    /// Generating or loading key material failed.
    #[error("Key generation error: {message}")]
    KeyGeneration {
        /// Description of the key failure.
        message: String,
    },

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new `Expired` error.
    #[must_use]
    pub fn expired(message: impl Into<String>) -> Self {
        Self::Expired {
            message: message.into(),
        }
    }

    /// Creates a new `SignatureInvalid` error.
    #[must_use]
    pub fn signature_invalid(message: impl Into<String>) -> Self {
        Self::SignatureInvalid {
            message: message.into(),
        }
    }

    /// Creates a new `ClientMismatch` error.
    #[must_use]
    pub fn client_mismatch(message: impl Into<String>) -> Self {
        Self::ClientMismatch {
            message: message.into(),
        }
    }

    /// Creates a new `StoreUnavailable` error.
    #[must_use]
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `KeyGeneration` error.
    #[must_use]
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the caller can recover by fixing its request (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::NotFound { .. }
                | Self::Expired { .. }
                | Self::AlreadyUsed
                | Self::Revoked
                | Self::SignatureInvalid { .. }
                | Self::ClientMismatch { .. }
                | Self::PkceVerificationFailed
        )
    }

    /// Returns `true` if this is a server-side fault (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. }
                | Self::KeyGeneration { .. }
                | Self::Configuration { .. }
                | Self::Internal { .. }
        )
    }

    /// Returns `true` if a backing store failed.
    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::Lookup,
            Self::Expired { .. } | Self::AlreadyUsed => ErrorCategory::Lifecycle,
            Self::Revoked | Self::SignatureInvalid { .. } => ErrorCategory::Token,
            Self::ClientMismatch { .. } | Self::PkceVerificationFailed => ErrorCategory::Client,
            Self::StoreUnavailable { .. } => ErrorCategory::Infrastructure,
            Self::KeyGeneration { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                ErrorCategory::Internal
            }
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::NotFound { .. }
            | Self::Expired { .. }
            | Self::AlreadyUsed
            | Self::ClientMismatch { .. }
            | Self::PkceVerificationFailed => "invalid_grant",
            Self::Revoked | Self::SignatureInvalid { .. } => "invalid_token",
            Self::StoreUnavailable { .. } => "temporarily_unavailable",
            Self::KeyGeneration { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "server_error"
            }
        }
    }
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed input.
    Validation,
    /// Unknown code, token or key.
    Lookup,
    /// Expired or already consumed credentials.
    Lifecycle,
    /// Token verification and revocation.
    Token,
    /// Client binding and proof-of-possession failures.
    Client,
    /// Store connectivity.
    Infrastructure,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Lookup => write!(f, "lookup"),
            Self::Lifecycle => write!(f, "lifecycle"),
            Self::Token => write!(f, "token"),
            Self::Client => write!(f, "client"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::not_found("authorization code");
        assert_eq!(err.to_string(), "Not found: authorization code");

        let err = AuthError::AlreadyUsed;
        assert_eq!(err.to_string(), "Authorization code already used");

        let err = AuthError::store_unavailable("connection refused");
        assert_eq!(err.to_string(), "Store unavailable: connection refused");
    }

    #[test]
    fn test_error_predicates() {
        let err = AuthError::client_mismatch("redirect_uri");
        assert!(err.is_client_error());
        assert!(!err.is_server_error());

        let err = AuthError::Revoked;
        assert!(err.is_client_error());

        let err = AuthError::store_unavailable("down");
        assert!(!err.is_client_error());
        assert!(err.is_server_error());
        assert!(err.is_store_unavailable());

        let err = AuthError::key_generation("entropy");
        assert!(err.is_server_error());
        assert!(!err.is_store_unavailable());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            AuthError::invalid_request("x").category(),
            ErrorCategory::Validation
        );
        assert_eq!(AuthError::AlreadyUsed.category(), ErrorCategory::Lifecycle);
        assert_eq!(AuthError::Revoked.category(), ErrorCategory::Token);
        assert_eq!(
            AuthError::store_unavailable("x").category(),
            ErrorCategory::Infrastructure
        );
    }

    #[test]
    fn test_oauth_error_code() {
        assert_eq!(AuthError::AlreadyUsed.oauth_error_code(), "invalid_grant");
        assert_eq!(
            AuthError::expired("code").oauth_error_code(),
            "invalid_grant"
        );
        assert_eq!(AuthError::Revoked.oauth_error_code(), "invalid_token");
        assert_eq!(
            AuthError::invalid_request("x").oauth_error_code(),
            "invalid_request"
        );
        assert_eq!(
            AuthError::store_unavailable("x").oauth_error_code(),
            "temporarily_unavailable"
        );
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Lifecycle.to_string(), "lifecycle");
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
