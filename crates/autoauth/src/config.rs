//! Authorization server configuration.
//!
//! All sections use `#[serde(default)]`, so a partial TOML table only has to
//! name the values it changes. Durations are written in humantime form
//! (`"10m"`, `"30days"`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the authorization server core.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://auth.example.com"
///
/// [auth.codes]
/// default_ttl = "5m"
/// require_pkce = true
///
/// [auth.tokens]
/// access_token_ttl = "1h"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer placed in the `iss` claim and checked on validation.
    pub issuer: String,

    /// Authorization code settings.
    pub codes: CodeConfig,

    /// Access and refresh token settings.
    pub tokens: TokenConfig,

    /// Signing key settings.
    pub keys: KeyConfig,

    /// Periodic cleanup of expired records.
    pub maintenance: MaintenanceConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://epicdev.com".to_string(),
            codes: CodeConfig::default(),
            tokens: TokenConfig::default(),
            keys: KeyConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

/// Authorization code configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CodeConfig {
    /// Lifetime used when the caller does not ask for one.
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Requested lifetimes below this are raised to it.
    #[serde(with = "humantime_serde")]
    pub min_ttl: Duration,

    /// Requested lifetimes above this are lowered to it.
    #[serde(with = "humantime_serde")]
    pub max_ttl: Duration,

    /// Refuse to mint codes without a PKCE challenge unless the client opts out.
    pub require_pkce: bool,

    /// Accept the `plain` challenge method unless the client opts out.
    pub allow_plain_pkce: bool,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(600),
            min_ttl: Duration::from_secs(60),
            max_ttl: Duration::from_secs(600),
            require_pkce: true,
            allow_plain_pkce: true,
        }
    }
}

impl CodeConfig {
    /// Clamps a requested lifetime into `[min_ttl, max_ttl]`.
    #[must_use]
    pub fn clamp_ttl(&self, requested: Option<Duration>) -> Duration {
        requested
            .unwrap_or(self.default_ttl)
            .clamp(self.min_ttl, self.max_ttl)
    }
}

/// Token lifetime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_ttl: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_ttl: Duration,

    /// Upper bound on how long a revocation index entry is kept.
    /// Also used when the revoked token's own expiry is unknown.
    #[serde(with = "humantime_serde")]
    pub revocation_ceiling: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(3600),          // 1 hour
            refresh_token_ttl: Duration::from_secs(30 * 24 * 3600), // 30 days
            revocation_ceiling: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

impl TokenConfig {
    /// Sets the access token lifetime.
    #[must_use]
    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    /// Sets the refresh token lifetime.
    #[must_use]
    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }
}

/// Signing key configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeyConfig {
    /// RSA modulus size in bits.
    pub key_size: usize,

    /// How long a key stays usable for signing and verification.
    #[serde(with = "humantime_serde")]
    pub key_lifetime: Duration,

    /// Prefix of generated key ids; the creation date is appended.
    pub kid_prefix: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            key_size: 2048,
            key_lifetime: Duration::from_secs(365 * 24 * 3600),
            kid_prefix: "oauth-key-".to_string(),
        }
    }
}

/// Maintenance sweep configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Run the sweep in the background.
    pub enabled: bool,

    /// Time between sweeps.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(600),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the issuer is empty and
    /// `ConfigError::InvalidValue` if:
    /// - the code TTL bounds are inverted or the default lies outside them
    /// - a token lifetime is zero
    /// - the revocation ceiling is shorter than the refresh token lifetime
    /// - the RSA key size is below 2048 bits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Missing("issuer".to_string()));
        }

        let codes = &self.codes;
        if codes.min_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "codes.min_ttl must be > 0".to_string(),
            ));
        }
        if codes.min_ttl > codes.max_ttl {
            return Err(ConfigError::InvalidValue(
                "codes.min_ttl must be <= codes.max_ttl".to_string(),
            ));
        }
        if !(codes.min_ttl..=codes.max_ttl).contains(&codes.default_ttl) {
            return Err(ConfigError::InvalidValue(
                "codes.default_ttl must lie within [min_ttl, max_ttl]".to_string(),
            ));
        }

        if self.tokens.access_token_ttl.is_zero() || self.tokens.refresh_token_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "token lifetimes must be > 0".to_string(),
            ));
        }
        if self.tokens.revocation_ceiling < self.tokens.refresh_token_ttl {
            return Err(ConfigError::InvalidValue(
                "tokens.revocation_ceiling must be >= tokens.refresh_token_ttl".to_string(),
            ));
        }

        if self.keys.key_size < 2048 {
            return Err(ConfigError::InvalidValue(format!(
                "keys.key_size must be >= 2048, got {}",
                self.keys.key_size
            )));
        }
        if self.keys.key_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "keys.key_lifetime must be > 0".to_string(),
            ));
        }

        if self.maintenance.enabled && self.maintenance.interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "maintenance.interval must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
