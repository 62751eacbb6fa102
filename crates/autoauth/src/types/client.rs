//! OAuth 2.0 client registrations.
//!
//! Clients are owned by an external registry; the core only reads them to
//! check redirect URIs, scopes and PKCE policy.

use serde::{Deserialize, Serialize};
use url::Url;

use super::ScopeSet;

/// A registered OAuth 2.0 client application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClient {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Human-readable display name.
    #[serde(default)]
    pub name: String,

    /// Registered redirect URIs. Matching is exact.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Scopes this client may request. Empty means any scope.
    #[serde(default)]
    pub allowed_scopes: Vec<String>,

    /// Whether this client is currently active.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Per-client override of the global "PKCE required" policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_pkce: Option<bool>,

    /// Per-client override of the global "plain method allowed" policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_plain_pkce: Option<bool>,
}

fn default_active() -> bool {
    true
}

impl OAuthClient {
    /// Creates an active client with one redirect URI and no scope restriction.
    #[must_use]
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self {
            name: client_id.clone(),
            client_id,
            redirect_uris: vec![redirect_uri.into()],
            allowed_scopes: Vec::new(),
            active: true,
            require_pkce: None,
            allow_plain_pkce: None,
        }
    }

    /// Restricts the scopes this client may request.
    #[must_use]
    pub fn with_allowed_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the PKCE requirement for this client.
    #[must_use]
    pub fn with_require_pkce(mut self, required: bool) -> Self {
        self.require_pkce = Some(required);
        self
    }

    /// Validates the registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client id is empty, no redirect URI is
    /// registered, or a redirect URI is not an absolute URL without fragment.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.trim().is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }
        if self.redirect_uris.is_empty() {
            return Err(ClientValidationError::NoRedirectUris);
        }
        for uri in &self.redirect_uris {
            let parsed = Url::parse(uri)
                .map_err(|_| ClientValidationError::InvalidRedirectUri(uri.clone()))?;
            if parsed.fragment().is_some() {
                return Err(ClientValidationError::InvalidRedirectUri(uri.clone()));
            }
        }
        Ok(())
    }

    /// Checks if the given redirect URI is registered for this client.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// Returns the requested scopes this client is not allowed to request.
    #[must_use]
    pub fn disallowed_scopes<'a>(&self, requested: &'a ScopeSet) -> Vec<&'a str> {
        if self.allowed_scopes.is_empty() {
            return Vec::new();
        }
        requested.not_in(&self.allowed_scopes)
    }

    /// Whether a code for this client must carry a PKCE challenge.
    #[must_use]
    pub fn requires_pkce(&self, global_default: bool) -> bool {
        self.require_pkce.unwrap_or(global_default)
    }

    /// Whether the `plain` challenge method is acceptable for this client.
    #[must_use]
    pub fn allows_plain_pkce(&self, global_default: bool) -> bool {
        self.allow_plain_pkce.unwrap_or(global_default)
    }
}

/// Client registration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID cannot be empty.
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// At least one redirect URI must be registered.
    #[error("At least one redirect URI is required")]
    NoRedirectUris,

    /// A redirect URI is not an absolute URL without fragment.
    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),
}
