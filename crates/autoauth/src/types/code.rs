//! Authorization code records.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::ScopeSet;
use crate::oauth::pkce::PkceChallengeMethod;

/// An issued authorization code.
///
/// The record is written once at issuance and mutated exactly once on
/// redemption, when `used` flips to `true`. A used code can never be
/// redeemed again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// Opaque random code value (primary key).
    pub code: String,

    /// Subject the code was granted for.
    pub user_id: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// Granted scopes.
    pub scope: ScopeSet,

    /// Redirect URI recorded at issuance; redemption must present the same one.
    pub redirect_uri: String,

    /// PKCE challenge, if the flow used one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method, present whenever `code_challenge` is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<PkceChallengeMethod>,

    /// When the code was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When the code stops being redeemable.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Whether the code has been redeemed.
    #[serde(default)]
    pub used: bool,

    /// When the code was redeemed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub used_at: Option<OffsetDateTime>,
}

impl AuthorizationCode {
    /// Returns `true` if the code has expired at `now`. A code is still
    /// redeemable at the instant of `expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }

    /// Returns `true` if the code carries a PKCE challenge.
    #[must_use]
    pub fn has_challenge(&self) -> bool {
        self.code_challenge.is_some()
    }

    /// Generates a random code value.
    ///
    /// 32 random bytes encoded as base64url (43 characters).
    #[must_use]
    pub fn generate_code() -> String {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Returns a short, non-secret prefix of the code for log lines.
    #[must_use]
    pub fn log_prefix(code: &str) -> &str {
        code.get(..8).unwrap_or(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn sample(now: OffsetDateTime) -> AuthorizationCode {
        AuthorizationCode {
            code: AuthorizationCode::generate_code(),
            user_id: "42".to_string(),
            client_id: "c1".to_string(),
            scope: ScopeSet::parse("profile email"),
            redirect_uri: "https://app/cb".to_string(),
            code_challenge: None,
            code_challenge_method: None,
            issued_at: now,
            expires_at: now + Duration::seconds(60),
            used: false,
            used_at: None,
        }
    }

    #[test]
    fn test_generate_code_is_url_safe() {
        let code = AuthorizationCode::generate_code();
        assert_eq!(code.len(), 43);
        assert!(
            code.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(code, AuthorizationCode::generate_code());
    }

    #[test]
    fn test_expiry_boundary() {
        let now = OffsetDateTime::now_utc();
        let code = sample(now);
        assert!(!code.is_expired_at(now + Duration::seconds(59)));
        assert!(!code.is_expired_at(now + Duration::seconds(60)));
        assert!(code.is_expired_at(now + Duration::seconds(61)));
    }

    #[test]
    fn test_log_prefix() {
        assert_eq!(AuthorizationCode::log_prefix("abcdefghijkl"), "abcdefgh");
        assert_eq!(AuthorizationCode::log_prefix("abc"), "abc");
    }

    #[test]
    fn test_serde_roundtrip_keeps_pkce() {
        let now = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap();
        let mut code = sample(now);
        code.code_challenge = Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string());
        code.code_challenge_method = Some(PkceChallengeMethod::S256);

        let json = serde_json::to_string(&code).unwrap();
        assert!(json.contains("\"code_challenge_method\":\"S256\""));
        let back: AuthorizationCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }
}
