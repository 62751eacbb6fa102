//! Proof Key for Code Exchange (RFC 7636).
//!
//! Both `S256` and `plain` are supported; verifier comparisons run
//! in constant time.
//!
//! # Example
//!
//! ```
//! use autoauth::oauth::pkce::{self, PkceChallenge, PkceVerifier};
//!
//! // Client generates a verifier and challenge
//! let verifier = PkceVerifier::generate();
//! let challenge = PkceChallenge::from_verifier(&verifier);
//!
//! // Server stores the challenge, later checks the verifier from the token request
//! assert!(pkce::validate(verifier.as_str(), challenge.as_str(), "S256"));
//! assert!(!pkce::validate(verifier.as_str(), challenge.as_str(), "S512"));
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Rejections of client-supplied PKCE parameters.
#[derive(Debug, thiserror::Error)]
pub enum PkceError {
    #[error("code_verifier must be 43-128 characters, got {0}")]
    InvalidVerifierLength(usize),

    #[error("code_verifier may only contain [A-Za-z0-9-._~]")]
    InvalidVerifierCharacters,

    #[error("malformed code_challenge: {0}")]
    InvalidChallengeFormat(&'static str),

    /// Only `S256` and `plain` exist; matching is case-sensitive.
    #[error("unsupported code_challenge_method '{0}'")]
    UnsupportedMethod(String),
}

impl From<PkceError> for crate::AuthError {
    fn from(err: PkceError) -> Self {
        Self::invalid_request(err.to_string())
    }
}

// =============================================================================
// PKCE Challenge Method
// =============================================================================

/// PKCE challenge method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PkceChallengeMethod {
    /// `BASE64URL(SHA256(verifier))`.
    S256,
    /// The challenge is the verifier itself.
    #[serde(rename = "plain")]
    Plain,
}

impl PkceChallengeMethod {
    /// Parse challenge method from string. Matching is case-sensitive.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::UnsupportedMethod` for anything but `S256` and `plain`.
    pub fn parse(method: &str) -> Result<Self, PkceError> {
        match method {
            "S256" => Ok(Self::S256),
            "plain" => Ok(Self::Plain),
            other => Err(PkceError::UnsupportedMethod(other.to_string())),
        }
    }

    /// Get the method as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }

    /// Checks that a challenge received from a client is well formed for this method.
    ///
    /// # Errors
    ///
    /// `S256` challenges must be 43 base64url characters (a SHA-256 digest);
    /// `plain` challenges must be 1-128 unreserved characters.
    pub fn check_challenge(&self, challenge: &str) -> Result<(), PkceError> {
        match self {
            Self::S256 => {
                let decoded = URL_SAFE_NO_PAD
                    .decode(challenge)
                    .map_err(|_| PkceError::InvalidChallengeFormat("not base64url"))?;
                if decoded.len() != 32 {
                    return Err(PkceError::InvalidChallengeFormat(
                        "S256 challenge must encode 32 bytes",
                    ));
                }
                Ok(())
            }
            Self::Plain => {
                if challenge.is_empty() || challenge.len() > 128 {
                    return Err(PkceError::InvalidChallengeFormat(
                        "plain challenge must be 1-128 characters",
                    ));
                }
                if !challenge.chars().all(is_unreserved) {
                    return Err(PkceError::InvalidChallengeFormat(
                        "plain challenge must use [A-Za-z0-9-._~]",
                    ));
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for PkceChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '~'
}

// =============================================================================
// Validation
// =============================================================================

/// Checks a verifier against a recorded challenge.
///
/// - `S256`: `BASE64URL(SHA256(verifier))` compared to `challenge`
/// - `plain`: `verifier` compared to `challenge`
/// - anything else: rejected
///
/// Both comparisons are constant time. Pure: no state, no side effects.
#[must_use]
pub fn validate(verifier: &str, challenge: &str, method: &str) -> bool {
    match PkceChallengeMethod::parse(method) {
        Ok(method) => verify(verifier, challenge, method),
        Err(_) => false,
    }
}

/// Typed form of [`validate`].
#[must_use]
pub fn verify(verifier: &str, challenge: &str, method: PkceChallengeMethod) -> bool {
    match method {
        PkceChallengeMethod::S256 => {
            let computed = s256(verifier);
            computed.as_bytes().ct_eq(challenge.as_bytes()).into()
        }
        PkceChallengeMethod::Plain => verifier.as_bytes().ct_eq(challenge.as_bytes()).into(),
    }
}

/// Computes `BASE64URL(SHA256(ASCII(verifier)))`.
#[must_use]
pub fn s256(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

// =============================================================================
// PKCE Verifier
// =============================================================================

/// PKCE code verifier, as a client would generate it.
///
/// A high-entropy random string over `[A-Z] / [a-z] / [0-9] / "-" / "." / "_" / "~"`,
/// 43 to 128 characters long.
#[derive(Debug, Clone)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Create a new verifier from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Length is not between 43 and 128 characters
    /// - Contains characters other than `[A-Za-z0-9-._~]`
    pub fn new(verifier: String) -> Result<Self, PkceError> {
        let len = verifier.len();
        if !(43..=128).contains(&len) {
            return Err(PkceError::InvalidVerifierLength(len));
        }
        if !verifier.chars().all(is_unreserved) {
            return Err(PkceError::InvalidVerifierCharacters);
        }
        Ok(Self(verifier))
    }

    /// Generate a cryptographically random verifier.
    ///
    /// Generates 32 random bytes and encodes them as base64url (43 characters).
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let bytes: [u8; 32] = rng.r#gen();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Get the verifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// PKCE Challenge
// =============================================================================

/// An S256 code challenge derived from a verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    /// Create a challenge from a verifier using the S256 method.
    #[must_use]
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        Self(s256(verifier.as_str()))
    }

    /// Get the challenge as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7636 Appendix B
    const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn test_rfc7636_vector() {
        assert_eq!(s256(RFC_VERIFIER), RFC_CHALLENGE);
        assert!(validate(RFC_VERIFIER, RFC_CHALLENGE, "S256"));
    }

    #[test]
    fn test_generated_pairs_validate() {
        for _ in 0..32 {
            let verifier = PkceVerifier::generate();
            let challenge = PkceChallenge::from_verifier(&verifier);
            assert!(validate(verifier.as_str(), challenge.as_str(), "S256"));
        }
    }

    #[test]
    fn test_any_bit_flip_in_verifier_fails() {
        let challenge = s256(RFC_VERIFIER);
        let bytes = RFC_VERIFIER.as_bytes();
        for i in 0..bytes.len() {
            for bit in 0..8 {
                let mut flipped = bytes.to_vec();
                flipped[i] ^= 1 << bit;
                let candidate = String::from_utf8_lossy(&flipped);
                assert!(
                    !validate(&candidate, &challenge, "S256"),
                    "flip of bit {bit} at byte {i} still validated"
                );
            }
        }
    }

    #[test]
    fn test_short_verifier_still_validates() {
        let challenge = s256("verifier123");
        assert!(validate("verifier123", &challenge, "S256"));
        assert!(!validate("verifier124", &challenge, "S256"));
    }

    #[test]
    fn test_plain_method() {
        assert!(validate("verifier123", "verifier123", "plain"));
        assert!(!validate("verifier123", "verifier12", "plain"));
        assert!(!validate("verifier123", "Verifier123", "plain"));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let challenge = s256(RFC_VERIFIER);
        assert!(!validate(RFC_VERIFIER, &challenge, "s256"));
        assert!(!validate(RFC_VERIFIER, &challenge, "S512"));
        assert!(!validate(RFC_VERIFIER, RFC_VERIFIER, ""));
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(
            PkceChallengeMethod::parse("S256").unwrap(),
            PkceChallengeMethod::S256
        );
        assert_eq!(
            PkceChallengeMethod::parse("plain").unwrap(),
            PkceChallengeMethod::Plain
        );
        let err = PkceChallengeMethod::parse("RS256").unwrap_err();
        assert!(matches!(err, PkceError::UnsupportedMethod(_)));
        assert!(err.to_string().contains("RS256"));
    }

    #[test]
    fn test_check_challenge() {
        assert!(
            PkceChallengeMethod::S256
                .check_challenge(RFC_CHALLENGE)
                .is_ok()
        );
        assert!(PkceChallengeMethod::S256.check_challenge("short").is_err());
        assert!(
            PkceChallengeMethod::S256
                .check_challenge("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw+cM")
                .is_err()
        );
        assert!(PkceChallengeMethod::Plain.check_challenge("verifier123").is_ok());
        assert!(PkceChallengeMethod::Plain.check_challenge("").is_err());
        assert!(PkceChallengeMethod::Plain.check_challenge("a b").is_err());
    }

    #[test]
    fn test_verifier_format() {
        assert!(PkceVerifier::new(RFC_VERIFIER.to_string()).is_ok());
        assert!(matches!(
            PkceVerifier::new("short".to_string()),
            Err(PkceError::InvalidVerifierLength(5))
        ));
        let bad = format!("{}!", &RFC_VERIFIER[..43]);
        assert!(matches!(
            PkceVerifier::new(bad),
            Err(PkceError::InvalidVerifierCharacters)
        ));
    }

    #[test]
    fn test_method_serde() {
        assert_eq!(
            serde_json::to_string(&PkceChallengeMethod::Plain).unwrap(),
            "\"plain\""
        );
        assert_eq!(
            serde_json::to_string(&PkceChallengeMethod::S256).unwrap(),
            "\"S256\""
        );
    }
}
