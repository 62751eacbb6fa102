//! JWT encoding, verification and RSA key material.
//!
//! Tokens are signed with RS256. The key id of the signing key travels in the
//! JWT header (`kid`) so verifiers can pick the right public key from the
//! JWKS, including keys that have since been rotated out of signing.
//!
//! ## Example
//!
//! ```ignore
//! use autoauth::token::jwt::{SigningKeyPair, TokenClaims};
//!
//! let material = SigningKeyPair::generate_rsa_material(2048)?;
//! let key = SigningKeyPair::from_pem("oauth-key-2026-01-01", &material.private_pem, &material.public_pem)?;
//!
//! let token = key.sign(&claims)?;
//! let data = key.decode::<TokenClaims>(&token, "http://epicdev.com")?;
//! ```

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode,
};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthError;
use crate::types::{ScopeSet, TokenType};

/// JWS algorithm used for every token.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// Tag stored alongside keys and published in the JWKS.
pub const SIGNING_ALGORITHM_NAME: &str = "RS256";

/// Failures while signing, verifying or loading key material.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("failed to sign token: {0}")]
    Sign(String),

    /// The token is not a well-formed JWS for this issuer.
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("signature does not verify")]
    BadSignature,

    /// Issuer, subject or another required claim is wrong or missing.
    #[error("claims rejected: {0}")]
    Claims(String),

    /// RSA generation failed or a stored PEM could not be parsed.
    #[error("unusable key material: {0}")]
    KeyMaterial(String),
}

impl JwtError {
    /// `true` when the presented token is at fault rather than this server.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Malformed(_) | Self::BadSignature | Self::Claims(_)
        )
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => Self::Claims(err.to_string()),
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                Self::KeyMaterial(err.to_string())
            }
            _ => Self::Malformed(err.to_string()),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Sign(message) => AuthError::internal(message),
            JwtError::KeyMaterial(message) => AuthError::key_generation(message),
            rejected => AuthError::signature_invalid(rejected.to_string()),
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Claim set shared by access and refresh tokens.
///
/// Access tokens carry `email`, `name` and `jti`; refresh tokens carry
/// `token_id` and `type = "refresh"`. Both carry the registered claims and
/// the space-delimited `scope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user id).
    pub sub: String,

    /// Issuer.
    pub iss: String,

    /// Audience: the client id the token was issued to.
    pub aud: String,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Granted scopes (space-separated).
    #[serde(default)]
    pub scope: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Token id of an access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Token id of a refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,

    /// `"refresh"` on refresh tokens, absent on access tokens.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenClaims {
    /// Builds access token claims.
    #[must_use]
    pub fn access(
        issuer: &str,
        subject: &UserIdentity,
        client_id: &str,
        scope: &ScopeSet,
        token_id: Uuid,
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Self {
        Self {
            sub: subject.user_id.clone(),
            iss: issuer.to_string(),
            aud: client_id.to_string(),
            iat: issued_at.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
            scope: scope.as_string(),
            email: subject.email.clone(),
            name: subject.name.clone(),
            jti: Some(token_id.to_string()),
            token_id: None,
            token_type: None,
        }
    }

    /// Builds refresh token claims.
    #[must_use]
    pub fn refresh(
        issuer: &str,
        user_id: &str,
        client_id: &str,
        scope: &ScopeSet,
        token_id: Uuid,
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Self {
        Self {
            sub: user_id.to_string(),
            iss: issuer.to_string(),
            aud: client_id.to_string(),
            iat: issued_at.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
            scope: scope.as_string(),
            email: None,
            name: None,
            jti: None,
            token_id: Some(token_id.to_string()),
            token_type: Some(TokenType::Refresh.as_str().to_string()),
        }
    }

    /// Access or refresh.
    #[must_use]
    pub fn kind(&self) -> TokenType {
        match self.token_type.as_deref() {
            Some("refresh") => TokenType::Refresh,
            _ => TokenType::Access,
        }
    }

    /// The token id from `jti` or `token_id`.
    #[must_use]
    pub fn id(&self) -> Option<Uuid> {
        self.jti
            .as_deref()
            .or(self.token_id.as_deref())
            .and_then(|id| Uuid::parse_str(id).ok())
    }

    /// Granted scopes.
    #[must_use]
    pub fn scopes(&self) -> ScopeSet {
        ScopeSet::parse(&self.scope)
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.exp).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    /// Returns `true` if the token is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now.unix_timestamp() >= self.exp
    }
}

/// The caller-supplied identity a token is issued for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserIdentity {
    /// Identity with only a user id.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            name: None,
        }
    }

    /// Adds email and display name.
    #[must_use]
    pub fn with_profile(mut self, email: Option<String>, name: Option<String>) -> Self {
        self.email = email;
        self.name = name;
        self
    }
}

// ============================================================================
// JWKS Types
// ============================================================================

/// JSON Web Key Set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

/// Public RSA JSON Web Key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always `"RSA"`.
    pub kty: String,

    /// Key ID.
    pub kid: String,

    /// Key use, always `"sig"`.
    #[serde(rename = "use")]
    pub use_: String,

    /// Algorithm.
    pub alg: String,

    /// RSA modulus (base64url encoded).
    pub n: String,

    /// RSA exponent (base64url encoded).
    pub e: String,
}

// ============================================================================
// Signing Key Pair
// ============================================================================

/// PEM encodings of a freshly generated key pair.
pub struct KeyMaterial {
    /// PKCS#8 private key.
    pub private_pem: String,
    /// SubjectPublicKeyInfo public key.
    pub public_pem: String,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_pem", &self.public_pem)
            .finish_non_exhaustive()
    }
}

/// A parsed RS256 key pair ready for signing and verification.
///
/// The private half is only reachable through [`SigningKeyPair::sign`].
pub struct SigningKeyPair {
    /// Key ID.
    pub kid: String,

    /// Encoding key (private key) for signing.
    encoding_key: EncodingKey,

    /// Decoding key (public key) for verification.
    decoding_key: DecodingKey,

    /// RSA modulus, big-endian.
    n: Vec<u8>,

    /// RSA public exponent, big-endian.
    e: Vec<u8>,
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl SigningKeyPair {
    /// Generates a new RSA key pair with public exponent 65537.
    ///
    /// CPU-heavy; call from a blocking context.
    ///
    /// # Errors
    ///
    /// Returns an error if the entropy source or the RSA backend fails.
    pub fn generate_rsa_material(bits: usize) -> Result<KeyMaterial, JwtError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| JwtError::KeyMaterial(e.to_string()))?;
        let public_key = private_key.to_public_key();

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::KeyMaterial(e.to_string()))?;
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| JwtError::KeyMaterial(e.to_string()))?;

        Ok(KeyMaterial {
            private_pem: private_pem.to_string(),
            public_pem,
        })
    }

    /// Loads a key pair from PEM strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM data is invalid.
    pub fn from_pem(
        kid: impl Into<String>,
        private_pem: &str,
        public_pem: &str,
    ) -> Result<Self, JwtError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::KeyMaterial(e.to_string()))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| JwtError::KeyMaterial(e.to_string()))?;

        // Parse public key to extract n and e
        let public_key = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| JwtError::KeyMaterial(e.to_string()))?;

        Ok(Self {
            kid: kid.into(),
            encoding_key,
            decoding_key,
            n: public_key.n().to_bytes_be(),
            e: public_key.e().to_bytes_be(),
        })
    }

    /// Signs claims, setting `kid` in the header.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let mut header = Header::new(SIGNING_ALGORITHM);
        header.kid = Some(self.kid.clone());

        encode(&header, claims, &self.encoding_key)
            .map_err(|e| JwtError::Sign(e.to_string()))
    }

    /// Verifies the signature and issuer of a token and decodes its claims.
    ///
    /// Expiry is deliberately not checked here; callers compare `exp`
    /// against their own clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature, algorithm, issuer or claim shape is wrong.
    pub fn decode<T: DeserializeOwned>(
        &self,
        token: &str,
        issuer: &str,
    ) -> Result<TokenData<T>, JwtError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_exp = false;
        validation.validate_aud = false; // Audience validated at application layer

        decode(token, &self.decoding_key, &validation).map_err(JwtError::from)
    }

    /// Exports the public key as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: self.kid.clone(),
            use_: "sig".to_string(),
            alg: SIGNING_ALGORITHM_NAME.to_string(),
            n: URL_SAFE_NO_PAD.encode(&self.n),
            e: URL_SAFE_NO_PAD.encode(&self.e),
        }
    }
}

/// Reads the `kid` from a token header without verifying anything.
///
/// # Errors
///
/// Returns `DecodingError` if the header cannot be parsed or has no `kid`.
pub fn unverified_kid(token: &str) -> Result<String, JwtError> {
    let header = jsonwebtoken::decode_header(token)?;
    header
        .kid
        .ok_or_else(|| JwtError::Malformed("token header has no kid".into()))
}

// ============================================================================
// Tests
// ============================================================================
