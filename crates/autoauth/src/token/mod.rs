//! Token generation, validation, and management.
//!
//! This module provides:
//!
//! - RS256 JWT encoding and decoding
//! - Signing key creation, rotation and JWKS publication
//! - Access and refresh token issuance with rotation and revocation

pub mod jwt;
pub mod keys;
pub mod service;

pub use jwt::{Jwk, Jwks, JwtError, KeyMaterial, SigningKeyPair, TokenClaims, UserIdentity};
pub use keys::KeyManager;
pub use service::{IssuedToken, Rotation, TokenManager, TokenPair};
