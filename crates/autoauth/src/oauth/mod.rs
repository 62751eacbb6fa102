//! OAuth 2.0 authorization code flow.
//!
//! - [`pkce`] - proof-key validation (S256, plain)
//! - [`code`] - single-use authorization code manager

pub mod code;
pub mod pkce;

pub use code::{AuthorizationCodeManager, CodeRequest, IssuedCode, RedeemedCode};
pub use pkce::{PkceChallenge, PkceChallengeMethod, PkceError, PkceVerifier};
