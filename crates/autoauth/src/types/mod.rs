//! Domain types shared by the managers and the storage backends.

pub mod client;
pub mod code;
pub mod key;
pub mod scope;
pub mod token;

pub use client::{ClientValidationError, OAuthClient};
pub use code::AuthorizationCode;
pub use key::SigningKeyRecord;
pub use scope::ScopeSet;
pub use token::{RevocationEntry, RevocationReason, TokenRecord, TokenType, hash_token};
