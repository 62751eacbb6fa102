//! Storage traits for codes, tokens, keys and clients.
//!
//! This module defines storage interfaces for:
//!
//! - OAuth client registrations (read-mostly, owned by an external registry)
//! - Authorization codes, with an atomic mark-used
//! - Issued token metadata and the revocation index
//! - RSA signing keys, with a conditional insert for race-tolerant creation
//! - Session activity audit events
//!
//! Backend connectivity failures must surface as
//! [`AuthError::StoreUnavailable`](crate::AuthError::StoreUnavailable).
//!
//! # Implementations
//!
//! - [`memory::MemoryStorage`] - in-process, `dashmap` backed
//! - `autoauth-postgres` - PostgreSQL storage backend

pub mod audit;
pub mod client;
pub mod code;
pub mod key;
pub mod memory;
pub mod revocation;
pub mod token;

pub use audit::AuditStorage;
pub use client::ClientStorage;
pub use code::CodeStorage;
pub use key::KeyStorage;
pub use memory::MemoryStorage;
pub use revocation::RevocationIndex;
pub use token::TokenStorage;
