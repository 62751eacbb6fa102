//! PostgreSQL storage backend for autoauth.
//!
//! Provides persistent storage for:
//!
//! - OAuth clients (`oauth_clients`)
//! - Authorization codes (`oauth_authorization_codes`)
//! - Issued token metadata (`oauth_tokens`)
//! - The revocation index (`oauth_revoked_tokens`)
//! - RSA signing keys (`oauth_signing_keys`)
//! - Session activity (`oauth_session_activity`)
//!
//! Each table has a borrowing store (`CodeStorage<'a>`, ...) that speaks
//! rows, and [`PostgresAuthStorage`] implements the `autoauth` storage traits
//! on top of them, so one value can back every store of a server.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use autoauth::{AuthConfig, AuthorizationServer};
//! use autoauth_postgres::PostgresAuthStorage;
//!
//! let storage = PostgresAuthStorage::connect("postgres://localhost/autoauth").await?;
//! storage.ensure_schema().await?;
//!
//! let server = AuthorizationServer::builder(AuthConfig::default())
//!     .with_storage(Arc::new(storage))
//!     .build()?;
//! ```

pub mod adapters;
pub mod audit;
pub mod client;
pub mod code;
pub mod key;
pub mod revocation;
pub mod schema;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use autoauth::AuthError;
use sqlx_core::pool::{Pool, PoolOptions};
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use audit::ActivityStorage;
pub use client::ClientStorage;
pub use code::CodeStorage;
pub use key::KeyStorage;
pub use revocation::RevocationStorage;
pub use token::TokenStorage;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Resource already exists (conflict).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row holds a value the domain types cannot represent.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl StorageError {
    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a `CorruptRow` error.
    #[must_use]
    pub fn corrupt_row(message: impl Into<String>) -> Self {
        Self::CorruptRow(message.into())
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Database(e) => AuthError::store_unavailable(e.to_string()),
            StorageError::Conflict(message) => AuthError::invalid_request(message),
            StorageError::Serialization(e) => AuthError::internal(e.to_string()),
            StorageError::CorruptRow(message) => AuthError::internal(message),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// PostgreSQL Auth Storage
// =============================================================================

/// Pool settings used by [`PostgresAuthStorage::connect_with`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Maximum number of pooled connections.
    pub pool_size: u32,
    /// How long to wait for a connection before giving up.
    pub connect_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            pool_size: 10,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// PostgreSQL storage backend for every autoauth store.
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct PostgresAuthStorage {
    pool: Arc<PgPool>,
}

impl PostgresAuthStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with(database_url, &ConnectOptions::default()).await
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect_with(database_url: &str, options: &ConnectOptions) -> StorageResult<Self> {
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(options.pool_size)
            .acquire_timeout(options.connect_timeout)
            .connect(database_url)
            .await?;
        tracing::info!(pool_size = options.pool_size, "Connected to PostgreSQL");
        Ok(Self::new(Arc::new(pool)))
    }

    /// Creates the tables and indexes if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        schema::ensure_schema(&self.pool).await
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // -------------------------------------------------------------------------
    // Storage Accessors
    // -------------------------------------------------------------------------

    /// Get client storage operations.
    #[must_use]
    pub fn clients(&self) -> ClientStorage<'_> {
        ClientStorage::new(&self.pool)
    }

    /// Get authorization code storage operations.
    #[must_use]
    pub fn codes(&self) -> CodeStorage<'_> {
        CodeStorage::new(&self.pool)
    }

    /// Get token storage operations.
    #[must_use]
    pub fn tokens(&self) -> TokenStorage<'_> {
        TokenStorage::new(&self.pool)
    }

    /// Get revocation index operations.
    #[must_use]
    pub fn revocations(&self) -> RevocationStorage<'_> {
        RevocationStorage::new(&self.pool)
    }

    /// Get signing key storage operations.
    #[must_use]
    pub fn keys(&self) -> KeyStorage<'_> {
        KeyStorage::new(&self.pool)
    }

    /// Get session activity storage operations.
    #[must_use]
    pub fn activity(&self) -> ActivityStorage<'_> {
        ActivityStorage::new(&self.pool)
    }
}
