pub mod config;
pub mod observability;
pub mod server;

pub use config::{AppConfig, ClientConfig, PostgresStorageConfig, ServerConfig, StorageBackend};
pub use observability::init_tracing;
pub use server::{AutoauthServer, ServerBuilder, build_app, build_auth_server};
