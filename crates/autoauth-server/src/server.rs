use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use autoauth::{AuthorizationServer, MemoryStorage};
use autoauth_postgres::{ConnectOptions, PostgresAuthStorage};
use axum::Router;
use tokio::task::JoinHandle;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::{AppConfig, StorageBackend};

/// Connects the configured storage backend, assembles the authorization
/// server and seeds the static client registrations.
pub async fn build_auth_server(cfg: &AppConfig) -> anyhow::Result<Arc<AuthorizationServer>> {
    let builder = AuthorizationServer::builder(cfg.auth.clone());

    let builder = match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; state is lost on restart");
            builder.with_storage(Arc::new(MemoryStorage::new()))
        }
        StorageBackend::Postgres => {
            let pg = &cfg.storage.postgres;
            let options = ConnectOptions {
                pool_size: pg.pool_size,
                connect_timeout: pg.connect_timeout(),
            };
            let storage = PostgresAuthStorage::connect_with(&pg.url, &options)
                .await
                .context("connecting to PostgreSQL")?;
            storage
                .ensure_schema()
                .await
                .context("creating PostgreSQL schema")?;
            builder.with_storage(Arc::new(storage))
        }
    };

    let server = builder.build().context("building authorization server")?;

    for client in &cfg.clients {
        server
            .register_client(&client.to_client())
            .await
            .with_context(|| format!("registering client {}", client.client_id))?;
        tracing::info!(client_id = %client.client_id, "Client registered from configuration");
    }

    Ok(Arc::new(server))
}

pub fn build_app(cfg: &AppConfig, server: Arc<AuthorizationServer>) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    autoauth::http::router(server)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct AutoauthServer {
    addr: SocketAddr,
    app: Router,
    maintenance: Option<JoinHandle<()>>,
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Builds the server and starts the maintenance task if enabled.
    ///
    /// The first signing key is created here so that the first token request
    /// does not pay for RSA generation.
    pub async fn build(self) -> anyhow::Result<AutoauthServer> {
        let server = build_auth_server(&self.config).await?;

        let key = server
            .keys()
            .get_active_key()
            .await
            .context("loading signing key")?;
        tracing::info!(kid = %key.kid, "Signing key ready");

        let maintenance = if self.config.auth.maintenance.enabled {
            let interval = self.config.auth.maintenance.interval;
            tracing::info!(interval_secs = interval.as_secs(), "Maintenance sweep scheduled");
            Some(server.maintenance().start(server.clock().clone(), interval))
        } else {
            None
        };

        Ok(AutoauthServer {
            addr: self.config.addr(),
            app: build_app(&self.config, server),
            maintenance,
        })
    }
}

impl AutoauthServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let result = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        if let Some(handle) = self.maintenance {
            handle.abort();
        }
        result?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
