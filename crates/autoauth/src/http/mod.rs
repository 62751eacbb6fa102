//! Axum HTTP handlers for the authorization server.
//!
//! # Routes
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /oauth/generate-code` | [`generate_code_handler`] |
//! | `POST /oauth/validate-code` | [`validate_code_handler`] |
//! | `POST /oauth/issue-tokens` | [`issue_tokens_handler`] |
//! | `POST /oauth/refresh-tokens` | [`refresh_tokens_handler`] |
//! | `POST /oauth/validate-token` | [`validate_token_handler`] |
//! | `POST /oauth/revoke-token` | [`revoke_token_handler`] |
//! | `POST /oauth/users/{user_id}/revoke` | [`revoke_user_tokens_handler`] |
//! | `GET /.well-known/jwks.json` | [`jwks_handler`] |
//! | `GET /health` | [`health_handler`] |

pub mod context;
pub mod error;
pub mod jwks;
pub mod oauth;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

pub use context::{ClientContext, request_context};
pub use jwks::jwks_handler;
pub use oauth::{
    generate_code_handler, issue_tokens_handler, refresh_tokens_handler,
    revoke_token_handler, revoke_user_tokens_handler, validate_code_handler,
    validate_token_handler,
};

use crate::server::AuthorizationServer;

/// Builds the router for every endpoint, bound to `server`.
pub fn router(server: Arc<AuthorizationServer>) -> Router {
    let oauth = Router::new()
        .route("/generate-code", post(generate_code_handler))
        .route("/validate-code", post(validate_code_handler))
        .route("/issue-tokens", post(issue_tokens_handler))
        .route("/refresh-tokens", post(refresh_tokens_handler))
        .route("/validate-token", post(validate_token_handler))
        .route("/revoke-token", post(revoke_token_handler))
        .route("/users/{user_id}/revoke", post(revoke_user_tokens_handler));

    Router::new()
        .nest("/oauth", oauth)
        .route("/.well-known/jwks.json", get(jwks_handler))
        .route("/health", get(health_handler))
        .with_state(server)
}

/// `GET /health`
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
