//! HTTP error responses.
//!
//! `AuthError` renders as an OAuth error body:
//!
//! ```json
//! { "error": "invalid_grant", "error_description": "Authorization code already used" }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_for(&self);

        if status.is_server_error() {
            tracing::error!(error = %self, category = %self.category(), "Request failed");
        } else {
            tracing::debug!(error = %self, category = %self.category(), "Request rejected");
        }

        let body = json!({
            "error": self.oauth_error_code(),
            "error_description": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

/// 400 for caller mistakes, 503 when a store is down, 500 otherwise.
fn status_for(error: &AuthError) -> StatusCode {
    if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else if error.is_store_unavailable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&AuthError::AlreadyUsed), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&AuthError::Revoked), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&AuthError::client_mismatch("redirect_uri")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AuthError::store_unavailable("down")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&AuthError::key_generation("entropy")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_response_status() {
        let response = AuthError::expired("authorization code").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AuthError::store_unavailable("connection refused").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
