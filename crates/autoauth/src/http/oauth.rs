//! Handlers for the `/oauth` endpoints.
//!
//! Every handler takes a JSON body and delegates to the
//! [`AuthorizationServer`] façade. Failures render through
//! `AuthError`'s `IntoResponse`.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};

use super::context::ClientContext;
use crate::AuthResult;
use crate::server::{
    AuthorizationServer, GenerateCodeRequest, GenerateCodeResponse, IssueTokensRequest,
    RefreshTokensRequest, RevokeTokenResponse, RevokeUserTokensResponse, TokenRequest,
    ValidateCodeRequest, ValidateCodeResponse, ValidateTokenResponse,
};
use crate::token::TokenPair;

/// `POST /oauth/generate-code`
pub async fn generate_code_handler(
    State(server): State<Arc<AuthorizationServer>>,
    ClientContext(context): ClientContext,
    Json(request): Json<GenerateCodeRequest>,
) -> AuthResult<Json<GenerateCodeResponse>> {
    server.generate_code(request, &context).await.map(Json)
}

/// `POST /oauth/validate-code`
///
/// Consumes the code on success. Any failure is a 400.
pub async fn validate_code_handler(
    State(server): State<Arc<AuthorizationServer>>,
    ClientContext(context): ClientContext,
    Json(request): Json<ValidateCodeRequest>,
) -> AuthResult<Json<ValidateCodeResponse>> {
    server.validate_code(request, &context).await.map(Json)
}

/// `POST /oauth/issue-tokens`
pub async fn issue_tokens_handler(
    State(server): State<Arc<AuthorizationServer>>,
    ClientContext(context): ClientContext,
    Json(request): Json<IssueTokensRequest>,
) -> AuthResult<Json<TokenPair>> {
    server.issue_tokens(request, &context).await.map(Json)
}

/// `POST /oauth/refresh-tokens`
pub async fn refresh_tokens_handler(
    State(server): State<Arc<AuthorizationServer>>,
    ClientContext(context): ClientContext,
    Json(request): Json<RefreshTokensRequest>,
) -> AuthResult<Json<TokenPair>> {
    server.refresh_tokens(request, &context).await.map(Json)
}

/// `POST /oauth/validate-token`
///
/// Always 200 unless a store is down; the body says whether the token is valid.
pub async fn validate_token_handler(
    State(server): State<Arc<AuthorizationServer>>,
    Json(request): Json<TokenRequest>,
) -> AuthResult<Json<ValidateTokenResponse>> {
    server.validate_token(request).await.map(Json)
}

/// `POST /oauth/revoke-token`
pub async fn revoke_token_handler(
    State(server): State<Arc<AuthorizationServer>>,
    ClientContext(context): ClientContext,
    Json(request): Json<TokenRequest>,
) -> AuthResult<Json<RevokeTokenResponse>> {
    server.revoke_token(request, &context).await.map(Json)
}

/// `POST /oauth/users/{user_id}/revoke`
pub async fn revoke_user_tokens_handler(
    State(server): State<Arc<AuthorizationServer>>,
    Path(user_id): Path<String>,
    ClientContext(context): ClientContext,
) -> AuthResult<Json<RevokeUserTokensResponse>> {
    server.revoke_user_tokens(&user_id, &context).await.map(Json)
}
