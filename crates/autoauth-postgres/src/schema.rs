//! Table definitions.
//!
//! Statements are idempotent and executed one by one, since a prepared
//! statement may only hold a single command.

use sqlx_core::query::query;

use crate::{PgPool, StorageResult};

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS oauth_clients (
        client_id   TEXT PRIMARY KEY,
        resource    JSONB NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS oauth_authorization_codes (
        code                   TEXT PRIMARY KEY,
        user_id                TEXT NOT NULL,
        client_id              TEXT NOT NULL,
        scope                  TEXT NOT NULL,
        redirect_uri           TEXT NOT NULL,
        code_challenge         TEXT,
        code_challenge_method  TEXT,
        issued_at              TIMESTAMPTZ NOT NULL,
        expires_at             TIMESTAMPTZ NOT NULL,
        used                   BOOLEAN NOT NULL DEFAULT FALSE,
        used_at                TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_oauth_codes_expires_at ON oauth_authorization_codes (expires_at)",
    r#"
    CREATE TABLE IF NOT EXISTS oauth_tokens (
        id               UUID PRIMARY KEY,
        user_id          TEXT NOT NULL,
        client_id        TEXT NOT NULL,
        token_type       TEXT NOT NULL,
        token_hash       TEXT NOT NULL,
        scope            TEXT NOT NULL,
        issued_at        TIMESTAMPTZ NOT NULL,
        expires_at       TIMESTAMPTZ NOT NULL,
        revoked          BOOLEAN NOT NULL DEFAULT FALSE,
        revoked_at       TIMESTAMPTZ,
        parent_token_id  UUID
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_oauth_tokens_hash ON oauth_tokens (token_hash)",
    "CREATE INDEX IF NOT EXISTS idx_oauth_tokens_user_id ON oauth_tokens (user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS oauth_revoked_tokens (
        token_hash  TEXT PRIMARY KEY,
        reason      TEXT NOT NULL,
        user_id     TEXT,
        client_id   TEXT,
        revoked_at  TIMESTAMPTZ NOT NULL,
        expires_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_oauth_revoked_expires_at ON oauth_revoked_tokens (expires_at)",
    r#"
    CREATE TABLE IF NOT EXISTS oauth_signing_keys (
        kid              TEXT PRIMARY KEY,
        public_key_pem   TEXT NOT NULL,
        private_key_pem  TEXT NOT NULL,
        algorithm        TEXT NOT NULL,
        created_at       TIMESTAMPTZ NOT NULL,
        expires_at       TIMESTAMPTZ NOT NULL,
        active           BOOLEAN NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS oauth_session_activity (
        id           UUID PRIMARY KEY,
        user_id      TEXT NOT NULL,
        client_id    TEXT,
        activity     TEXT NOT NULL,
        ip_address   TEXT,
        user_agent   TEXT,
        occurred_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_oauth_activity_user ON oauth_session_activity (user_id, occurred_at DESC)",
];

/// Creates every table and index.
///
/// # Errors
///
/// Returns the first failing statement's error.
pub async fn ensure_schema(pool: &PgPool) -> StorageResult<()> {
    for statement in STATEMENTS {
        query(statement).execute(pool).await?;
    }
    tracing::debug!(statements = STATEMENTS.len(), "Schema ensured");
    Ok(())
}
