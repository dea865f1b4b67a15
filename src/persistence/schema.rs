//! PostgreSQL schema initialization
//!
//! Idempotent DDL run once at startup. A failure here aborts the process
//! before the gateway binds.

use anyhow::{Context, Result};
use sqlx::PgPool;

/// Initialize the schema for the balance store
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Initializing PostgreSQL schema...");

    sqlx::query(CREATE_USERS_TABLE)
        .execute(pool)
        .await
        .context("Failed to create users table")?;

    sqlx::query(CREATE_TRANSACTIONS_TABLE)
        .execute(pool)
        .await
        .context("Failed to create transactions table")?;

    sqlx::query(CREATE_USER_LOCKS_TABLE)
        .execute(pool)
        .await
        .context("Failed to create user_locks table")?;

    for idx in [
        CREATE_TRANSACTIONS_USER_INDEX,
        CREATE_USER_LOCKS_EXPIRY_INDEX,
    ] {
        sqlx::query(idx)
            .execute(pool)
            .await
            .context("Failed to create index")?;
    }

    tracing::info!("PostgreSQL schema initialized successfully");
    Ok(())
}

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id                BIGINT PRIMARY KEY,
    balance           BIGINT NOT NULL CHECK (balance >= 0),
    transaction_count BIGINT NOT NULL DEFAULT 0,
    created_at        TIMESTAMPTZ NOT NULL,
    updated_at        TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id              BIGSERIAL PRIMARY KEY,
    user_id         BIGINT NOT NULL,
    transaction_id  TEXT NOT NULL UNIQUE,
    source_type     TEXT NOT NULL,
    state           TEXT NOT NULL,
    amount          TEXT NOT NULL,
    amount_in_cents BIGINT NOT NULL CHECK (amount_in_cents >= 0),
    created_at      TIMESTAMPTZ NOT NULL,
    processed_at    TIMESTAMPTZ,
    result_balance  BIGINT,
    status          TEXT NOT NULL,
    error_message   TEXT
)
"#;

const CREATE_USER_LOCKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_locks (
    user_id    BIGINT PRIMARY KEY,
    locked_at  TIMESTAMPTZ NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_TRANSACTIONS_USER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_transactions_user_id ON transactions (user_id)";

const CREATE_USER_LOCKS_EXPIRY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_user_locks_expires_at ON user_locks (expires_at)";
