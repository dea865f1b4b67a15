//! Database connection management

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;

/// PostgreSQL database connection pool
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    ///
    /// Every session gets a statement_timeout so a wedged query cannot hold
    /// a row lock longer than the distributed lock's TTL.
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let statement_timeout_ms = (cfg.query_timeout_secs * 1000).to_string();
        let options = PgConnectOptions::from_str(&cfg.url)?
            .options([("statement_timeout", statement_timeout_ms.as_str())]);

        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        tracing::info!(
            max_connections = cfg.max_connections,
            "PostgreSQL connection pool established"
        );
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
