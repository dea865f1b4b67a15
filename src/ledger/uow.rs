//! Unit of work over a SERIALIZABLE database transaction
//!
//! Wraps a sqlx transaction whose isolation level is raised immediately
//! after BEGIN. Repositories are executor-generic, so statements issued
//! through `conn()` all run on this transaction.
//!
//! Dropping an uncommitted unit rolls the transaction back; that covers
//! every exit path, including panics, without an explicit defer.

use sqlx::postgres::PgConnection;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::EngineError;

pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork {
    /// Begin a database transaction at SERIALIZABLE isolation.
    pub async fn begin(pool: &PgPool) -> Result<Self, EngineError> {
        let mut tx = pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        tracing::debug!("Began SERIALIZABLE database transaction");
        Ok(Self { tx })
    }

    /// The transaction connection, for repository calls.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }

    /// Commit. Without a successful commit the caller must not assume
    /// durability.
    pub async fn commit(self) -> Result<(), EngineError> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Explicit rollback. Errors are logged and swallowed; the transaction
    /// is gone either way.
    pub async fn rollback(self) {
        if let Err(e) = self.tx.rollback().await {
            tracing::warn!(error = %e, "Rollback failed (transaction already closed?)");
        }
    }
}
