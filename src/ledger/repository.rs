//! Transaction record persistence
//!
//! The UNIQUE index on `transaction_id` is the authoritative duplicate
//! check; the insert surfaces a violation as `DuplicateTransaction` and
//! never retries it.

use sqlx::postgres::{PgExecutor, PgRow};
use sqlx::Row;

use super::types::{Source, TransactionRecord, TxState, TxStatus};
use crate::core_types::UserId;
use crate::error::EngineError;

/// Repository for transaction rows
pub struct TransactionRepository;

impl TransactionRepository {
    /// Insert a record in its current (usually terminal) status.
    ///
    /// Returns the surrogate id.
    ///
    /// # Errors
    /// - `DuplicateTransaction` on a `transaction_id` uniqueness violation
    pub async fn insert<'e, E>(
        executor: E,
        record: &TransactionRecord,
    ) -> Result<i64, EngineError>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO transactions
                (user_id, transaction_id, source_type, state, amount, amount_in_cents,
                 created_at, processed_at, result_balance, status, error_message)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(record.user_id as i64)
        .bind(&record.external_id)
        .bind(record.source.as_str())
        .bind(record.state.as_str())
        .bind(&record.amount)
        .bind(record.amount_cents)
        .bind(record.created_at)
        .bind(record.processed_at)
        .bind(record.result_balance_cents)
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .fetch_one(executor)
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tracing::warn!(
                    transaction_id = %record.external_id,
                    user_id = record.user_id,
                    "Duplicate transaction detected on insert"
                );
                Err(EngineError::DuplicateTransaction)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get a record by its external transaction id
    pub async fn get_by_external_id<'e, E>(
        executor: E,
        external_id: &str,
    ) -> Result<Option<TransactionRecord>, EngineError>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, transaction_id, source_type, state, amount,
                   amount_in_cents, created_at, processed_at, result_balance,
                   status, error_message
            FROM transactions
            WHERE transaction_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(executor)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    /// Whether a record with this external id exists
    pub async fn exists<'e, E>(executor: E, external_id: &str) -> Result<bool, EngineError>
    where
        E: PgExecutor<'e>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE transaction_id = $1)",
        )
        .bind(external_id)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

}

/// Convert a database row into a TransactionRecord
fn row_to_record(row: &PgRow) -> Result<TransactionRecord, EngineError> {
    let source = Source::parse(row.get::<String, _>("source_type").as_str())?;
    let state = TxState::parse(row.get::<String, _>("state").as_str())?;
    let status = TxStatus::parse(row.get::<String, _>("status").as_str())?;

    Ok(TransactionRecord {
        id: row.get("id"),
        user_id: row.get::<i64, _>("user_id") as UserId,
        external_id: row.get("transaction_id"),
        source,
        state,
        amount: row.get("amount"),
        amount_cents: row.get("amount_in_cents"),
        created_at: row.get("created_at"),
        processed_at: row.get("processed_at"),
        result_balance_cents: row.get("result_balance"),
        status,
        error_message: row.get("error_message"),
    })
}
