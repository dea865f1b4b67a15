//! Transaction processor - the central algorithm
//!
//! Orchestrates one attempt end to end: idempotency gate, distributed lock,
//! SERIALIZABLE unit of work, balance mutation, record persistence, commit,
//! lock release. The retry policy wraps the lock + transaction portion.
//!
//! Safe to run concurrently across replicas: the lock table fences
//! cross-process access per user, the unique index on the external id is
//! the authoritative duplicate check, and SERIALIZABLE isolation plus the
//! FOR UPDATE row lock make the balance mutation failure-atomic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::account::UserRepository;
use crate::clock::Clock;
use crate::core_types::UserId;
use crate::error::EngineError;

use super::locks::UserLockRepository;
use super::repository::TransactionRepository;
use super::retry::{is_transient, RetryConfig};
use super::types::{TransactionRecord, TxState};
use super::uow::UnitOfWork;
use super::validation::ValidatedRequest;

/// Outcome of processing one transaction request.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// Freshly applied and committed.
    Applied(TransactionRecord),
    /// The external id was already recorded; the stored record is replayed.
    Replayed(TransactionRecord),
    /// Debit rejected; the failed record was persisted for audit and the
    /// balance left untouched.
    InsufficientBalance(TransactionRecord),
}

impl ProcessOutcome {
    pub fn record(&self) -> &TransactionRecord {
        match self {
            ProcessOutcome::Applied(r)
            | ProcessOutcome::Replayed(r)
            | ProcessOutcome::InsufficientBalance(r) => r,
        }
    }
}

/// Seam between the per-user serializer and the processing pipeline.
/// The engine implements it for real; serializer tests substitute a mock.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(
        &self,
        user_id: UserId,
        request: &ValidatedRequest,
    ) -> Result<ProcessOutcome, EngineError>;
}

/// The real processing pipeline over PostgreSQL.
pub struct TransactionProcessor {
    pool: PgPool,
    locks: Arc<UserLockRepository>,
    clock: Arc<dyn Clock>,
    retry: RetryConfig,
    lock_ttl: Duration,
}

impl TransactionProcessor {
    pub fn new(
        pool: PgPool,
        locks: Arc<UserLockRepository>,
        clock: Arc<dyn Clock>,
        retry: RetryConfig,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            pool,
            locks,
            clock,
            retry,
            lock_ttl,
        }
    }

    /// Run one request through the full pipeline with retries.
    async fn process_inner(
        &self,
        user_id: UserId,
        request: &ValidatedRequest,
    ) -> Result<ProcessOutcome, EngineError> {
        // Idempotency gate: answer repeats from the store before taking any
        // lock. Not authoritative - the unique index is.
        if let Some(stored) =
            TransactionRepository::get_by_external_id(&self.pool, &request.external_id).await?
        {
            tracing::info!(
                transaction_id = %request.external_id,
                status = stored.status.as_str(),
                "Repeated transaction id, replaying stored record"
            );
            return Ok(ProcessOutcome::Replayed(stored));
        }

        let mut last_err = None;
        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                let backoff = self.retry.backoff(attempt - 1);
                tracing::info!(
                    transaction_id = %request.external_id,
                    attempt = attempt + 1,
                    max_attempts = self.retry.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    "Retrying transaction processing"
                );
                tokio::time::sleep(backoff).await;
            }

            match self.try_process(user_id, request).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if is_transient(&e) => {
                    tracing::warn!(
                        transaction_id = %request.external_id,
                        error = %e,
                        "Transient database error"
                    );
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let err = last_err
            .unwrap_or_else(|| EngineError::Internal("retry loop exhausted without error".into()));
        tracing::error!(
            transaction_id = %request.external_id,
            attempts = self.retry.max_attempts,
            error = %err,
            "Failed to process transaction after retries"
        );
        Err(err)
    }

    /// One attempt: lock, transact, release. The lock is held for the whole
    /// database transaction and released on every exit path.
    async fn try_process(
        &self,
        user_id: UserId,
        request: &ValidatedRequest,
    ) -> Result<ProcessOutcome, EngineError> {
        // Cross-process fence. UserLocked is not retried here: the per-user
        // serializer already rules out intra-process contention, so a live
        // lock belongs to another replica and surfaces as a conflict.
        self.locks.acquire(user_id, self.lock_ttl).await?;

        let result = self.locked_attempt(user_id, request).await;

        // Release failures are logged, never propagated; the TTL guarantees
        // eventual release.
        if let Err(e) = self.locks.release(user_id).await {
            tracing::error!(user_id, error = %e, "Lock release failed after attempt");
        }

        result
    }

    /// The database transaction itself. Dropping the unit of work on any
    /// error path rolls it back.
    async fn locked_attempt(
        &self,
        user_id: UserId,
        request: &ValidatedRequest,
    ) -> Result<ProcessOutcome, EngineError> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;

        // Re-check under the lock and inside the transaction: another
        // replica may have committed this id between the idempotency gate
        // and our lock acquisition.
        if let Some(stored) =
            TransactionRepository::get_by_external_id(uow.conn(), &request.external_id).await?
        {
            uow.rollback().await;
            return Ok(ProcessOutcome::Replayed(stored));
        }

        let mut record = TransactionRecord::new(
            user_id,
            &request.external_id,
            request.source.as_str(),
            request.state.as_str(),
            &request.amount,
            self.clock.as_ref(),
        )?;

        let mut user = UserRepository::get_for_update(uow.conn(), user_id)
            .await?
            .ok_or(EngineError::UserNotFound)?;

        match record.state {
            TxState::Win => {
                user.apply_credit(record.amount_cents, self.clock.as_ref())?;
            }
            TxState::Lose => {
                if !user.can_debit(record.amount_cents) {
                    // The rejection itself is recorded: persist the failed
                    // record and commit, leaving the balance untouched.
                    record.mark_failed(self.clock.as_ref(), "Insufficient balance");
                    record.id = TransactionRepository::insert(uow.conn(), &record).await?;
                    uow.commit().await?;

                    tracing::warn!(
                        user_id,
                        transaction_id = %record.external_id,
                        amount = %record.amount,
                        balance = %user.formatted_balance(),
                        "Insufficient balance, failed transaction recorded"
                    );
                    return Ok(ProcessOutcome::InsufficientBalance(record));
                }
                user.apply_debit(record.amount_cents, self.clock.as_ref())?;
            }
        }

        record.mark_processed(self.clock.as_ref(), user.balance_cents());
        record.id = TransactionRepository::insert(uow.conn(), &record).await?;

        if !UserRepository::update(uow.conn(), &user).await? {
            // Row disappeared between FOR UPDATE and here; nothing sane to do
            return Err(EngineError::UserNotFound);
        }

        uow.commit().await?;

        tracing::info!(
            user_id,
            transaction_id = %record.external_id,
            state = record.state.as_str(),
            amount = %record.amount,
            result_balance = %user.formatted_balance(),
            tx_count = user.transaction_count,
            "Transaction applied"
        );
        Ok(ProcessOutcome::Applied(record))
    }
}

#[async_trait]
impl Processor for TransactionProcessor {
    async fn process(
        &self,
        user_id: UserId,
        request: &ValidatedRequest,
    ) -> Result<ProcessOutcome, EngineError> {
        self.process_inner(user_id, request).await
    }
}
