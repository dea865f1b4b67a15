//! Transaction record and its lifecycle
//!
//! A record is created `Pending`, then moves exactly once to `Completed` or
//! `Failed` inside the same database transaction that mutates the balance.
//! Terminal records are never mutated again.

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::core_types::{Cents, UserId};
use crate::error::EngineError;
use crate::money;

// ============================================================================
// Enums
// ============================================================================

/// Origin of a transaction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Game,
    Server,
    Payment,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Game => "game",
            Source::Server => "server",
            Source::Payment => "payment",
        }
    }

    pub fn parse(value: &str) -> Result<Self, EngineError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "game" => Ok(Source::Game),
            "server" => Ok(Source::Server),
            "payment" => Ok(Source::Payment),
            other => Err(EngineError::InvalidSource(other.to_string())),
        }
    }
}

/// Balance effect requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Credits the balance
    Win,
    /// Debits the balance
    Lose,
}

impl TxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxState::Win => "win",
            TxState::Lose => "lose",
        }
    }

    pub fn parse(value: &str) -> Result<Self, EngineError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "win" => Ok(TxState::Win),
            "lose" => Ok(TxState::Lose),
            other => Err(EngineError::InvalidState(other.to_string())),
        }
    }
}

/// Lifecycle status of a stored transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, EngineError> {
        match value {
            "pending" => Ok(TxStatus::Pending),
            "completed" => Ok(TxStatus::Completed),
            "failed" => Ok(TxStatus::Failed),
            other => Err(EngineError::Internal(format!(
                "invalid stored status: {}",
                other
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Completed | TxStatus::Failed)
    }
}

// ============================================================================
// Transaction record
// ============================================================================

/// A validated transaction with its lifecycle state.
///
/// Not thread-safe; single-writer semantics come from the serializer and
/// the database transaction around it.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    /// Surrogate key assigned by the store (0 until persisted)
    pub id: i64,
    pub user_id: UserId,
    /// Client-chosen external id, unique across the system
    pub external_id: String,
    pub source: Source,
    pub state: TxState,
    /// Amount exactly as the client sent it
    pub amount: String,
    pub amount_cents: Cents,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub result_balance_cents: Option<Cents>,
    pub status: TxStatus,
    pub error_message: Option<String>,
}

impl TransactionRecord {
    /// Construct a pending record from raw request fields, validating all of
    /// them.
    pub fn new(
        user_id: UserId,
        external_id: &str,
        source: &str,
        state: &str,
        amount: &str,
        clock: &dyn Clock,
    ) -> Result<Self, EngineError> {
        if external_id.is_empty() {
            return Err(EngineError::InvalidTransactionId);
        }
        let source = Source::parse(source)?;
        let state = TxState::parse(state)?;
        let amount_cents = money::parse_amount(amount)?;

        Ok(Self {
            id: 0,
            user_id,
            external_id: external_id.to_string(),
            source,
            state,
            amount: amount.to_string(),
            amount_cents,
            created_at: clock.now(),
            processed_at: None,
            result_balance_cents: None,
            status: TxStatus::Pending,
            error_message: None,
        })
    }

    /// Pending -> Completed with the post-apply balance.
    pub fn mark_processed(&mut self, clock: &dyn Clock, result_balance_cents: Cents) {
        debug_assert_eq!(self.status, TxStatus::Pending, "transition from terminal");
        self.processed_at = Some(clock.now());
        self.result_balance_cents = Some(result_balance_cents);
        self.status = TxStatus::Completed;
    }

    /// Pending -> Failed with a reason.
    pub fn mark_failed(&mut self, clock: &dyn Clock, message: &str) {
        debug_assert_eq!(self.status, TxStatus::Pending, "transition from terminal");
        self.processed_at = Some(clock.now());
        self.error_message = Some(message.to_string());
        self.status = TxStatus::Failed;
    }

    pub fn is_credit(&self) -> bool {
        self.state == TxState::Win
    }

    pub fn is_debit(&self) -> bool {
        self.state == TxState::Lose
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Result balance as a two-decimal string, for completed records.
    pub fn result_balance(&self) -> Option<String> {
        self.result_balance_cents.map(money::format_cents)
    }
}
