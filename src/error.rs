//! Engine error classification
//!
//! One enum covers every failure the request path can produce, with the
//! numeric code and HTTP status each kind maps to. The processor recovers
//! transient database errors internally; everything else surfaces to the
//! gateway unchanged.

use crate::money::MoneyError;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("User ID must be positive")]
    InvalidUserId,

    #[error("Transaction ID cannot be empty")]
    InvalidTransactionId,

    #[error("Invalid transaction state: {0}")]
    InvalidState(String),

    #[error("Invalid source type: {0}")]
    InvalidSource(String),

    #[error("Invalid amount format: {0}")]
    InvalidAmount(String),

    #[error("Amount too large, would overflow")]
    AmountOverflow,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("User not found")]
    UserNotFound,

    #[error("Transaction with this ID already exists")]
    DuplicateTransaction,

    #[error("User is locked by another operation")]
    UserLocked,

    #[error("Shutting down")]
    ShuttingDown,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Standardized numeric code carried in error response bodies.
    pub fn code(&self) -> i32 {
        match self {
            EngineError::InsufficientBalance => 4001,
            EngineError::InvalidAmount(_) | EngineError::AmountOverflow => 4002,
            EngineError::InvalidUserId => 4003,
            EngineError::DuplicateTransaction => 4004,
            EngineError::InvalidRequest(_)
            | EngineError::InvalidTransactionId
            | EngineError::InvalidState(_)
            | EngineError::InvalidSource(_) => 4005,
            EngineError::UserNotFound => 4040,
            EngineError::UserLocked => 4230,
            EngineError::ShuttingDown => 5030,
            EngineError::Database(_) | EngineError::Internal(_) => 5000,
        }
    }

    /// HTTP status the gateway responds with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::InvalidRequest(_)
            | EngineError::InvalidUserId
            | EngineError::InvalidTransactionId
            | EngineError::InvalidState(_)
            | EngineError::InvalidSource(_)
            | EngineError::InvalidAmount(_)
            | EngineError::AmountOverflow
            | EngineError::InsufficientBalance => StatusCode::BAD_REQUEST,
            EngineError::UserNotFound => StatusCode::NOT_FOUND,
            EngineError::DuplicateTransaction | EngineError::UserLocked => StatusCode::CONFLICT,
            EngineError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Database(_) | EngineError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<MoneyError> for EngineError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::Overflow => EngineError::AmountOverflow,
            other => EngineError::InvalidAmount(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(EngineError::InsufficientBalance.code(), 4001);
        assert_eq!(EngineError::AmountOverflow.code(), 4002);
        assert_eq!(EngineError::InvalidUserId.code(), 4003);
        assert_eq!(EngineError::DuplicateTransaction.code(), 4004);
        assert_eq!(EngineError::UserNotFound.code(), 4040);
        assert_eq!(EngineError::UserLocked.code(), 4230);
        assert_eq!(EngineError::Internal("bug".into()).code(), 5000);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            EngineError::InsufficientBalance.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(EngineError::UserNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            EngineError::DuplicateTransaction.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(EngineError::UserLocked.status(), StatusCode::CONFLICT);
        assert_eq!(
            EngineError::ShuttingDown.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_money_error_conversion() {
        let err: EngineError = MoneyError::Overflow.into();
        assert!(matches!(err, EngineError::AmountOverflow));

        let err: EngineError = MoneyError::PrecisionOverflow.into();
        assert!(matches!(err, EngineError::InvalidAmount(_)));

        let err: EngineError = MoneyError::Negative.into();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }
}
