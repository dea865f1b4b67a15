//! Syntactic validation of inbound transaction requests
//!
//! Runs before anything touches the database or the serializer, so
//! malformed requests are rejected without consuming a queue slot.

use crate::core_types::UserId;
use crate::error::EngineError;
use crate::money;

use super::types::{Source, TxState};

/// A transaction request that has passed syntactic validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub external_id: String,
    pub source: Source,
    pub state: TxState,
    pub amount: String,
}

/// Validate the raw request fields.
///
/// # Errors
/// - `InvalidUserId` for a zero user id
/// - `InvalidTransactionId` for an empty external id
/// - `InvalidState` / `InvalidSource` for unknown enum values
/// - money codec errors for a malformed amount
pub fn validate_request(
    user_id: UserId,
    external_id: &str,
    source: &str,
    state: &str,
    amount: &str,
) -> Result<ValidatedRequest, EngineError> {
    if user_id == 0 {
        return Err(EngineError::InvalidUserId);
    }
    if external_id.is_empty() {
        return Err(EngineError::InvalidTransactionId);
    }

    let state = TxState::parse(state)?;
    let source = Source::parse(source)?;
    money::parse_amount(amount)?;

    Ok(ValidatedRequest {
        external_id: external_id.to_string(),
        source,
        state,
        amount: amount.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let req = validate_request(1, "tx-1", "game", "win", "10.15").unwrap();
        assert_eq!(req.external_id, "tx-1");
        assert_eq!(req.source, Source::Game);
        assert_eq!(req.state, TxState::Win);
        assert_eq!(req.amount, "10.15");
    }

    #[test]
    fn test_rejects_zero_user_id() {
        assert!(matches!(
            validate_request(0, "tx-1", "game", "win", "1.00").unwrap_err(),
            EngineError::InvalidUserId
        ));
    }

    #[test]
    fn test_rejects_empty_transaction_id() {
        assert!(matches!(
            validate_request(1, "", "game", "win", "1.00").unwrap_err(),
            EngineError::InvalidTransactionId
        ));
    }

    #[test]
    fn test_rejects_unknown_state_and_source() {
        assert!(matches!(
            validate_request(1, "t", "game", "tie", "1.00").unwrap_err(),
            EngineError::InvalidState(_)
        ));
        assert!(matches!(
            validate_request(1, "t", "lottery", "win", "1.00").unwrap_err(),
            EngineError::InvalidSource(_)
        ));
    }

    #[test]
    fn test_rejects_bad_amounts() {
        assert!(matches!(
            validate_request(1, "t", "game", "win", "10.999").unwrap_err(),
            EngineError::InvalidAmount(_)
        ));
        assert!(matches!(
            validate_request(1, "t", "game", "win", "-1").unwrap_err(),
            EngineError::InvalidAmount(_)
        ));
        assert!(matches!(
            validate_request(1, "t", "game", "win", "99999999999999999999").unwrap_err(),
            EngineError::AmountOverflow
        ));
    }
}
