//! Gateway DTOs and the error response type
//!
//! Wire names are camelCase; error bodies are always `{code, message}`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core_types::UserId;
use crate::error::EngineError;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequestDto {
    /// "win" or "lose"
    #[schema(example = "win")]
    pub state: String,
    /// Decimal amount with at most two fractional digits
    #[schema(example = "10.15")]
    pub amount: String,
    /// Client-chosen id used for idempotent retry
    #[schema(example = "txn-0001")]
    pub transaction_id: String,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    #[schema(example = 1)]
    pub user_id: UserId,
    /// Balance with exactly two fractional digits
    #[schema(example = "110.15")]
    pub balance: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub transaction_id: String,
    pub user_id: UserId,
    pub success: bool,
    #[schema(example = "110.15")]
    pub result_balance: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

// ============================================================================
// ApiError
// ============================================================================

/// Error reply: HTTP status plus the `{code, message}` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = 4001)]
    pub code: i32,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 400 with the invalid-request code
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::from(EngineError::InvalidRequest(message.into()))
    }

    /// 500 with a generic body; detail stays in the logs
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            5000,
            "Internal server error",
        )
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = err.status();
        let code = err.code();
        // Do not leak database detail to clients
        let message = match &err {
            EngineError::Database(_) | EngineError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        Self::new(status, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(ErrorBody {
            code: self.code,
            message: self.message,
        });
        (self.status, body).into_response()
    }
}
