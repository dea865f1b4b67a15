//! HTTP handlers for the balance and transaction endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::account::UserRepository;
use crate::core_types::UserId;
use crate::error::EngineError;
use crate::ledger::{validate_request, ProcessOutcome, TxStatus};

use super::state::AppState;
use super::types::{
    ApiError, BalanceResponse, ErrorBody, HealthResponse, TransactionRequestDto,
    TransactionResponse,
};

/// Parse and check the path user id. Non-numeric or zero ids are client
/// errors, not lookups.
fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    match raw.parse::<UserId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::new(
            axum::http::StatusCode::BAD_REQUEST,
            EngineError::InvalidUserId.code(),
            "Invalid user ID format",
        )),
    }
}

/// GET /user/{user_id}/balance
#[utoipa::path(
    get,
    path = "/user/{user_id}/balance",
    params(("user_id" = u64, Path, description = "User id")),
    responses(
        (status = 200, body = BalanceResponse),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody),
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;

    let user = UserRepository::get_by_id(state.db.pool(), user_id)
        .await
        .map_err(EngineError::from)?
        .ok_or(EngineError::UserNotFound)?;

    Ok(Json(BalanceResponse {
        user_id,
        balance: user.formatted_balance(),
    }))
}

/// POST /user/{user_id}/transaction
#[utoipa::path(
    post,
    path = "/user/{user_id}/transaction",
    params(
        ("user_id" = u64, Path, description = "User id"),
        ("Source-Type" = String, Header, description = "game | server | payment"),
    ),
    request_body = TransactionRequestDto,
    responses(
        (status = 200, body = TransactionResponse),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 409, body = ErrorBody),
    )
)]
pub async fn post_transaction(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<TransactionRequestDto>, JsonRejection>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;

    let source = headers
        .get("Source-Type")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing required header: Source-Type"))?;

    let Json(req) = body
        .map_err(|rejection| ApiError::bad_request(format!("Invalid request body: {}", rejection)))?;

    let validated = validate_request(user_id, &req.transaction_id, source, &req.state, &req.amount)
        .map_err(ApiError::from)?;

    // Existence pre-check keeps unknown users out of the serializer; the
    // processor re-discovers deletion-at-mutation-time on its own.
    if !UserRepository::exists(state.db.pool(), user_id)
        .await
        .map_err(EngineError::from)?
    {
        return Err(EngineError::UserNotFound.into());
    }

    let outcome = state.serializer.submit(user_id, validated).await?;

    match outcome {
        ProcessOutcome::Applied(record) => {
            let result_balance = record.result_balance().unwrap_or_default();
            Ok(Json(TransactionResponse {
                transaction_id: record.external_id,
                user_id,
                success: true,
                result_balance,
            }))
        }

        // Repeats observe the stored outcome: completed records replay the
        // success response, a previously failed record is a duplicate of a
        // hard failure and maps to conflict.
        ProcessOutcome::Replayed(record) => match record.status {
            TxStatus::Completed => {
                let result_balance = record.result_balance().unwrap_or_default();
                let user_id = record.user_id;
                Ok(Json(TransactionResponse {
                    transaction_id: record.external_id,
                    user_id,
                    success: true,
                    result_balance,
                }))
            }
            TxStatus::Failed => Err(ApiError::new(
                EngineError::DuplicateTransaction.status(),
                EngineError::DuplicateTransaction.code(),
                record
                    .error_message
                    .unwrap_or_else(|| EngineError::DuplicateTransaction.to_string()),
            )),
            // Rows are only ever stored terminal; a pending row means a
            // concurrent writer we lost the race to.
            TxStatus::Pending => Err(EngineError::DuplicateTransaction.into()),
        },

        ProcessOutcome::InsufficientBalance(record) => Err(ApiError::new(
            EngineError::InsufficientBalance.status(),
            EngineError::InsufficientBalance.code(),
            record
                .error_message
                .unwrap_or_else(|| "Insufficient balance".to_string()),
        )),
    }
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, body = HealthResponse),
        (status = 500, body = ErrorBody),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Health check failed");
        ApiError::internal()
    })?;
    Ok(Json(HealthResponse { status: "ok" }))
}
