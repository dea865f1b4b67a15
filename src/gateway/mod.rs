//! HTTP gateway
//!
//! Thin shell over the engine: routing, DTO marshaling, panic catching and
//! request tracing. All domain decisions live behind the serializer.

pub mod handlers;
pub mod state;
pub mod types;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use state::AppState;
use types::ErrorBody;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_balance,
        handlers::post_transaction,
        handlers::health_check,
    ),
    components(schemas(
        types::TransactionRequestDto,
        types::TransactionResponse,
        types::BalanceResponse,
        types::HealthResponse,
        types::ErrorBody,
    ))
)]
pub struct ApiDoc;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/user/{user_id}/balance", get(handlers::get_balance))
        .route("/user/{user_id}/transaction", post(handlers::post_transaction))
        .route("/health", get(handlers::health_check))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the shutdown future resolves, then stop accepting and drain
/// in-flight requests.
pub async fn run_server(
    addr: &str,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

/// A panic anywhere in the request path is caught here, logged, and
/// reported as a plain 500.
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = detail, "Panic caught at HTTP boundary");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(ErrorBody {
            code: 5000,
            message: "Internal server error".to_string(),
        }),
    )
        .into_response()
}
