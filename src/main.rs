use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use balance_engine::account::{seed, Database};
use balance_engine::clock::SystemClock;
use balance_engine::config::AppConfig;
use balance_engine::gateway::{self, state::AppState};
use balance_engine::ledger::{
    LockJanitor, RetryConfig, TransactionProcessor, UserLockRepository, UserSerializer,
};
use balance_engine::{logging, persistence};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("BAL_ENV").unwrap_or_else(|_| "development".to_string());
    let config = AppConfig::load(&env).context("Configuration loading failed")?;

    let _log_guard = logging::init_logging(&config);
    tracing::info!(environment = %config.environment, "Starting balance engine");

    let clock = Arc::new(SystemClock);

    // Database must be reachable and migrated before the gateway binds.
    let db = Arc::new(
        Database::connect(&config.database)
            .await
            .context("Failed to connect to database")?,
    );
    persistence::schema::init_schema(db.pool())
        .await
        .context("Migration failed")?;
    seed::create_default_users(db.pool(), clock.as_ref())
        .await
        .context("Default user seeding failed")?;

    // Engine wiring: locks -> processor -> per-user serializer.
    let locks = Arc::new(UserLockRepository::new(db.pool().clone(), clock.clone()));
    let retry = RetryConfig {
        max_attempts: config.transaction.max_retries,
        ..RetryConfig::default()
    };
    let processor = Arc::new(TransactionProcessor::new(
        db.pool().clone(),
        locks.clone(),
        clock.clone(),
        retry,
        Duration::from_millis(config.transaction.lock_ttl_ms),
    ));
    let serializer = UserSerializer::new(processor, config.transaction.queue_size);

    let janitor = LockJanitor::new(
        locks.clone(),
        Duration::from_secs(config.transaction.lock_cleanup_interval_secs),
    )
    .spawn();

    let state = AppState::new(db.clone(), serializer.clone());
    let addr = format!("{}:{}", config.server.host, config.server.port);

    gateway::run_server(&addr, state, shutdown_signal())
        .await
        .context("Gateway server failed")?;

    // The listener has stopped accepting; drain queued work, then stop the
    // background tasks and release pooled connections.
    tracing::info!("Shutting down...");
    serializer.shutdown().await;
    janitor.abort();
    db.close().await;

    tracing::info!("Exited gracefully");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
