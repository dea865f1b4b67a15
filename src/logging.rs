//! Logging setup
//!
//! Two sinks: ANSI text on stdout for operators, plus a rolling file whose
//! format follows `use_json`. The returned guard owns the non-blocking file
//! writer and must live as long as the process, or buffered lines are lost
//! at exit.

use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let (file_writer, guard) = tracing_appender::non_blocking(rolling_appender(config));

    let registry = tracing_subscriber::registry()
        .with(engine_filter(config))
        .with(fmt::layer().with_target(false).with_ansi(true));

    if config.use_json {
        registry
            .with(fmt::layer().json().with_writer(file_writer).with_ansi(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(file_writer)
                    .with_ansi(false),
            )
            .init();
    }

    guard
}

fn rolling_appender(config: &AppConfig) -> RollingFileAppender {
    match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    }
}

/// RUST_LOG wins when set. Otherwise the configured level applies, with
/// sqlx's per-statement logging capped at warn so the engine's own
/// transaction logs stay readable; trace lifts the cap for debugging the
/// lock and retry SQL itself.
fn engine_filter(config: &AppConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.log_level.eq_ignore_ascii_case("trace") {
            EnvFilter::new(config.log_level.clone())
        } else {
            EnvFilter::new(format!("{},sqlx=warn", config.log_level))
        }
    })
}
