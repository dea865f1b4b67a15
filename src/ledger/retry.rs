//! Retry policy for transient database faults
//!
//! Serializable stores abort some transactions under contention
//! (serialization failures, deadlocks); connection-level hiccups produce
//! resets and timeouts. Both classes are safe to retry because nothing was
//! committed. Duplicate-key violations are NOT transient: they are true
//! duplicates and must surface.

use std::time::Duration;

use rand::Rng;

use crate::error::EngineError;

/// Configuration for retrying the lock + transaction attempt
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_interval: Duration,
    pub max_interval: Duration,
    /// Fraction of the backoff added as random jitter (0.0 - 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_interval: Duration::from_millis(5),
            max_interval: Duration::from_secs(2),
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    /// Backoff before retry attempt `attempt` (0-based):
    /// `min(base * 2^attempt, max) * (1 + jitter * U[0,1])`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_interval
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = exp.min(self.max_interval);

        if self.jitter_factor <= 0.0 {
            return capped;
        }
        let jitter = capped.mul_f64(self.jitter_factor * rand::thread_rng().gen::<f64>());
        capped + jitter
    }
}

/// Whether an error is a transient database fault worth retrying.
pub fn is_transient(err: &EngineError) -> bool {
    let db_err = match err {
        EngineError::Database(e) => e,
        _ => return false,
    };

    match db_err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(e) => {
            // SQLSTATE 40001 = serialization_failure, 40P01 = deadlock_detected
            if let Some(code) = e.code() {
                if code == "40001" || code == "40P01" {
                    return true;
                }
            }
            message_is_transient(&e.to_string())
        }
        other => message_is_transient(&other.to_string()),
    }
}

fn message_is_transient(message: &str) -> bool {
    let msg = message.to_lowercase();
    msg.contains("deadlock")
        || msg.contains("serialization failure")
        || msg.contains("could not serialize access")
        || msg.contains("lock wait timeout")
        || msg.contains("connection reset")
        || msg.contains("connection refused")
        || msg.contains("broken pipe")
        || msg.contains("server closed")
        || msg.contains("timeout")
        || msg.contains("eof")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_interval, Duration::from_millis(5));
        assert_eq!(config.max_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        };
        assert_eq!(config.backoff(0), Duration::from_millis(5));
        assert_eq!(config.backoff(1), Duration::from_millis(10));
        assert_eq!(config.backoff(2), Duration::from_millis(20));
        // 5ms * 2^20 would be far past the cap
        assert_eq!(config.backoff(20), Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let config = RetryConfig::default();
        for attempt in 0..6 {
            let base = RetryConfig {
                jitter_factor: 0.0,
                ..config.clone()
            }
            .backoff(attempt);
            for _ in 0..20 {
                let jittered = config.backoff(attempt);
                assert!(jittered >= base);
                assert!(jittered <= base.mul_f64(1.2) + Duration::from_nanos(1));
            }
        }
    }

    #[test]
    fn test_transient_message_classification() {
        for msg in [
            "deadlock detected",
            "ERROR: could not serialize access due to concurrent update",
            "serialization failure",
            "Lock wait timeout exceeded",
            "connection reset by peer",
            "connection refused",
            "broken pipe",
            "server closed the connection unexpectedly",
            "statement timeout",
            "unexpected EOF",
        ] {
            assert!(message_is_transient(msg), "should be transient: {}", msg);
        }

        for msg in [
            "duplicate key value violates unique constraint",
            "null value in column",
            "syntax error",
        ] {
            assert!(!message_is_transient(msg), "should not be transient: {}", msg);
        }
    }

    #[test]
    fn test_non_database_errors_are_not_transient() {
        assert!(!is_transient(&EngineError::InsufficientBalance));
        assert!(!is_transient(&EngineError::DuplicateTransaction));
        assert!(!is_transient(&EngineError::UserLocked));
        assert!(!is_transient(&EngineError::UserNotFound));
    }

    #[test]
    fn test_io_errors_are_transient() {
        let err = EngineError::Database(sqlx::Error::PoolTimedOut);
        assert!(is_transient(&err));

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(is_transient(&EngineError::Database(sqlx::Error::Io(io))));
    }
}
