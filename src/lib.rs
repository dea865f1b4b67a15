//! Balance Engine
//!
//! Transaction processing engine for monetary win/lose events against a
//! finite set of user accounts. Guarantees exactly-once application per
//! external transaction id, non-negative balances, and strictly sequential
//! per-user ordering, across multiple process replicas sharing one
//! PostgreSQL store.
//!
//! # Modules
//!
//! - [`core_types`] - Fundamental type aliases (UserId, Cents)
//! - [`money`] - Decimal string / integer cents codec
//! - [`clock`] - Time source seam
//! - [`error`] - Error classification with codes and HTTP mapping
//! - [`account`] - User aggregate, repository, connection pool, seeding
//! - [`ledger`] - The engine: serializer, locks, unit of work, processor
//! - [`persistence`] - Schema initialization
//! - [`gateway`] - HTTP surface
//! - [`config`] - YAML + environment configuration
//! - [`logging`] - tracing setup

pub mod account;
pub mod clock;
pub mod config;
pub mod core_types;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod money;
pub mod persistence;

// Convenient re-exports at crate root
pub use account::{Database, User, UserRepository};
pub use clock::{Clock, SystemClock};
pub use config::AppConfig;
pub use core_types::{Cents, UserId};
pub use error::EngineError;
pub use ledger::{
    ProcessOutcome, Processor, RetryConfig, TransactionProcessor, TransactionRecord,
    UserLockRepository, UserSerializer,
};
