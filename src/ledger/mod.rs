//! Transaction processing engine
//!
//! The pipeline for one request: validation -> per-user serializer ->
//! idempotency gate -> distributed lock -> SERIALIZABLE unit of work ->
//! balance mutation -> record persistence -> commit -> lock release, with
//! transient database faults retried under backoff.

pub mod locks;
pub mod processor;
pub mod repository;
pub mod retry;
pub mod serializer;
pub mod types;
pub mod uow;
pub mod validation;

pub use locks::{LockJanitor, UserLockRepository};
pub use processor::{ProcessOutcome, Processor, TransactionProcessor};
pub use repository::TransactionRepository;
pub use retry::RetryConfig;
pub use serializer::UserSerializer;
pub use types::{Source, TransactionRecord, TxState, TxStatus};
pub use validation::{validate_request, ValidatedRequest};
