//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// User ID - externally assigned, non-zero, immutable after assignment.
///
/// # Usage:
/// - Primary key for user accounts
/// - Key of the per-user serializer map and the lock table
pub type UserId = u64;

/// Monetary amount in integer cents.
///
/// All arithmetic on balances and transaction amounts happens on this
/// type; decimal strings exist only at the API boundary.
pub type Cents = i64;
