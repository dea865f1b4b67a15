//! User aggregate
//!
//! Holds the balance in integer cents plus the transaction counter. The
//! balance field is PRIVATE: every mutation goes through `apply_credit` /
//! `apply_debit`, which enforce the non-negative invariant with checked
//! arithmetic.
//!
//! The aggregate is not thread-safe. Single-writer semantics are provided
//! around it by the per-user serializer, the distributed lock, and the
//! row-exclusive database lock.

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::core_types::{Cents, UserId};
use crate::error::EngineError;
use crate::money;

/// A user account with a monetary balance.
///
/// # Invariants (enforced by private fields):
/// - `balance >= 0` after every mutation
/// - `transaction_count` increments by exactly 1 per applied transaction
/// - No overflow (checked arithmetic, errors are explicit)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    balance: Cents,
    pub transaction_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user from a decimal balance string.
    ///
    /// # Errors
    /// - `InvalidUserId` if `id` is zero
    /// - money codec errors for a malformed balance
    pub fn new(id: UserId, initial_balance: &str, clock: &dyn Clock) -> Result<Self, EngineError> {
        if id == 0 {
            return Err(EngineError::InvalidUserId);
        }
        let balance = money::parse_amount(initial_balance)?;
        let now = clock.now();
        Ok(Self {
            id,
            balance,
            transaction_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rehydrate a user from persisted state. Trusted path: the store
    /// enforces the non-negative constraint.
    pub fn from_parts(
        id: UserId,
        balance: Cents,
        transaction_count: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            balance,
            transaction_count,
            created_at,
            updated_at,
        }
    }

    /// Current balance in cents (read-only).
    #[inline]
    pub fn balance_cents(&self) -> Cents {
        self.balance
    }

    /// Balance as a two-decimal string.
    pub fn formatted_balance(&self) -> String {
        money::format_cents(self.balance)
    }

    /// Whether a debit of `amount` cents would keep the balance non-negative.
    #[inline]
    pub fn can_debit(&self, amount: Cents) -> bool {
        self.balance >= amount
    }

    /// Credit the balance (win).
    ///
    /// # Errors
    /// - `AmountOverflow` if the balance would exceed `i64` cents
    pub fn apply_credit(&mut self, amount: Cents, clock: &dyn Clock) -> Result<(), EngineError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(EngineError::AmountOverflow)?;
        self.transaction_count += 1;
        self.updated_at = clock.now();
        Ok(())
    }

    /// Debit the balance (lose).
    ///
    /// # Errors
    /// - `InsufficientBalance` if `balance < amount`; the aggregate is left
    ///   untouched
    pub fn apply_debit(&mut self, amount: Cents, clock: &dyn Clock) -> Result<(), EngineError> {
        if self.balance < amount {
            return Err(EngineError::InsufficientBalance);
        }
        self.balance -= amount;
        self.transaction_count += 1;
        self.updated_at = clock.now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::fixed_clock;

    #[test]
    fn test_new_user() {
        let clock = fixed_clock();
        let user = User::new(1, "100.00", &clock).unwrap();
        assert_eq!(user.balance_cents(), 10_000);
        assert_eq!(user.transaction_count, 0);
        assert_eq!(user.formatted_balance(), "100.00");
    }

    #[test]
    fn test_new_user_rejects_zero_id() {
        let clock = fixed_clock();
        assert!(matches!(
            User::new(0, "100.00", &clock).unwrap_err(),
            EngineError::InvalidUserId
        ));
    }

    #[test]
    fn test_new_user_rejects_bad_balance() {
        let clock = fixed_clock();
        assert!(User::new(1, "1.234", &clock).is_err());
        assert!(User::new(1, "-5", &clock).is_err());
    }

    #[test]
    fn test_apply_credit() {
        let clock = fixed_clock();
        let mut user = User::new(1, "100.00", &clock).unwrap();
        user.apply_credit(1015, &clock).unwrap();
        assert_eq!(user.balance_cents(), 11_015);
        assert_eq!(user.transaction_count, 1);
    }

    #[test]
    fn test_apply_credit_zero_amount() {
        // A zero win is legal: counter moves, balance does not.
        let clock = fixed_clock();
        let mut user = User::new(1, "100.00", &clock).unwrap();
        user.apply_credit(0, &clock).unwrap();
        assert_eq!(user.balance_cents(), 10_000);
        assert_eq!(user.transaction_count, 1);
    }

    #[test]
    fn test_apply_credit_overflow() {
        let clock = fixed_clock();
        let mut user = User::from_parts(1, i64::MAX - 50, 7, clock.now(), clock.now());
        assert!(matches!(
            user.apply_credit(100, &clock).unwrap_err(),
            EngineError::AmountOverflow
        ));
        // No partial mutation
        assert_eq!(user.balance_cents(), i64::MAX - 50);
        assert_eq!(user.transaction_count, 7);
    }

    #[test]
    fn test_apply_debit() {
        let clock = fixed_clock();
        let mut user = User::new(1, "100.00", &clock).unwrap();
        user.apply_debit(525, &clock).unwrap();
        assert_eq!(user.formatted_balance(), "94.75");
        assert_eq!(user.transaction_count, 1);
    }

    #[test]
    fn test_apply_debit_insufficient() {
        let clock = fixed_clock();
        let mut user = User::new(1, "10.00", &clock).unwrap();
        assert!(matches!(
            user.apply_debit(2000, &clock).unwrap_err(),
            EngineError::InsufficientBalance
        ));
        // Unchanged
        assert_eq!(user.balance_cents(), 1000);
        assert_eq!(user.transaction_count, 0);
    }

    #[test]
    fn test_apply_debit_to_exactly_zero() {
        let clock = fixed_clock();
        let mut user = User::new(1, "10.00", &clock).unwrap();
        user.apply_debit(1000, &clock).unwrap();
        assert_eq!(user.balance_cents(), 0);
        assert!(user.can_debit(0));
        assert!(!user.can_debit(1));
    }

    #[test]
    fn test_can_debit() {
        let clock = fixed_clock();
        let user = User::new(1, "5.00", &clock).unwrap();
        assert!(user.can_debit(500));
        assert!(!user.can_debit(501));
    }
}
