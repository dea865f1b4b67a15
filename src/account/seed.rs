//! Default user seeding
//!
//! The system operates on a finite, pre-provisioned set of accounts. At
//! startup the default users are created if absent; existing rows are left
//! untouched so balances survive restarts.

use sqlx::PgPool;

use super::models::User;
use super::repository::UserRepository;
use crate::clock::Clock;
use crate::core_types::UserId;
use crate::error::EngineError;

/// Default user IDs and their initial balances.
const DEFAULT_USERS: &[(UserId, &str)] = &[(1, "100.00"), (2, "200.00"), (3, "300.00")];

/// Create the default users with predefined balances, skipping any that
/// already exist.
pub async fn create_default_users(pool: &PgPool, clock: &dyn Clock) -> Result<(), EngineError> {
    for &(user_id, balance) in DEFAULT_USERS {
        if UserRepository::exists(pool, user_id).await? {
            continue;
        }

        let user = User::new(user_id, balance, clock)?;
        match UserRepository::create(pool, &user).await {
            Ok(()) => {}
            // A replica racing us on the same insert is fine
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tracing::debug!(user_id, "Default user already created by another replica");
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(count = DEFAULT_USERS.len(), "Default users ensured");
    Ok(())
}
