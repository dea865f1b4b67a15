use std::sync::Arc;

use crate::account::Database;
use crate::ledger::UserSerializer;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub serializer: Arc<UserSerializer>,
}

impl AppState {
    pub fn new(db: Arc<Database>, serializer: Arc<UserSerializer>) -> Self {
        Self { db, serializer }
    }
}
