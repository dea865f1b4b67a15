//! User account domain: the balance aggregate, its repository and the
//! database pool wrapper.

pub mod db;
pub mod models;
pub mod repository;
pub mod seed;

pub use db::Database;
pub use models::User;
pub use repository::UserRepository;
