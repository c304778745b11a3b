//! Gatehouse Database Layer
//!
//! Account and greeting persistence for Gatehouse, backed by SQLite
//! through sqlx. Accounts carry the credential hash, status flags and
//! granted roles consumed by the authentication provider.

pub mod error;
pub mod models;
pub mod repository;
pub mod utils;

pub use error::DbError;
pub use models::*;
pub use repository::Database;

/// Re-export sqlx types for convenience
pub use sqlx::SqlitePool;
