//! Database error types

use sqlx::migrate::MigrateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration failed: {0}")]
    Migration(#[from] MigrateError),

    #[error("Stored counter value is not base-36: {0:?}")]
    InvalidCounter(String),
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        map_db_error(e)
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Convert SQLx error to DbError
pub fn map_db_error(e: sqlx::Error) -> DbError {
    DbError::Database(e.to_string())
}
