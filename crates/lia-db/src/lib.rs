//! # lia-db
//!
//! PostgreSQL persistence for the bot via SQLx.
//!
//! - Connection pool management and startup migrations
//! - Presence history, written in batches
//! - The persisted odometer counter
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lia_db::{create_pool, run_migrations, DatabaseConfig, PgPresenceRepository};
//!
//! async fn example(settings: &lia_common::DatabaseSettings) -> Result<(), lia_db::DbError> {
//!     let config = DatabaseConfig::from_settings(settings);
//!     let pool = create_pool(&config).await?;
//!     run_migrations(&pool, &config.migrations_dir).await?;
//!
//!     let presence = PgPresenceRepository::new(pool);
//!     // presence.insert_batch(&records).await?;
//!     Ok(())
//! }
//! ```

pub mod models;
pub mod pool;
pub mod repositories;

pub use models::{Counter, PresenceHistoryModel, PresenceLabel, PresenceRecord};
pub use pool::{create_pool, run_migrations, DatabaseConfig, PgPool};
pub use repositories::{
    CounterRepository, DbError, DbResult, PgCounterRepository, PgPresenceRepository,
    PresenceRepository,
};
