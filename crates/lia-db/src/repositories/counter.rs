//! PostgreSQL implementation of CounterRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::models::Counter;

use super::error::map_db_error;
use super::{CounterRepository, DbError, DbResult};

/// Every saved value is a new row; the latest row is the current value
#[derive(Clone)]
pub struct PgCounterRepository {
    pool: PgPool,
}

impl PgCounterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterRepository for PgCounterRepository {
    #[instrument(skip(self))]
    async fn latest(&self) -> DbResult<Counter> {
        let stored = sqlx::query_scalar::<_, String>(
            "SELECT current_count FROM counter ORDER BY counter_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        match stored {
            Some(value) => Counter::from_value(value.clone()).ok_or(DbError::InvalidCounter(value)),
            None => Ok(Counter::default()),
        }
    }

    #[instrument(skip(self))]
    async fn save(&self, counter: &Counter) -> DbResult<()> {
        sqlx::query("INSERT INTO counter (current_count) VALUES ($1)")
            .bind(counter.current())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(())
    }
}
