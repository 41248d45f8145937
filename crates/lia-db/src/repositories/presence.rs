//! PostgreSQL implementation of PresenceRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use crate::models::{PresenceHistoryModel, PresenceRecord};

use super::error::map_db_error;
use super::{DbResult, PresenceRepository};

/// PostgreSQL implementation of PresenceRepository
#[derive(Clone)]
pub struct PgPresenceRepository {
    pool: PgPool,
}

impl PgPresenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Latest changes for one user, newest first
    #[instrument(skip(self))]
    pub async fn recent_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> DbResult<Vec<PresenceHistoryModel>> {
        let limit = limit.clamp(1, 100);

        sqlx::query_as::<_, PresenceHistoryModel>(
            r#"
            SELECT id, user_id, status, changed_at
            FROM presence_history
            WHERE user_id = $1
            ORDER BY changed_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }
}

#[async_trait]
impl PresenceRepository for PgPresenceRepository {
    #[instrument(skip(self, records), fields(batch_size = records.len()))]
    async fn insert_batch(&self, records: &[PresenceRecord]) -> DbResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let user_ids: Vec<i64> = records.iter().map(|r| r.user_id).collect();
        let statuses: Vec<&str> = records.iter().map(|r| r.label.as_str()).collect();
        let changed_at: Vec<DateTime<Utc>> = records.iter().map(|r| r.changed_at).collect();

        sqlx::query(
            r#"
            SELECT insert_into_presence_history(r.user_id, r.status, r.changed_at)
            FROM UNNEST($1::BIGINT[], $2::TEXT[], $3::TIMESTAMPTZ[])
                AS r(user_id, status, changed_at)
            "#,
        )
        .bind(&user_ids)
        .bind(&statuses)
        .bind(&changed_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(records.len() as u64)
    }
}
