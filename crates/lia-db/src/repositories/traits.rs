//! Repository traits

use crate::models::{Counter, PresenceRecord};
use async_trait::async_trait;

use super::DbResult;

/// Presence history storage
#[async_trait]
pub trait PresenceRepository: Send + Sync {
    /// Append all records in one round trip; returns how many were written
    async fn insert_batch(&self, records: &[PresenceRecord]) -> DbResult<u64>;
}

/// Persisted odometer counter
#[async_trait]
pub trait CounterRepository: Send + Sync {
    /// Most recently saved value, or a fresh counter if none was saved yet
    async fn latest(&self) -> DbResult<Counter>;

    async fn save(&self, counter: &Counter) -> DbResult<()>;

    /// Advance and persist
    async fn increment(&self, counter: &mut Counter) -> DbResult<()> {
        counter.increment();
        self.save(counter).await
    }
}
