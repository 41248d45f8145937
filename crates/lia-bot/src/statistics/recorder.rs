//! Presence history recorder
//!
//! Turns gateway dispatches into `PresenceRecord`s and batches them into the
//! database through a cascade.

use super::tracker::PresenceTracker;
use chrono::Utc;
use lia_cascade::{Cascade, CascadeConfig, CascadeResult, CascadeStats, DrainHandle};
use lia_db::{PresenceLabel, PresenceRecord, PresenceRepository};
use lia_gateway::{DispatchEvent, UserStatus};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;

/// Stored label for a gateway status
pub fn label_for(status: UserStatus) -> PresenceLabel {
    match status {
        UserStatus::Online => PresenceLabel::Online,
        UserStatus::Idle => PresenceLabel::Idle,
        UserStatus::Dnd => PresenceLabel::Dnd,
        UserStatus::Invisible | UserStatus::Offline => PresenceLabel::Offline,
    }
}

/// `(user_id, status)` of a presence object
///
/// Snowflakes arrive as strings; numeric ids are accepted too. Unknown
/// status strings count as offline.
pub fn parse_presence(data: &Value) -> Option<(i64, UserStatus)> {
    let id = data.get("user")?.get("id")?;
    let user_id = match id {
        Value::String(raw) => raw.parse().ok()?,
        other => other.as_i64()?,
    };

    let status = data
        .get("status")
        .and_then(Value::as_str)
        .map_or(UserStatus::Offline, |raw| {
            raw.parse().unwrap_or(UserStatus::Offline)
        });

    Some((user_id, status))
}

/// Records presence changes seen on the gateway
pub struct PresenceRecorder {
    tracker: PresenceTracker,
    cascade: Cascade<PresenceRecord>,
}

impl PresenceRecorder {
    /// Build a stopped recorder writing through `repository`
    ///
    /// Write failures are logged and the batch is dropped.
    pub fn new(
        repository: Arc<dyn PresenceRepository>,
        config: CascadeConfig,
        tracker: PresenceTracker,
    ) -> CascadeResult<Self> {
        let cascade = Cascade::new(config, move |batch: Vec<PresenceRecord>| {
            let repository = Arc::clone(&repository);
            async move {
                match repository.insert_batch(&batch).await {
                    Ok(written) => {
                        tracing::debug!(batch_size = batch.len(), written, "Presence batch stored");
                    }
                    Err(e) => {
                        tracing::error!(
                            batch_size = batch.len(),
                            error = %e,
                            "Failed to store presence batch"
                        );
                    }
                }
            }
        })?;

        Ok(Self { tracker, cascade })
    }

    pub fn start(&self) -> CascadeResult<()> {
        self.cascade.start()
    }

    /// Stop batching; see `Cascade::stop`
    pub fn stop(&self, wait: bool) -> DrainHandle {
        self.cascade.stop(wait)
    }

    pub fn stats(&self) -> Arc<CascadeStats> {
        self.cascade.stats()
    }

    pub fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }

    /// Feed one dispatch; everything but guild and presence events is ignored
    pub fn handle(&self, event: &DispatchEvent) {
        match event.name.as_str() {
            "GUILD_CREATE" => self.seed_guild(&event.data),
            "PRESENCE_UPDATE" => self.record_update(&event.data),
            _ => {}
        }
    }

    fn seed_guild(&self, data: &Value) {
        let Some(presences) = data.get("presences").and_then(Value::as_array) else {
            return;
        };

        for (user_id, status) in presences.iter().filter_map(parse_presence) {
            self.tracker.seed(user_id, status);
        }
        tracing::debug!(
            presences = presences.len(),
            tracked = self.tracker.len(),
            "Seeded presences from guild"
        );
    }

    fn record_update(&self, data: &Value) {
        let Some((user_id, status)) = parse_presence(data) else {
            tracing::debug!("PRESENCE_UPDATE without a usable user id");
            return;
        };

        if !self.tracker.observe(user_id, status, Instant::now()) {
            return;
        }

        let record = PresenceRecord {
            user_id,
            label: label_for(status),
            changed_at: Utc::now(),
        };
        tracing::trace!(user_id, status = %record.label, "Presence change");

        if let Err(e) = self.cascade.put(record) {
            tracing::warn!(user_id, error = %e, "Presence change dropped");
        }
    }
}

impl std::fmt::Debug for PresenceRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceRecorder")
            .field("tracked", &self.tracker.len())
            .field("cascade", &self.cascade)
            .finish()
    }
}
