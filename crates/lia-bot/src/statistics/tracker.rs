//! Last-seen status per user
//!
//! The gateway sends one `PRESENCE_UPDATE` per guild a user shares with the
//! bot, so a single status change usually arrives several times in a row.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lia_gateway::UserStatus;
use std::time::Duration;
use tokio::time::Instant;

/// Default window in which repeated updates for one user are dropped
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
struct Seen {
    status: UserStatus,
    recorded_at: Option<Instant>,
}

/// Decides which presence updates are worth recording
#[derive(Debug)]
pub struct PresenceTracker {
    seen: DashMap<i64, Seen>,
    dedup_window: Duration,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW)
    }
}

impl PresenceTracker {
    pub fn new(dedup_window: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            dedup_window,
        }
    }

    /// Remember a user's current status without recording it
    ///
    /// Used for the presences delivered with `GUILD_CREATE`.
    pub fn seed(&self, user_id: i64, status: UserStatus) {
        self.seen
            .entry(user_id)
            .and_modify(|seen| seen.status = status)
            .or_insert(Seen {
                status,
                recorded_at: None,
            });
    }

    /// Feed one update; returns whether it should be recorded.
    ///
    /// The last seen status is updated even when the dedup window drops
    /// the update. A user seen for the first time is always recorded.
    pub fn observe(&self, user_id: i64, status: UserStatus, now: Instant) -> bool {
        match self.seen.entry(user_id) {
            Entry::Vacant(slot) => {
                slot.insert(Seen {
                    status,
                    recorded_at: Some(now),
                });
                true
            }
            Entry::Occupied(mut slot) => {
                let seen = slot.get_mut();
                if seen.status == status {
                    return false;
                }
                seen.status = status;

                let recent = seen
                    .recorded_at
                    .is_some_and(|at| now.saturating_duration_since(at) < self.dedup_window);
                if recent {
                    return false;
                }

                seen.recorded_at = Some(now);
                true
            }
        }
    }

    /// Last status seen for a user
    pub fn status_of(&self, user_id: i64) -> Option<UserStatus> {
        self.seen.get(&user_id).map(|seen| seen.status)
    }

    /// Number of users with a known status
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
