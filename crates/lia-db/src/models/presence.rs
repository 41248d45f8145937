//! Presence history models

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Status label as stored in `presence_history.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresenceLabel {
    Online,
    Idle,
    Dnd,
    /// Offline, invisible, or anything unrecognised
    Offline,
}

impl PresenceLabel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Idle => "Idle",
            Self::Dnd => "DND",
            Self::Offline => "Offline",
        }
    }
}

impl std::fmt::Display for PresenceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PresenceLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Online" => Ok(Self::Online),
            "Idle" => Ok(Self::Idle),
            "DND" => Ok(Self::Dnd),
            "Offline" => Ok(Self::Offline),
            _ => Err(format!("Invalid presence label: {s}")),
        }
    }
}

/// One status change waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    pub user_id: i64,
    pub label: PresenceLabel,
    pub changed_at: DateTime<Utc>,
}

/// Database model for the presence_history table
#[derive(Debug, Clone, FromRow)]
pub struct PresenceHistoryModel {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub changed_at: DateTime<Utc>,
}

impl PresenceHistoryModel {
    /// Stored label, `None` if the row holds something unexpected
    #[must_use]
    pub fn label(&self) -> Option<PresenceLabel> {
        self.status.parse().ok()
    }
}
