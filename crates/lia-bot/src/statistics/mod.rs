//! Presence statistics
//!
//! Tracks each user's status and writes every change to `presence_history`.

mod recorder;
mod tracker;

pub use recorder::{label_for, parse_presence, PresenceRecorder};
pub use tracker::{PresenceTracker, DEFAULT_DEDUP_WINDOW};
