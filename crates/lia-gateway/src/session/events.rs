//! Session lifecycle notifications

use serde_json::Value;
use std::time::Duration;

/// Broadcast to every subscriber of a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A connection attempt is starting
    Connecting { resume: bool },
    /// READY: a new session was established
    Connected { session_id: String },
    /// RESUMED: the previous session continues
    Resumed,
    /// The current connection is gone
    Disconnected,
    /// Waiting before the next attempt
    Reconnecting { attempt: u32, delay: Duration },
    /// Every dispatch, READY and RESUMED included
    Dispatch(DispatchEvent),
}

/// A dispatched gateway event
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchEvent {
    /// Event name, e.g. `PRESENCE_UPDATE`
    pub name: String,
    pub sequence: Option<u64>,
    pub data: Value,
}
