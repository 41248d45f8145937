//! Connection status shared with observers

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Opening the transport and waiting for Hello
    Connecting,
    /// Identify sent, waiting for READY
    Identifying,
    /// Resume sent, waiting for RESUMED
    Resuming,
    Connected,
    /// Shutting down on request
    Closing,
    /// Stopped on a fatal error
    Error,
}

/// Atomic wrapper for connection state
#[derive(Debug)]
struct AtomicConnectionState(AtomicU32);

impl AtomicConnectionState {
    const fn new(state: ConnectionState) -> Self {
        Self(AtomicU32::new(state as u32))
    }

    fn load(&self) -> ConnectionState {
        match self.0.load(Ordering::SeqCst) {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Identifying,
            3 => ConnectionState::Resuming,
            4 => ConnectionState::Connected,
            5 => ConnectionState::Closing,
            _ => ConnectionState::Error,
        }
    }

    fn store(&self, state: ConnectionState) {
        self.0.store(state as u32, Ordering::SeqCst);
    }
}

/// Cloneable read handle on a session's connection state
#[derive(Debug, Clone)]
pub struct SessionStatus(Arc<AtomicConnectionState>);

impl SessionStatus {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicConnectionState::new(
            ConnectionState::Disconnected,
        )))
    }

    #[must_use]
    pub fn get(&self) -> ConnectionState {
        self.0.load()
    }

    pub(crate) fn set(&self, state: ConnectionState) {
        self.0.store(state);
    }
}
