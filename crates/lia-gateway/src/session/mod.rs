//! Session management
//!
//! `ReconnectingSession` owns the resumable state and decides after every
//! lost connection whether to resume, re-identify, back off, or stop.

mod events;
mod runner;
mod state;
mod status;

pub use events::{DispatchEvent, SessionEvent};
pub use runner::{ReconnectingSession, SessionConfig, SessionEnd, ShutdownHandle};
pub use state::{HandshakeMode, SessionState};
pub use status::{ConnectionState, SessionStatus};
