//! Session error types

use crate::protocol::CloseCode;
use crate::transport::TransportError;
use thiserror::Error;

/// Why a session stopped for good
#[derive(Debug, Error)]
pub enum SessionError {
    /// The application asked for privileged intents it is not approved for.
    /// Retrying cannot help.
    #[error("Shard {shard_id:?} is requesting privileged intents that have not been enabled")]
    PrivilegedIntentsRequired { shard_id: Option<u32> },

    /// The gateway closed the connection with a code that rules out reconnecting
    #[error("Gateway closed the connection (code {code:?}): {reason}")]
    ConnectionClosed { code: Option<u16>, reason: String },

    /// The transport failed and reconnecting is disabled
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// Close code behind this error, if the gateway sent one
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::PrivilegedIntentsRequired { .. } => Some(CloseCode::DisallowedIntents.as_u16()),
            Self::ConnectionClosed { code, .. } => *code,
            Self::Transport(_) => None,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
