//! Transport seam
//!
//! The session only needs to send text, receive frames, and close with a
//! code. `WebSocketConnector` is the production implementation; tests drive
//! the session through scripted ones.

mod websocket;

pub use websocket::{WebSocketConnector, WebSocketTransport};

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// A frame received from the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One JSON-encoded gateway message
    Text(String),
    /// The peer closed the connection. `code` is `None` when the close
    /// frame carried no status.
    Close { code: Option<u16>, reason: String },
}

/// An open connection to the gateway
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next frame from the peer. Must be cancel-safe: the session races it
    /// against the heartbeat timer.
    async fn recv(&mut self) -> Result<Frame, TransportError>;

    /// Send a close frame with `code`. Closing an already closed transport
    /// is not an error.
    async fn close(&mut self, code: u16) -> Result<(), TransportError>;
}

/// Opens transports
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport + 'static;

    async fn connect(&self) -> Result<Self::Transport, TransportError>;
}

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Handshake rejected with HTTP status {0}")]
    Http(u16),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Connection closed without a close frame")]
    ConnectionClosed,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Whether the peer reset the connection (ECONNRESET, WSAECONNRESET)
    #[must_use]
    pub fn is_connection_reset(&self) -> bool {
        match self {
            Self::Io(e) => {
                e.kind() == io::ErrorKind::ConnectionReset
                    || matches!(e.raw_os_error(), Some(54 | 104 | 10054))
            }
            _ => false,
        }
    }
}
