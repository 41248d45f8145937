//! # lia-gateway
//!
//! Client side of the real-time gateway: the wire protocol, the handshake
//! payloads, and a session that keeps the connection alive across drops by
//! resuming, re-identifying, or backing off as the close reason dictates.

pub mod backoff;
pub mod error;
pub mod identify;
pub mod protocol;
pub mod session;
pub mod transport;

mod socket;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use error::{SessionError, SessionResult};
pub use identify::{HandshakeBuilder, IdentifyPayloadBuilder};
pub use protocol::{
    Activity, CloseCode, GatewayMessage, Intents, OpCode, PresencePayload, UserStatus,
};
pub use session::{
    ConnectionState, DispatchEvent, HandshakeMode, ReconnectingSession, SessionConfig,
    SessionEnd, SessionEvent, SessionState, SessionStatus, ShutdownHandle,
};
pub use transport::{Connector, Frame, Transport, TransportError, WebSocketConnector};
