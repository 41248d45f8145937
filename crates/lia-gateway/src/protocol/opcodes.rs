//! Gateway operation codes

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operation code of a gateway frame
///
/// Voice and member-chunk ops are not modelled; a frame carrying one fails
/// to decode and is dropped by the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum OpCode {
    /// Receive: an event was dispatched
    Dispatch = 0,
    /// Both ways: keep-alive, or the server asking for one right now
    Heartbeat = 1,
    /// Send: start a new session
    Identify = 2,
    /// Send: change the client's own presence
    PresenceUpdate = 3,
    /// Send: replay events missed since `seq`
    Resume = 6,
    /// Receive: reconnect and resume
    Reconnect = 7,
    /// Receive: `d` tells whether the session can still be resumed
    InvalidSession = 9,
    /// Receive: first frame of every connection
    Hello = 10,
    /// Receive: the last heartbeat arrived
    HeartbeatAck = 11,
}

/// A numeric op this client does not understand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown op code {0}")]
pub struct UnknownOpCode(pub u8);

impl TryFrom<u8> for OpCode {
    type Error = UnknownOpCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            other => return Err(UnknownOpCode(other)),
        })
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op as u8
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?} ({})", u8::from(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering() {
        assert_eq!(OpCode::try_from(0), Ok(OpCode::Dispatch));
        assert_eq!(OpCode::try_from(6), Ok(OpCode::Resume));
        assert_eq!(OpCode::try_from(9), Ok(OpCode::InvalidSession));
        assert_eq!(OpCode::try_from(4), Err(UnknownOpCode(4)));
        assert_eq!(u8::from(OpCode::HeartbeatAck), 11);
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(serde_json::to_string(&OpCode::Resume).unwrap(), "6");
        assert_eq!(serde_json::from_str::<OpCode>("7").unwrap(), OpCode::Reconnect);

        let err = serde_json::from_str::<OpCode>("5").unwrap_err();
        assert!(err.to_string().contains("unknown op code 5"));
    }

    #[test]
    fn test_display() {
        assert_eq!(OpCode::Hello.to_string(), "Hello (10)");
    }
}
