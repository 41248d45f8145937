//! Gateway message envelope

use super::{HelloPayload, IdentifyPayload, OpCode, ReadyPayload, ResumePayload};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every frame on the gateway is one of these, JSON encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: OpCode,

    /// Always present on the wire, `null` when there is no payload
    #[serde(default)]
    pub d: Option<Value>,

    /// Sequence number (dispatches only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event name (dispatches only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayMessage {
    fn with_payload(op: OpCode, d: Option<Value>) -> Self {
        Self {
            op,
            d,
            s: None,
            t: None,
        }
    }

    /// Heartbeat carrying the last sequence seen, or `null` before any
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::with_payload(OpCode::Heartbeat, last_sequence.map(Value::from))
    }

    pub fn identify(payload: &IdentifyPayload) -> Result<Self, serde_json::Error> {
        Ok(Self::with_payload(OpCode::Identify, Some(serde_json::to_value(payload)?)))
    }

    pub fn resume(payload: &ResumePayload) -> Result<Self, serde_json::Error> {
        Ok(Self::with_payload(OpCode::Resume, Some(serde_json::to_value(payload)?)))
    }

    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::with_payload(
            OpCode::Hello,
            Some(serde_json::json!({ "heartbeat_interval": heartbeat_interval })),
        )
    }

    #[must_use]
    pub fn dispatch(event: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            s: Some(sequence),
            t: Some(event.into()),
            ..Self::with_payload(OpCode::Dispatch, Some(data))
        }
    }

    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::with_payload(OpCode::HeartbeatAck, None)
    }

    #[must_use]
    pub fn reconnect() -> Self {
        Self::with_payload(OpCode::Reconnect, None)
    }

    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::with_payload(OpCode::InvalidSession, Some(Value::Bool(resumable)))
    }

    /// Decode `d` if this frame carries `op`
    fn payload<P: DeserializeOwned>(&self, op: OpCode) -> Option<P> {
        if self.op != op {
            return None;
        }
        P::deserialize(self.d.as_ref()?).ok()
    }

    pub fn as_hello(&self) -> Option<HelloPayload> {
        self.payload(OpCode::Hello)
    }

    /// READY dispatch payload
    pub fn as_ready(&self) -> Option<ReadyPayload> {
        if self.t.as_deref() != Some("READY") {
            return None;
        }
        self.payload(OpCode::Dispatch)
    }

    pub fn as_identify(&self) -> Option<IdentifyPayload> {
        self.payload(OpCode::Identify)
    }

    pub fn as_resume(&self) -> Option<ResumePayload> {
        self.payload(OpCode::Resume)
    }

    /// Whether an Invalid Session may be resumed. A missing flag means no.
    pub fn as_invalid_session(&self) -> Option<bool> {
        (self.op == OpCode::InvalidSession)
            .then(|| self.d.as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op {}", self.op)?;
        if let Some(name) = &self.t {
            write!(f, " {name}")?;
        }
        match self.s {
            Some(sequence) => write!(f, " #{sequence}"),
            None => Ok(()),
        }
    }
}
