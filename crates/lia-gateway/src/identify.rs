//! Handshake payload construction
//!
//! Builders are pure: the same settings and session state always produce
//! the same frame.

use crate::protocol::{
    Activity, GatewayMessage, IdentifyPayload, IdentifyProperties, Intents, PresencePayload,
    ResumePayload, UserStatus,
};
use crate::session::SessionState;

/// Builds the first frame a connection sends after Hello
pub trait HandshakeBuilder: Send + Sync {
    fn identify(&self, state: &SessionState) -> Result<GatewayMessage, serde_json::Error>;

    /// `None` when `state` has nothing to resume
    fn resume(&self, state: &SessionState) -> Option<Result<GatewayMessage, serde_json::Error>>;
}

/// Identify/Resume builder for a bot account
#[derive(Clone)]
pub struct IdentifyPayloadBuilder {
    token: String,
    properties: IdentifyProperties,
    compress: bool,
    large_threshold: u32,
    version: u8,
    shard_id: Option<u32>,
    shard_count: Option<u32>,
    status: Option<UserStatus>,
    activity: Option<Activity>,
    intents: Option<Intents>,
}

impl IdentifyPayloadBuilder {
    pub const DEFAULT_LARGE_THRESHOLD: u32 = 250;
    pub const GATEWAY_VERSION: u8 = 10;

    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            properties: IdentifyProperties::default(),
            compress: true,
            large_threshold: Self::DEFAULT_LARGE_THRESHOLD,
            version: Self::GATEWAY_VERSION,
            shard_id: None,
            shard_count: None,
            status: None,
            activity: None,
            intents: None,
        }
    }

    pub fn properties(mut self, properties: IdentifyProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn large_threshold(mut self, threshold: u32) -> Self {
        self.large_threshold = threshold;
        self
    }

    /// Sharding is only advertised when both values are known
    pub fn shard(mut self, shard_id: Option<u32>, shard_count: Option<u32>) -> Self {
        self.shard_id = shard_id;
        self.shard_count = shard_count;
        self
    }

    pub fn status(mut self, status: Option<UserStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn activity(mut self, activity: Option<Activity>) -> Self {
        self.activity = activity;
        self
    }

    pub fn intents(mut self, intents: Option<Intents>) -> Self {
        self.intents = intents;
        self
    }

    #[must_use]
    pub fn shard_id(&self) -> Option<u32> {
        self.shard_id
    }

    #[must_use]
    pub fn identify_payload(&self) -> IdentifyPayload {
        let shard = match (self.shard_id, self.shard_count) {
            (Some(id), Some(count)) => Some([id, count]),
            _ => None,
        };

        let presence = (self.status.is_some() || self.activity.is_some()).then(|| {
            PresencePayload {
                status: self.status,
                game: self.activity.clone(),
                since: 0,
                afk: false,
            }
        });

        IdentifyPayload {
            token: self.token.clone(),
            properties: self.properties.clone(),
            compress: self.compress,
            large_threshold: self.large_threshold,
            v: self.version,
            shard,
            presence,
            intents: self.intents.map(|intents| intents.bits()),
        }
    }

    #[must_use]
    pub fn resume_payload(&self, state: &SessionState) -> Option<ResumePayload> {
        Some(ResumePayload {
            token: self.token.clone(),
            session_id: state.session_id()?.to_string(),
            seq: state.sequence()?,
        })
    }
}

impl HandshakeBuilder for IdentifyPayloadBuilder {
    fn identify(&self, _state: &SessionState) -> Result<GatewayMessage, serde_json::Error> {
        GatewayMessage::identify(&self.identify_payload())
    }

    fn resume(&self, state: &SessionState) -> Option<Result<GatewayMessage, serde_json::Error>> {
        self.resume_payload(state)
            .map(|payload| GatewayMessage::resume(&payload))
    }
}

impl std::fmt::Debug for IdentifyPayloadBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifyPayloadBuilder")
            .field("token", &"<redacted>")
            .field("properties", &self.properties)
            .field("compress", &self.compress)
            .field("large_threshold", &self.large_threshold)
            .field("shard_id", &self.shard_id)
            .field("shard_count", &self.shard_count)
            .field("intents", &self.intents)
            .finish()
    }
}
