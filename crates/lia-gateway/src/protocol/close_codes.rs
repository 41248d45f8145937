//! Close codes sent by the gateway

/// Clean closure as defined by the WebSocket protocol
pub const NORMAL_CLOSURE: u16 = 1000;

/// Gateway-specific close codes (the 4000 range)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    AlreadyAuthenticated = 4005,
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimeout = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
    InvalidIntents = 4013,
    /// Privileged intents requested without approval
    DisallowedIntents = 4014,
}

impl CloseCode {
    pub const ALL: [Self; 14] = [
        Self::UnknownError,
        Self::UnknownOpcode,
        Self::DecodeError,
        Self::NotAuthenticated,
        Self::AuthenticationFailed,
        Self::AlreadyAuthenticated,
        Self::InvalidSequence,
        Self::RateLimited,
        Self::SessionTimeout,
        Self::InvalidShard,
        Self::ShardingRequired,
        Self::InvalidApiVersion,
        Self::InvalidIntents,
        Self::DisallowedIntents,
    ];

    /// `None` for 1000, transport-level codes and anything unassigned
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_u16() == value)
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// The session survives this close and can be resumed on a new connection.
    ///
    /// 4003 only shows up when a frame races the handshake.
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        !matches!(
            self,
            Self::AuthenticationFailed
                | Self::InvalidShard
                | Self::ShardingRequired
                | Self::InvalidApiVersion
                | Self::InvalidIntents
                | Self::DisallowedIntents
        )
    }

    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::UnknownError => "unknown error, reconnect",
            Self::UnknownOpcode => "the client sent an invalid op",
            Self::DecodeError => "the client sent an undecodable payload",
            Self::NotAuthenticated => "payload sent before identifying",
            Self::AuthenticationFailed => "the token is invalid",
            Self::AlreadyAuthenticated => "identify sent twice",
            Self::InvalidSequence => "resume sequence is invalid",
            Self::RateLimited => "payloads sent too quickly",
            Self::SessionTimeout => "the session timed out",
            Self::InvalidShard => "shard id or count is invalid",
            Self::ShardingRequired => "too many guilds, sharding required",
            Self::InvalidApiVersion => "gateway version is not supported",
            Self::InvalidIntents => "intents bitmask is invalid",
            Self::DisallowedIntents => "privileged intents are not enabled",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.as_u16(), self.reason())
    }
}
