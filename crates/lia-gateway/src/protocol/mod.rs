//! Gateway protocol definitions
//!
//! Op codes, the message envelope, handshake payloads, intents, and close codes.

mod close_codes;
mod intents;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{CloseCode, NORMAL_CLOSURE};
pub use intents::Intents;
pub use messages::GatewayMessage;
pub use opcodes::{OpCode, UnknownOpCode};
pub use payloads::{
    Activity, HelloPayload, IdentifyPayload, IdentifyProperties, PresencePayload, ReadyPayload,
    ResumePayload, UserStatus,
};
