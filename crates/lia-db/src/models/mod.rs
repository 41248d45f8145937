//! Database models

mod counter;
mod presence;

pub use counter::Counter;
pub use presence::{PresenceHistoryModel, PresenceLabel, PresenceRecord};
