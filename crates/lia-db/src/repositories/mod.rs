//! Repository implementations

mod counter;
mod error;
mod presence;
mod traits;

pub use counter::PgCounterRepository;
pub use error::{map_db_error, DbError, DbResult};
pub use presence::PgPresenceRepository;
pub use traits::{CounterRepository, PresenceRepository};
