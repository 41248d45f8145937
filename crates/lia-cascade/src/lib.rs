//! # lia-cascade
//!
//! A generic producer/consumer batcher. Items are buffered and handed to an
//! async callback either when `max_quantity` items have accumulated or when
//! the batch window (`max_wait`) has elapsed, whichever comes first.
//!
//! ```rust,ignore
//! use lia_cascade::{Cascade, CascadeConfig};
//! use std::time::Duration;
//!
//! let cascade = Cascade::new(
//!     CascadeConfig::new(Duration::from_millis(500), 10),
//!     |batch: Vec<u64>| async move { write_rows(&batch).await },
//! )?;
//! cascade.start()?;
//! cascade.put(42)?;
//! cascade.stop(true).await;
//! ```

mod cascade;
mod config;
mod error;
mod flush;

pub use cascade::{Cascade, CascadeStats, DrainHandle};
pub use config::CascadeConfig;
pub use error::{CascadeError, CascadeResult};
