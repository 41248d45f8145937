//! # lia-bot
//!
//! Presence statistics bot: keeps a gateway session alive and records every
//! user status change into PostgreSQL in batches.

pub mod app;
pub mod statistics;

pub use app::run;
