//! Cascade error types

use thiserror::Error;

/// Errors returned by [`Cascade`](crate::Cascade) lifecycle operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CascadeError {
    /// `start` was called while the flush loop is already active
    #[error("cascade is already running")]
    AlreadyRunning,

    /// `put` was called while the cascade is stopped
    #[error("cascade is not running")]
    NotRunning,

    /// A configuration value cannot be used
    #[error("invalid cascade configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Cascade result type
pub type CascadeResult<T> = Result<T, CascadeError>;
