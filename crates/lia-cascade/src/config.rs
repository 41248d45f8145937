//! Cascade configuration

use crate::error::CascadeError;
use std::time::Duration;

/// Bounds applied by the flush loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeConfig {
    /// Upper bound on how long the oldest item of a batch waits before a flush
    pub max_wait: Duration,
    /// Flush as soon as this many items have been collected
    pub max_quantity: usize,
    /// Upper bound on the shutdown drain
    pub max_wait_finalize: Duration,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_millis(500),
            max_quantity: 100,
            max_wait_finalize: Duration::from_secs(5),
        }
    }
}

impl CascadeConfig {
    /// Create a configuration with the default finalize bound
    #[must_use]
    pub fn new(max_wait: Duration, max_quantity: usize) -> Self {
        Self {
            max_wait,
            max_quantity,
            ..Self::default()
        }
    }

    /// Set the shutdown drain bound
    #[must_use]
    pub fn with_max_wait_finalize(mut self, max_wait_finalize: Duration) -> Self {
        self.max_wait_finalize = max_wait_finalize;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), CascadeError> {
        if self.max_quantity == 0 {
            return Err(CascadeError::InvalidConfig("max_quantity must be at least 1"));
        }
        if self.max_wait.is_zero() {
            return Err(CascadeError::InvalidConfig("max_wait must be non-zero"));
        }
        Ok(())
    }
}
