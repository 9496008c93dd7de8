//! Run configuration

use crate::error::{OrchestratorError, OrchestratorResult};

/// Attempts made on one prompt before it is abandoned for this run
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Consecutive failures after which a credential is evicted
pub const DEFAULT_EVICTION_THRESHOLD: u32 = 3;

/// Bounds for the retry and eviction rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub max_attempts: u32,
    pub eviction_threshold: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            eviction_threshold: DEFAULT_EVICTION_THRESHOLD,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.max_attempts == 0 {
            return Err(OrchestratorError::config("max_attempts must be at least 1"));
        }
        if self.eviction_threshold == 0 {
            return Err(OrchestratorError::config("eviction_threshold must be at least 1"));
        }
        Ok(())
    }
}
