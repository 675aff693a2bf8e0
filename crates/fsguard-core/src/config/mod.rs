//! Engine configuration

mod loader;

pub use loader::{ConfigLoader, CONFIG_FILE_NAME};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::admission::DEFAULT_CAPACITY;
use crate::error::{Error, Result};
use crate::retry::{RetryPolicy, RetryableKinds, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS};

/// Tunables for an [`crate::Engine`]
///
/// Serialized as kebab-case YAML:
///
/// ```yaml
/// capacity: 64
/// max-attempts: 10
/// base-delay-ms: 50
/// retryable-kinds:
///   - resource-unavailable
///   - too-many-open-files
///   - resource-busy
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Maximum simultaneous managed operations
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Retry ceiling per operation, including the first attempt
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff unit in milliseconds, multiplied by the attempt number
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Error kinds eligible for retry
    #[serde(default)]
    pub retryable_kinds: RetryableKinds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            retryable_kinds: RetryableKinds::default(),
        }
    }
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

impl EngineConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::invalid_config("capacity must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(Error::invalid_config("max-attempts must be at least 1"));
        }
        Ok(())
    }

    /// Render as YAML, in the same shape the loader reads
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// The retry policy described by this config
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            retryable_kinds: self.retryable_kinds.clone(),
        }
    }
}
