//! Configuration for the conversion service.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the conversion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Maximum concurrent engine runs. Further requests wait for a slot.
    #[serde(default = "default_max_conversions")]
    pub max_parallel_conversions: usize,

    /// Default deadline per conversion in seconds. Falls back to the engine
    /// timeout when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_max_conversions() -> usize {
    4
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_parallel_conversions: default_max_conversions(),
            timeout_secs: None,
        }
    }
}

impl ServiceConfig {
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel_conversions = max;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
