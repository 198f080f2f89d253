//! Configuration for the staging area.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where and how temp files are named.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Directory holding staged inputs and engine outputs.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// File name prefix for every temp file.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Age in seconds after which leftover temp files are swept at startup.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
}

fn default_dir() -> PathBuf {
    std::env::temp_dir().join("mediaforge")
}

fn default_prefix() -> String {
    "mf-".to_string()
}

fn default_stale_after() -> u64 {
    3600 // 1 hour
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            prefix: default_prefix(),
            stale_after_secs: default_stale_after(),
        }
    }
}

impl StagingConfig {
    /// Creates a config rooted at `dir` with the default prefix.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Sets the file name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}
