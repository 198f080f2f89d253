//! Error types for the staging module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while staging or releasing temp files.
#[derive(Debug, Error)]
pub enum StagingError {
    /// Extension is empty or contains characters unfit for a file name.
    #[error("Invalid temp file extension: {extension:?}")]
    InvalidExtension { extension: String },

    /// Staging directory missing or not a directory.
    #[error("Staging directory unavailable: {path}")]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the input buffer failed. No file is left behind.
    #[error("Failed to stage {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading a temp file back failed.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing a temp file failed.
    #[error("Failed to release {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
