//! Owned temp file handle.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::error::StagingError;
use crate::metrics::CLEANUP_FAILURES;

/// How the file behind a handle came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Written by the staging area; must exist until released.
    Staged,
    /// Path handed to the engine; the file may never have been created.
    Reserved,
}

/// A temp file path plus the obligation to delete it exactly once.
///
/// [`TempFile::release`] is the normal way to give the file up and may be
/// called any number of times. A handle dropped without being released
/// removes its file synchronously, so every exit path (early return, panic,
/// cancelled future) still cleans up.
pub struct TempFile {
    path: PathBuf,
    origin: Origin,
    released: bool,
}

impl TempFile {
    pub(super) fn staged(path: PathBuf) -> Self {
        Self {
            path,
            origin: Origin::Staged,
            released: false,
        }
    }

    pub(super) fn reserved(path: PathBuf) -> Self {
        Self {
            path,
            origin: Origin::Reserved,
            released: false,
        }
    }

    /// Path of the temp file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extension of the temp file.
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }

    /// Whether the file has already been released.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Deletes the file. Releasing an already released handle is a no-op.
    pub async fn release(&mut self) -> Result<(), StagingError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Released temp file");
                Ok(())
            }
            Err(e) => self.classify_removal(e),
        }
    }

    /// Reads the whole file and releases it.
    ///
    /// A failed release after a successful read is logged and does not
    /// discard the bytes.
    pub async fn into_bytes(mut self) -> Result<Vec<u8>, StagingError> {
        let read = tokio::fs::read(&self.path).await;
        let bytes = match read {
            Ok(bytes) => bytes,
            Err(source) => {
                let path = self.path.clone();
                if let Err(e) = self.release().await {
                    CLEANUP_FAILURES.inc();
                    warn!(error = %e, "Cleanup failed after read error");
                }
                return Err(StagingError::Read { path, source });
            }
        };

        if let Err(e) = self.release().await {
            CLEANUP_FAILURES.inc();
            warn!(error = %e, "Cleanup failed after reading temp file");
        }
        Ok(bytes)
    }

    fn classify_removal(&self, e: std::io::Error) -> Result<(), StagingError> {
        if e.kind() == ErrorKind::NotFound && self.origin == Origin::Reserved {
            return Ok(());
        }
        Err(StagingError::Cleanup {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl fmt::Debug for TempFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempFile")
            .field("path", &self.path)
            .field("origin", &self.origin)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Err(e) = std::fs::remove_file(&self.path) {
            if let Err(e) = self.classify_removal(e) {
                CLEANUP_FAILURES.inc();
                warn!(error = %e, "Cleanup failed while dropping temp file");
            }
        } else {
            debug!(path = %self.path.display(), "Released temp file on drop");
        }
    }
}
