//! Staging area for temp files shared with the transcoding engine.
//!
//! Every temp file gets a name built from a random UUID v4, so concurrent
//! requests writing to the same directory never collide, whatever the clock
//! resolution. Files are handed out as [`TempFile`] handles which own the
//! obligation to delete them.

mod config;
mod error;
mod temp_file;

pub use config::StagingConfig;
pub use error::StagingError;
pub use temp_file::TempFile;

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics::STAGED_BYTES;

/// Longest extension accepted for a temp file name.
const MAX_EXTENSION_LEN: usize = 8;

/// Allocates, writes and names temp files under one directory.
#[derive(Debug, Clone)]
pub struct TempFileManager {
    config: StagingConfig,
}

impl TempFileManager {
    /// Creates a manager for the configured directory.
    pub fn new(config: StagingConfig) -> Self {
        Self { config }
    }

    /// The staging directory.
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Creates the staging directory if needed and checks it is a directory.
    pub async fn ensure_dir(&self) -> Result<(), StagingError> {
        let unavailable = |source| StagingError::DirectoryUnavailable {
            path: self.config.dir.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.config.dir)
            .await
            .map_err(unavailable)?;
        let meta = tokio::fs::metadata(&self.config.dir)
            .await
            .map_err(unavailable)?;
        if !meta.is_dir() {
            return Err(unavailable(std::io::Error::new(
                std::io::ErrorKind::Other,
                "not a directory",
            )));
        }
        Ok(())
    }

    /// Writes `bytes` to a fresh temp file.
    ///
    /// On failure nothing is left in the staging directory.
    pub async fn stage(&self, bytes: &[u8], extension: &str) -> Result<TempFile, StagingError> {
        let path = self.allocate(extension)?;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| StagingError::Stage {
                path: path.clone(),
                source,
            })?;

        // From here on the file exists, so the handle owns its removal.
        let mut handle = TempFile::staged(path.clone());

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;
        drop(file);

        if let Err(source) = written {
            if let Err(e) = handle.release().await {
                warn!(error = %e, "Failed to remove partially staged file");
            }
            return Err(StagingError::Stage { path, source });
        }

        STAGED_BYTES.inc_by(bytes.len() as u64);
        debug!(path = %path.display(), bytes = bytes.len(), "Staged input");
        Ok(handle)
    }

    /// Allocates an output path without creating the file.
    pub fn reserve(&self, extension: &str) -> Result<TempFile, StagingError> {
        let path = self.allocate(extension)?;
        debug!(path = %path.display(), "Reserved output path");
        Ok(TempFile::reserved(path))
    }

    /// Returns a fresh, unused path for `extension`.
    pub fn allocate(&self, extension: &str) -> Result<PathBuf, StagingError> {
        validate_extension(extension)?;
        let name = format!(
            "{}{}.{}",
            self.config.prefix,
            Uuid::new_v4().simple(),
            extension.to_ascii_lowercase()
        );
        Ok(self.config.dir.join(name))
    }

    /// Whether `file_name` follows this manager's naming scheme.
    pub fn is_staging_name(&self, file_name: &str) -> bool {
        let Some(rest) = file_name.strip_prefix(self.config.prefix.as_str()) else {
            return false;
        };
        let Some((id, ext)) = rest.split_once('.') else {
            return false;
        };
        id.len() == 32
            && id.bytes().all(|b| b.is_ascii_hexdigit())
            && validate_extension(ext).is_ok()
    }

    /// Lists files in the staging directory that follow the naming scheme.
    pub async fn residual_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.config.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_str().is_some_and(|n| self.is_staging_name(n)) {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }

    /// Removes staging files older than `max_age`, e.g. left over by a crash.
    ///
    /// Returns the number of files removed.
    pub async fn sweep_stale(&self, max_age: Duration) -> std::io::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for path in self.residual_files().await? {
            let modified = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(_) => continue,
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age < max_age {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to sweep stale file"),
            }
        }

        if removed > 0 {
            info!(removed, dir = %self.config.dir.display(), "Swept stale staging files");
        }
        Ok(removed)
    }
}

fn validate_extension(extension: &str) -> Result<(), StagingError> {
    let valid = !extension.is_empty()
        && extension.len() <= MAX_EXTENSION_LEN
        && extension.bytes().all(|b| b.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(StagingError::InvalidExtension {
            extension: extension.to_string(),
        })
    }
}
