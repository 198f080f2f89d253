//! Error types for the engine module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine binary not found.
    #[error("Engine binary not found at path: {path}")]
    NotFound { path: PathBuf },

    /// Process exited non-zero or reported an error.
    #[error("Engine failed ({}): {}", exit_label(.code), first_line(.diagnostics))]
    Failed {
        code: Option<i32>,
        diagnostics: String,
    },

    /// Process exited cleanly but left no usable output.
    #[error("Engine produced no output at {path}")]
    MissingOutput { path: PathBuf },

    /// Deadline exceeded; the process was killed.
    #[error("Engine timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Failed to probe a media file.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// I/O error while driving the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn first_line(diagnostics: &str) -> &str {
    diagnostics
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no diagnostics")
}

impl EngineError {
    /// Creates a failure error from an exit code and captured diagnostics.
    pub fn failed(code: Option<i32>, diagnostics: impl Into<String>) -> Self {
        Self::Failed {
            code,
            diagnostics: diagnostics.into(),
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Captured engine diagnostics, when available.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Failed { diagnostics, .. } if !diagnostics.is_empty() => Some(diagnostics),
            _ => None,
        }
    }
}
