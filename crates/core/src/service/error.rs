//! Error types for the conversion service.

use thiserror::Error;

use crate::engine::EngineError;
use crate::sniffer::{MediaKind, SniffError};
use crate::staging::StagingError;

/// What went wrong during a conversion.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// No profile with this name.
    #[error("Unknown profile: {name}")]
    UnknownProfile { name: String },

    /// The input could not be identified. Nothing was staged.
    #[error("Unknown input format: {0}")]
    UnknownFormat(#[from] SniffError),

    /// The profile or operation cannot read this kind of media.
    #[error("{operation} does not accept {kind} input")]
    IncompatibleInput { operation: String, kind: MediaKind },

    /// Caller options conflict with the plan or use reserved flags.
    #[error("Invalid options: {reason}")]
    InvalidOptions { reason: String },

    /// Operation parameters are out of range or cannot be combined.
    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// No output container with this name.
    #[error("Unsupported output container: {name}")]
    UnsupportedContainer { name: String },

    /// Writing the input or allocating the output failed.
    #[error("Failed to stage input: {0}")]
    StageIo(#[source] StagingError),

    /// The engine failed. Diagnostics hold the captured stderr lines.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        diagnostics: Option<String>,
    },

    /// The engine reported success but the output was missing or unreadable.
    #[error("Failed to read conversion output: {reason}")]
    ReadBack { reason: String },

    /// The request deadline elapsed; the engine process was killed.
    #[error("Conversion timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// The engine could not be started at all.
    #[error("Engine unavailable: {reason}")]
    EngineUnavailable { reason: String },
}

impl ConversionError {
    pub fn invalid_options(reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            reason: reason.into(),
        }
    }

    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Stable snake_case name, used for metrics labels and API responses.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::UnknownProfile { .. } => "unknown_profile",
            Self::UnknownFormat(_) => "unknown_format",
            Self::IncompatibleInput { .. } => "incompatible_input",
            Self::InvalidOptions { .. } => "invalid_options",
            Self::InvalidOperation { .. } => "invalid_operation",
            Self::UnsupportedContainer { .. } => "unsupported_container",
            Self::StageIo(_) => "stage_io",
            Self::ConversionFailed { .. } => "conversion_failed",
            Self::ReadBack { .. } => "read_back",
            Self::Timeout { .. } => "timeout",
            Self::EngineUnavailable { .. } => "engine_unavailable",
        }
    }

    /// Whether the caller can fix the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownProfile { .. }
                | Self::UnknownFormat(_)
                | Self::IncompatibleInput { .. }
                | Self::InvalidOptions { .. }
                | Self::InvalidOperation { .. }
                | Self::UnsupportedContainer { .. }
        )
    }
}

impl From<EngineError> for ConversionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound { .. } => Self::EngineUnavailable {
                reason: err.to_string(),
            },
            EngineError::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            EngineError::MissingOutput { .. } => Self::ReadBack {
                reason: err.to_string(),
            },
            EngineError::Failed { .. } => Self::ConversionFailed {
                diagnostics: err.diagnostics().map(str::to_string),
                reason: err.to_string(),
            },
            EngineError::ProbeFailed { .. } | EngineError::Io(_) => Self::ConversionFailed {
                reason: err.to_string(),
                diagnostics: None,
            },
        }
    }
}

/// A conversion error tagged with the attempted operation.
///
/// `operation` is the profile or operation name; `extension` is the output
/// extension that was requested, once known.
#[derive(Debug, Error)]
#[error("{operation}{}: {kind}", target_suffix(.extension))]
pub struct ServiceError {
    pub operation: String,
    pub extension: Option<String>,
    #[source]
    pub kind: ConversionError,
}

fn target_suffix(extension: &Option<String>) -> String {
    match extension {
        Some(ext) => format!(" -> {ext}"),
        None => String::new(),
    }
}

impl ServiceError {
    pub fn new(
        operation: impl Into<String>,
        extension: Option<&str>,
        kind: ConversionError,
    ) -> Self {
        Self {
            operation: operation.into(),
            extension: extension.map(str::to_string),
            kind,
        }
    }

    /// Whether the caller can fix the request.
    pub fn is_client_error(&self) -> bool {
        self.kind.is_client_error()
    }

    /// Captured engine diagnostics, if the engine ran and failed.
    pub fn diagnostics(&self) -> Option<&str> {
        match &self.kind {
            ConversionError::ConversionFailed { diagnostics, .. } => diagnostics.as_deref(),
            _ => None,
        }
    }
}
