//! Trait definitions for the engine module.

use async_trait::async_trait;
use std::path::Path;

use super::error::EngineError;
use super::types::{EngineInvocation, EngineReport, MediaInfo};

/// An external transcoding engine.
///
/// `run` resolves to exactly one outcome per invocation: the report of a
/// completed run, or the error that ended it.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Runs one invocation to completion.
    ///
    /// Success means the process exited with status 0 and left a non-empty
    /// file at `invocation.output`.
    async fn run(&self, invocation: &EngineInvocation) -> Result<EngineReport, EngineError>;

    /// Probes a media file to get its information.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, EngineError>;

    /// Validates that the engine is properly configured and ready.
    async fn validate(&self) -> Result<(), EngineError>;
}
