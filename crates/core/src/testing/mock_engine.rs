//! Mock engine for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::engine::{Engine, EngineError, EngineInvocation, EngineReport, MediaInfo};

/// A recorded engine run for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    /// The invocation that was submitted.
    pub invocation: EngineInvocation,
    /// Whether every input file existed when the run started.
    pub inputs_present: bool,
    /// Whether the run succeeded.
    pub success: bool,
}

/// Mock implementation of the Engine trait.
///
/// Provides controllable behavior for testing:
/// - Track invocations for assertions
/// - Simulate failures, slow runs and missing output
/// - Control probe results
///
/// The mock writes its configured output bytes to the invocation's output
/// path, so the service's read back and cleanup run exactly as with a real
/// engine. A run slower than the invocation deadline leaves a partial output
/// file behind and fails with [`EngineError::Timeout`].
///
/// # Example
///
/// ```rust,ignore
/// use mediaforge_core::testing::MockEngine;
///
/// let engine = Arc::new(MockEngine::new());
/// engine.set_next_error(EngineError::failed(Some(1), "Invalid data")).await;
///
/// let service = ConversionService::new(config, staging, engine.clone());
/// assert!(service.convert(&wav, "toAudio", options).await.is_err());
///
/// let runs = engine.recorded_invocations().await;
/// assert!(!runs[0].success);
/// ```
#[derive(Debug)]
pub struct MockEngine {
    /// Recorded invocations.
    invocations: Arc<RwLock<Vec<RecordedInvocation>>>,
    /// Pre-configured probe results by path.
    probe_results: Arc<RwLock<HashMap<PathBuf, MediaInfo>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<EngineError>>>,
    /// Simulated run duration.
    run_duration: Arc<RwLock<Duration>>,
    /// Bytes written to the output path.
    output: Arc<RwLock<Vec<u8>>>,
    /// Whether a successful run writes its output at all.
    write_output: Arc<RwLock<bool>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine that succeeds immediately.
    pub fn new() -> Self {
        Self {
            invocations: Arc::new(RwLock::new(Vec::new())),
            probe_results: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            run_duration: Arc::new(RwLock::new(Duration::ZERO)),
            output: Arc::new(RwLock::new(b"mock-output".to_vec())),
            write_output: Arc::new(RwLock::new(true)),
        }
    }

    /// Get all recorded invocations.
    pub async fn recorded_invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations.read().await.clone()
    }

    /// Get the number of runs performed.
    pub async fn invocation_count(&self) -> usize {
        self.invocations.read().await.len()
    }

    /// Clear recorded invocations.
    pub async fn clear_recorded(&self) {
        self.invocations.write().await.clear();
    }

    /// Set a probe result for a specific path.
    pub async fn set_probe_result(&self, path: impl AsRef<Path>, info: MediaInfo) {
        self.probe_results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), info);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: EngineError) {
        *self.next_error.write().await = Some(error);
    }

    /// Clear any pending error.
    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }

    /// Set the simulated run duration.
    pub async fn set_run_duration(&self, duration: Duration) {
        *self.run_duration.write().await = duration;
    }

    /// Set the bytes a successful run writes.
    pub async fn set_output(&self, bytes: impl Into<Vec<u8>>) {
        *self.output.write().await = bytes.into();
    }

    /// Make successful runs skip writing their output, like a broken engine.
    pub async fn set_write_output(&self, write: bool) {
        *self.write_output.write().await = write;
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<EngineError> {
        self.next_error.write().await.take()
    }

    async fn record(&self, invocation: &EngineInvocation, inputs_present: bool, success: bool) {
        self.invocations.write().await.push(RecordedInvocation {
            invocation: invocation.clone(),
            inputs_present,
            success,
        });
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, invocation: &EngineInvocation) -> Result<EngineReport, EngineError> {
        let inputs_present = invocation.inputs.iter().all(|i| i.path.exists());

        if let Some(err) = self.take_error().await {
            self.record(invocation, inputs_present, false).await;
            return Err(err);
        }

        let duration = *self.run_duration.read().await;
        if let Some(deadline) = invocation.timeout.filter(|t| *t < duration) {
            // Partial output, like a process killed mid-write
            tokio::fs::write(&invocation.output, b"partial").await?;
            tokio::time::sleep(deadline).await;
            self.record(invocation, inputs_present, false).await;
            return Err(EngineError::Timeout {
                timeout_ms: deadline.as_millis() as u64,
            });
        }
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }

        let output = self.output.read().await.clone();
        if *self.write_output.read().await {
            tokio::fs::write(&invocation.output, &output).await?;
        }
        self.record(invocation, inputs_present, true).await;

        Ok(EngineReport {
            output_size_bytes: output.len() as u64,
            duration_ms: duration.as_millis() as u64,
            warnings: Vec::new(),
        })
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, EngineError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.probe_results
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| {
                EngineError::probe_failed(format!("no probe result for {}", path.display()))
            })
    }

    async fn validate(&self) -> Result<(), EngineError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(())
    }
}
