//! Conversion service implementation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use prometheus::IntGauge;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::engine::{Engine, EngineInput, EngineInvocation};
use crate::metrics::{
    CLEANUP_FAILURES, CONVERSIONS_IN_FLIGHT, CONVERSIONS_TOTAL, CONVERSION_DURATION,
};
use crate::profiles;
use crate::sniffer::{sniff, OutputContainer, SniffedFormat};
use crate::staging::{TempFile, TempFileManager};

use super::config::ServiceConfig;
use super::error::{ConversionError, ServiceError};
use super::frames::split_jpeg_stream;
use super::operations::{Operation, Position};
use super::plan::TranscodePlan;
use super::types::{
    ConversionOptions, ConversionOutput, ConversionResult, RequestState, ServiceStatus,
};

/// Metric label for requests naming a profile that does not exist.
const UNKNOWN_LABEL: &str = "unknown";

/// Counters behind [`ServiceStatus`].
#[derive(Default)]
struct ServiceStats {
    active: AtomicUsize,
    queued: AtomicUsize,
    total_completed: AtomicU64,
    total_failed: AtomicU64,
}

/// Holds one unit of a counter, and of an optional gauge, until dropped.
/// A request future dropped mid-await still gives its unit back.
struct CountGuard<'a> {
    counter: &'a AtomicUsize,
    gauge: Option<&'static IntGauge>,
}

impl<'a> CountGuard<'a> {
    fn new(counter: &'a AtomicUsize, gauge: Option<&'static IntGauge>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(gauge) = gauge {
            gauge.inc();
        }
        Self { counter, gauge }
    }
}

impl Drop for CountGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
        if let Some(gauge) = self.gauge {
            gauge.dec();
        }
    }
}

/// Converts media buffers through the staging area and the engine.
///
/// Every call runs sniff, stage, reserve, run, read back and release as one
/// request. Input temp files are released on every path; the output is
/// released after reading unless the caller asked for a deferred handle.
pub struct ConversionService {
    config: ServiceConfig,
    staging: TempFileManager,
    engine: Arc<dyn Engine>,
    permits: Arc<Semaphore>,
    stats: Arc<ServiceStats>,
}

impl ConversionService {
    /// Creates a new service.
    pub fn new(config: ServiceConfig, staging: TempFileManager, engine: Arc<dyn Engine>) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_parallel_conversions.max(1)));
        Self {
            config,
            staging,
            engine,
            permits,
            stats: Arc::new(ServiceStats::default()),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn staging(&self) -> &TempFileManager {
        &self.staging
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Returns the current slot usage and totals.
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            max_parallel_conversions: self.config.max_parallel_conversions.max(1),
            active: self.stats.active.load(Ordering::Relaxed),
            queued: self.stats.queued.load(Ordering::Relaxed),
            total_completed: self.stats.total_completed.load(Ordering::Relaxed),
            total_failed: self.stats.total_failed.load(Ordering::Relaxed),
        }
    }

    /// Converts `input` with a named profile.
    pub async fn convert(
        &self,
        input: &[u8],
        profile: &str,
        options: ConversionOptions,
    ) -> Result<ConversionResult, ServiceError> {
        let Some(profile) = profiles::find(profile) else {
            let err = ConversionError::UnknownProfile {
                name: profile.to_string(),
            };
            return Err(self.reject(profile, None, err));
        };

        let plan = TranscodePlan::from_profile(profile);
        let source = sniff(input)
            .map_err(|e| self.reject(profile.name, Some(profile.extension), e.into()))?;
        self.execute(input, source, plan, options).await
    }

    /// Runs an ad-hoc operation on `input`.
    pub async fn run_operation(
        &self,
        input: &[u8],
        operation: Operation,
        options: ConversionOptions,
    ) -> Result<ConversionResult, ServiceError> {
        let label = operation.label();
        let source = sniff(input).map_err(|e| self.reject(&label, None, e.into()))?;
        let plan = operation
            .plan(source.kind)
            .map_err(|e| self.reject(&label, None, e))?;
        self.execute(input, source, plan, options).await
    }

    pub async fn crop(
        &self,
        input: &[u8],
        width: u32,
        height: u32,
        x: u32,
        y: u32,
        options: ConversionOptions,
    ) -> Result<ConversionResult, ServiceError> {
        self.run_operation(input, Operation::crop(width, height, x, y), options)
            .await
    }

    pub async fn scale_to(
        &self,
        input: &[u8],
        width: Option<u32>,
        height: Option<u32>,
        options: ConversionOptions,
    ) -> Result<ConversionResult, ServiceError> {
        self.run_operation(input, Operation::scale_to(width, height), options)
            .await
    }

    pub async fn trim_range(
        &self,
        input: &[u8],
        start: Duration,
        end: Duration,
        options: ConversionOptions,
    ) -> Result<ConversionResult, ServiceError> {
        self.run_operation(input, Operation::trim_range(start, end), options)
            .await
    }

    pub async fn to_container(
        &self,
        input: &[u8],
        name: &str,
        options: ConversionOptions,
    ) -> Result<ConversionResult, ServiceError> {
        self.run_operation(input, Operation::to_container(name), options)
            .await
    }

    /// Overlays the image at `image` on every frame.
    pub async fn watermark(
        &self,
        input: &[u8],
        image: impl Into<PathBuf>,
        position: Position,
        options: ConversionOptions,
    ) -> Result<ConversionResult, ServiceError> {
        self.run_operation(input, Operation::watermark(image, position), options)
            .await
    }

    /// Appends the media files at `others` to `input`.
    pub async fn concat<I, P>(
        &self,
        input: &[u8],
        others: I,
        audio: bool,
        options: ConversionOptions,
    ) -> Result<ConversionResult, ServiceError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.run_operation(input, Operation::concat(others, audio), options)
            .await
    }

    /// Samples frames at `rate` per second into a Motion JPEG stream.
    pub async fn extract_frames(
        &self,
        input: &[u8],
        rate: f64,
        max_frames: Option<u32>,
        options: ConversionOptions,
    ) -> Result<ConversionResult, ServiceError> {
        self.run_operation(input, Operation::extract_frames(rate, max_frames), options)
            .await
    }

    /// Like [`Self::extract_frames`], split into individual JPEG images.
    pub async fn extract_frame_images(
        &self,
        input: &[u8],
        rate: f64,
        max_frames: Option<u32>,
    ) -> Result<Vec<Vec<u8>>, ServiceError> {
        let result = self
            .extract_frames(input, rate, max_frames, ConversionOptions::default())
            .await?;
        let extension = result.extension;
        let stream = result.output.into_bytes().await.map_err(|e| {
            ServiceError::new(
                "extract_frames",
                Some(&extension),
                ConversionError::ReadBack {
                    reason: e.to_string(),
                },
            )
        })?;
        Ok(split_jpeg_stream(&stream))
    }

    /// Grabs the frame at `at` as a PNG.
    pub async fn extract_frame(
        &self,
        input: &[u8],
        at: Duration,
        options: ConversionOptions,
    ) -> Result<ConversionResult, ServiceError> {
        self.run_operation(input, Operation::extract_frame(at), options)
            .await
    }

    /// Renders the audio track as a `width`x`height` waveform PNG.
    pub async fn waveform(
        &self,
        input: &[u8],
        width: u32,
        height: u32,
        options: ConversionOptions,
    ) -> Result<ConversionResult, ServiceError> {
        self.run_operation(input, Operation::waveform(width, height), options)
            .await
    }

    pub async fn reverse(
        &self,
        input: &[u8],
        options: ConversionOptions,
    ) -> Result<ConversionResult, ServiceError> {
        self.run_operation(input, Operation::reverse(), options).await
    }

    /// Records a request rejected before staging. Unknown profile names are
    /// caller input and share one metric label.
    fn reject(&self, operation: &str, extension: Option<&str>, kind: ConversionError) -> ServiceError {
        let label = match kind {
            ConversionError::UnknownProfile { .. } => UNKNOWN_LABEL,
            _ => operation,
        };
        CONVERSIONS_TOTAL.with_label_values(&[label, "rejected"]).inc();
        debug!(operation, error = %kind, "Rejected conversion request");
        ServiceError::new(operation, extension, kind)
    }

    /// Merges options, checks the source, then runs the plan under a permit.
    async fn execute(
        &self,
        input: &[u8],
        source: SniffedFormat,
        plan: TranscodePlan,
        options: ConversionOptions,
    ) -> Result<ConversionResult, ServiceError> {
        let started = Instant::now();
        let operation = plan.label.clone();
        let requested = options
            .container
            .clone()
            .or_else(|| plan.output.map(|o| o.extension.to_string()));

        let prepared = plan
            .merge_options(&options)
            .and_then(|plan| {
                if plan.accepts(source.kind) {
                    Ok(plan)
                } else {
                    Err(ConversionError::IncompatibleInput {
                        operation: plan.label.clone(),
                        kind: source.kind,
                    })
                }
            })
            .and_then(|plan| plan.resolve_output(&source).map(|output| (plan, output)));
        let (plan, output) =
            prepared.map_err(|e| self.reject(&operation, requested.as_deref(), e))?;

        debug!(
            operation = %operation,
            state = %RequestState::Sniffed,
            source = source.extension,
            kind = %source.kind,
            target = output.extension,
            "Conversion request accepted"
        );

        let queued = CountGuard::new(&self.stats.queued, None);
        let permit = self.permits.acquire().await;
        drop(queued);
        let _permit = permit.map_err(|_| {
            ServiceError::new(
                &operation,
                Some(output.extension),
                ConversionError::EngineUnavailable {
                    reason: "conversion slots closed".to_string(),
                },
            )
        })?;

        let active = CountGuard::new(&self.stats.active, Some(&CONVERSIONS_IN_FLIGHT));
        let result = self.transcode(input, &source, &plan, output, &options).await;
        drop(active);

        let elapsed = started.elapsed();
        CONVERSION_DURATION
            .with_label_values(&[operation.as_str()])
            .observe(elapsed.as_secs_f64());

        match result {
            Ok(out) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                CONVERSIONS_TOTAL
                    .with_label_values(&[operation.as_str(), "success"])
                    .inc();
                info!(
                    operation = %operation,
                    source = source.extension,
                    target = output.extension,
                    bytes_in = input.len(),
                    deferred = options.deferred,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Conversion completed"
                );
                Ok(ConversionResult {
                    source,
                    extension: output.extension.to_string(),
                    media_type: output.media_type.to_string(),
                    output: out,
                    elapsed,
                })
            }
            Err(kind) => {
                self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
                CONVERSIONS_TOTAL
                    .with_label_values(&[operation.as_str(), "failed"])
                    .inc();
                error!(
                    operation = %operation,
                    target = output.extension,
                    kind = kind.kind_name(),
                    error = %kind,
                    "Conversion failed"
                );
                if let ConversionError::ConversionFailed {
                    diagnostics: Some(ref diagnostics),
                    ..
                } = kind
                {
                    warn!(operation = %operation, %diagnostics, "Engine diagnostics");
                }
                Err(ServiceError::new(operation, Some(output.extension), kind))
            }
        }
    }

    /// Stage, run, read back. Both temp files are released before returning,
    /// except a deferred output which moves into the result.
    async fn transcode(
        &self,
        input: &[u8],
        source: &SniffedFormat,
        plan: &TranscodePlan,
        output: OutputContainer,
        options: &ConversionOptions,
    ) -> Result<ConversionOutput, ConversionError> {
        let mut staged = self
            .staging
            .stage(input, source.extension)
            .await
            .map_err(ConversionError::StageIo)?;
        debug!(state = %RequestState::Staged, path = %staged.path().display(), "Input staged");

        let mut reserved = match self.staging.reserve(output.extension) {
            Ok(file) => file,
            Err(e) => {
                release(&mut staged).await;
                return Err(ConversionError::StageIo(e));
            }
        };

        let mut inputs = vec![EngineInput::with_format(staged.path(), source.demuxer)];
        inputs.extend(plan.extra_inputs.iter().cloned());
        let invocation = EngineInvocation {
            inputs,
            args: plan.to_args(output.muxer),
            output: reserved.path().to_path_buf(),
            timeout: options.timeout.or_else(|| self.config.timeout()),
        };

        debug!(
            state = %RequestState::Running,
            engine = self.engine.name(),
            "Running engine"
        );
        let run = self.engine.run(&invocation).await;
        release(&mut staged).await;

        let outcome = match run {
            Ok(report) => {
                debug!(
                    state = %RequestState::Completed,
                    output_bytes = report.output_size_bytes,
                    engine_ms = report.duration_ms,
                    "Engine finished"
                );
                for warning in &report.warnings {
                    warn!(%warning, "Engine reported a problem but succeeded");
                }
                if options.deferred {
                    Ok(ConversionOutput::File(reserved))
                } else {
                    read_back(reserved).await
                }
            }
            Err(e) => {
                debug!(state = %RequestState::Failed, error = %e, "Engine failed");
                release(&mut reserved).await;
                Err(ConversionError::from(e))
            }
        };

        debug!(state = %RequestState::Cleaned, "Request cleaned up");
        outcome
    }
}

async fn read_back(file: TempFile) -> Result<ConversionOutput, ConversionError> {
    let bytes = file
        .into_bytes()
        .await
        .map_err(|e| ConversionError::ReadBack {
            reason: e.to_string(),
        })?;
    if bytes.is_empty() {
        return Err(ConversionError::ReadBack {
            reason: "engine produced an empty file".to_string(),
        });
    }
    Ok(ConversionOutput::Bytes(bytes))
}

/// Releases a temp file; failures are logged and counted, never returned.
async fn release(file: &mut TempFile) {
    if let Err(e) = file.release().await {
        CLEANUP_FAILURES.inc();
        warn!(error = %e, "Failed to release temp file");
    }
}
