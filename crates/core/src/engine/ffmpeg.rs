//! FFmpeg-based engine implementation.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::config::EngineConfig;
use super::error::EngineError;
use super::traits::Engine;
use super::types::{EngineInvocation, EngineReport, MediaInfo};

/// Diagnostic lines that signal a problem.
static ERROR_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(error|invalid|failed|could not|cannot|unable|no such|not supported)\b")
        .unwrap()
});

/// Bounded capture of the engine's stderr.
struct Diagnostics {
    tail: VecDeque<String>,
    errors: Vec<String>,
    limit: usize,
}

impl Diagnostics {
    fn new(limit: usize) -> Self {
        Self {
            tail: VecDeque::with_capacity(limit),
            errors: Vec::new(),
            limit: limit.max(1),
        }
    }

    fn push(&mut self, line: String) {
        let line = line.trim_end().to_string();
        if line.is_empty() {
            return;
        }
        if ERROR_LINE.is_match(&line) && self.errors.len() < self.limit {
            self.errors.push(line.clone());
        }
        if self.tail.len() == self.limit {
            self.tail.pop_front();
        }
        self.tail.push_back(line);
    }

    /// Error lines when any were seen, otherwise the last lines printed.
    fn render(&self) -> String {
        if self.errors.is_empty() {
            self.tail.iter().cloned().collect::<Vec<_>>().join("\n")
        } else {
            self.errors.join("\n")
        }
    }
}

/// FFmpeg-based engine implementation.
pub struct FfmpegEngine {
    config: EngineConfig,
}

impl FfmpegEngine {
    /// Creates a new FFmpeg engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn spawn_error(&self, e: std::io::Error, path: &Path) -> EngineError {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            EngineError::Io(e)
        }
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, EngineError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            sample_rate: Option<String>,
            channels: Option<u8>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
            avg_frame_rate: Option<String>,
        }

        let probe: ProbeOutput = serde_json::from_str(output)
            .map_err(|e| EngineError::probe_failed(format!("invalid ffprobe output: {}", e)))?;

        let duration_secs = probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let size_bytes = probe
            .format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");
        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");

        let format_name = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown");

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs,
            format: format_name.to_string(),
            audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
            audio_sample_rate: audio_stream
                .and_then(|s| s.sample_rate.as_ref())
                .and_then(|r| r.parse::<u32>().ok()),
            audio_channels: audio_stream.and_then(|s| s.channels),
            video_codec: video_stream.and_then(|s| s.codec_name.clone()),
            video_width: video_stream.and_then(|s| s.width),
            video_height: video_stream.and_then(|s| s.height),
            video_fps: video_stream.and_then(|s| {
                s.avg_frame_rate
                    .as_deref()
                    .and_then(parse_frame_rate)
                    .or_else(|| s.r_frame_rate.as_deref().and_then(parse_frame_rate))
            }),
        })
    }
}

/// Parses a frame rate like "24000/1001" or "30".
fn parse_frame_rate(rate: &str) -> Option<f32> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f32>().ok()?;
            let den = den.parse::<f32>().ok()?;
            (den > 0.0 && num > 0.0).then(|| num / den)
        }
        None => rate.parse::<f32>().ok().filter(|r| *r > 0.0),
    }
}

#[async_trait]
impl Engine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn run(&self, invocation: &EngineInvocation) -> Result<EngineReport, EngineError> {
        let start = Instant::now();
        let args = invocation.command_args(&self.config.log_level);
        debug!(engine = "ffmpeg", ?args, "Spawning engine");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e, &self.config.ffmpeg_path))?;

        let stderr = child.stderr.take().ok_or_else(|| {
            EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "engine stderr was not captured",
            ))
        })?;
        let mut lines = BufReader::new(stderr).split(b'\n');

        let deadline = invocation
            .timeout
            .unwrap_or_else(|| Duration::from_secs(self.config.timeout_secs));

        let result = timeout(deadline, async {
            let mut diagnostics = Diagnostics::new(self.config.diagnostic_lines);
            while let Some(line) = lines.next_segment().await? {
                diagnostics.push(String::from_utf8_lossy(&line).into_owned());
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, diagnostics))
        })
        .await;

        let (status, diagnostics) = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return Err(EngineError::Io(e)),
            Err(_) => {
                // Kill the process on timeout
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill timed out engine process");
                }
                return Err(EngineError::Timeout {
                    timeout_ms: deadline.as_millis() as u64,
                });
            }
        };

        if !status.success() {
            return Err(EngineError::failed(status.code(), diagnostics.render()));
        }

        // Verify output exists and is non-empty
        let output_size_bytes = match tokio::fs::metadata(&invocation.output).await {
            Ok(meta) if meta.len() > 0 => meta.len(),
            _ => {
                return Err(EngineError::MissingOutput {
                    path: invocation.output.clone(),
                })
            }
        };

        Ok(EngineReport {
            output_size_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
            warnings: diagnostics.errors,
        })
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, EngineError> {
        if !path.exists() {
            return Err(EngineError::probe_failed(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e, &self.config.ffprobe_path))?;

        if !output.status.success() {
            return Err(EngineError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(path, &stdout)
    }

    async fn validate(&self) -> Result<(), EngineError> {
        for binary in [&self.config.ffmpeg_path, &self.config.ffprobe_path] {
            let output = Command::new(binary)
                .arg("-version")
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| self.spawn_error(e, binary))?;
            if !output.status.success() {
                return Err(EngineError::failed(
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr),
                ));
            }
        }
        Ok(())
    }
}
