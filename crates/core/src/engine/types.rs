//! Types for the engine module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One input file for an engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInput {
    /// File to read.
    pub path: PathBuf,
    /// Demuxer to force with `-f`; `None` lets the engine probe.
    pub format: Option<String>,
}

impl EngineInput {
    /// An input read with an explicit demuxer.
    pub fn with_format(path: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: Some(format.into()),
        }
    }

    /// An input whose format the engine probes itself.
    pub fn probed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
        }
    }
}

/// A single engine run: inputs, output arguments and the output path.
#[derive(Debug, Clone)]
pub struct EngineInvocation {
    /// Inputs, in `-i` order. The first one is the primary input.
    pub inputs: Vec<EngineInput>,
    /// Output arguments (codecs, filters, muxer), already flattened.
    pub args: Vec<String>,
    /// Output file path.
    pub output: PathBuf,
    /// Deadline for the run; `None` uses the engine default.
    pub timeout: Option<Duration>,
}

impl EngineInvocation {
    /// Renders the full argument vector.
    ///
    /// Layout: `-y -hide_banner -nostdin -loglevel <level>`, then
    /// `[-f <fmt>] -i <path>` per input, the output arguments and finally
    /// the output path.
    pub fn command_args(&self, log_level: &str) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            log_level.to_string(),
        ];

        for input in &self.inputs {
            if let Some(ref format) = input.format {
                args.extend(["-f".to_string(), format.clone()]);
            }
            args.extend([
                "-i".to_string(),
                input.path.to_string_lossy().to_string(),
            ]);
        }

        args.extend(self.args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Outcome of a successful engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineReport {
    /// Output file size in bytes.
    pub output_size_bytes: u64,
    /// Wall time of the run in milliseconds.
    pub duration_ms: u64,
    /// Warning lines the engine printed while still succeeding.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Information about a media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// File path.
    pub path: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Container format (e.g., "mp3", "mov").
    pub format: String,
    /// Audio codec (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    /// Audio sample rate (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_sample_rate: Option<u32>,
    /// Audio channels (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_channels: Option<u8>,
    /// Video codec (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    /// Video width (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_width: Option<u32>,
    /// Video height (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_height: Option<u32>,
    /// Video frame rate (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_fps: Option<f32>,
}

impl MediaInfo {
    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }
}
