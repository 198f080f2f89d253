//! Types for the conversion service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::error::ConversionError;
use crate::sniffer::SniffedFormat;
use crate::staging::{StagingError, TempFile};

/// Flags callers may not pass through `extra_args`. Inputs, overwrite
/// behavior, the output muxer and filter graphs are owned by the service.
const RESERVED_FLAGS: &[&str] = &[
    "-i",
    "-y",
    "-n",
    "-f",
    "-vf",
    "-af",
    "-filter:v",
    "-filter:a",
    "-filter_complex",
    "-lavfi",
];

/// Output options accepted in `extra_args`, by name without stream
/// specifier, and whether each one takes a value.
const ALLOWED_FLAGS: &[(&str, bool)] = &[
    ("-c", true),
    ("-codec", true),
    ("-vcodec", true),
    ("-acodec", true),
    ("-b", true),
    ("-ab", true),
    ("-maxrate", true),
    ("-minrate", true),
    ("-bufsize", true),
    ("-crf", true),
    ("-q", true),
    ("-qscale", true),
    ("-preset", true),
    ("-tune", true),
    ("-profile", true),
    ("-level", true),
    ("-pix_fmt", true),
    ("-r", true),
    ("-s", true),
    ("-aspect", true),
    ("-g", true),
    ("-ar", true),
    ("-ac", true),
    ("-sample_fmt", true),
    ("-ss", true),
    ("-t", true),
    ("-to", true),
    ("-frames", true),
    ("-vframes", true),
    ("-aframes", true),
    ("-threads", true),
    ("-movflags", true),
    ("-metadata", true),
    ("-compression_level", true),
    ("-quality", true),
    ("-lossless", true),
    ("-loop", true),
    ("-application", true),
    ("-vbr", true),
    ("-cpu-used", true),
    ("-deadline", true),
    ("-row-mt", true),
    ("-tag", true),
    ("-fps_mode", true),
    ("-strict", true),
    ("-flags", true),
    ("-x264-params", true),
    ("-x265-params", true),
    ("-an", false),
    ("-vn", false),
    ("-sn", false),
    ("-dn", false),
    ("-shortest", false),
];

/// Whether an allowed flag takes a value, `None` when it is not allowed.
fn allowed_flag(arg: &str) -> Option<bool> {
    let name = arg.split_once(':').map_or(arg, |(name, _)| name);
    ALLOWED_FLAGS
        .iter()
        .find(|(flag, _)| *flag == name)
        .map(|(_, takes_value)| *takes_value)
}

/// Per-request options merged into a profile or operation.
#[derive(Debug, Clone, Default)]
pub struct ConversionOptions {
    /// Output container override, by extension (e.g. `mkv`).
    pub container: Option<String>,
    /// Codec/muxer arguments appended after the plan's own.
    pub extra_args: Vec<String>,
    /// Video filters applied before the plan's video filters.
    pub video_filters: Vec<String>,
    /// Audio filters applied before the plan's audio filters.
    pub audio_filters: Vec<String>,
    /// Return the output as a temp file handle instead of bytes.
    pub deferred: bool,
    /// Deadline for the engine run.
    pub timeout: Option<Duration>,
}

impl ConversionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends whitespace separated arguments, e.g. `"-pix_fmt yuv420p"`.
    pub fn with_arg_line(self, line: &str) -> Self {
        self.with_args(line.split_whitespace())
    }

    pub fn with_video_filter(mut self, filter: impl Into<String>) -> Self {
        self.video_filters.push(filter.into());
        self
    }

    pub fn with_audio_filter(mut self, filter: impl Into<String>) -> Self {
        self.audio_filters.push(filter.into());
        self
    }

    /// Requests a [`ConversionOutput::File`] result.
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Checks caller arguments and filters.
    ///
    /// Extra arguments must be allowed output flags, each followed by its
    /// value when it takes one. A bare token would become another output
    /// file, and values may not name paths.
    pub fn validate(&self) -> Result<(), ConversionError> {
        let mut args = self.extra_args.iter();
        while let Some(arg) = args.next() {
            if arg.trim().is_empty() {
                return Err(ConversionError::invalid_options("empty extra argument"));
            }
            if RESERVED_FLAGS.contains(&arg.as_str()) {
                return Err(ConversionError::invalid_options(format!(
                    "{arg} cannot be passed as an extra argument"
                )));
            }
            let Some(takes_value) = allowed_flag(arg) else {
                let reason = if arg.starts_with('-') {
                    format!("{arg} is not an allowed extra argument")
                } else {
                    format!("unexpected positional argument {arg}")
                };
                return Err(ConversionError::invalid_options(reason));
            };
            if !takes_value {
                continue;
            }
            let Some(value) = args.next() else {
                return Err(ConversionError::invalid_options(format!(
                    "{arg} needs a value"
                )));
            };
            if value.trim().is_empty() {
                return Err(ConversionError::invalid_options("empty extra argument"));
            }
            if value.contains(['/', '\\']) {
                return Err(ConversionError::invalid_options(format!(
                    "value of {arg} may not contain a path"
                )));
            }
        }
        if self
            .video_filters
            .iter()
            .chain(&self.audio_filters)
            .any(|f| f.trim().is_empty())
        {
            return Err(ConversionError::invalid_options("empty filter"));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConversionError::invalid_options("timeout must be positive"));
        }
        Ok(())
    }
}

/// Converted media, in memory or as a file the caller must release.
#[derive(Debug)]
pub enum ConversionOutput {
    Bytes(Vec<u8>),
    /// Deferred result. Call [`TempFile::release`] when done; dropping the
    /// handle also removes the file.
    File(TempFile),
}

impl ConversionOutput {
    /// Loads the output into memory, releasing the file form.
    pub async fn into_bytes(self) -> Result<Vec<u8>, StagingError> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::File(file) => file.into_bytes().await,
        }
    }
}

/// Result of a successful conversion.
#[derive(Debug)]
pub struct ConversionResult {
    /// Sniffed identity of the input.
    pub source: SniffedFormat,
    /// Output file extension.
    pub extension: String,
    /// Output media type.
    pub media_type: String,
    pub output: ConversionOutput,
    /// Time from sniffing to cleanup.
    pub elapsed: Duration,
}

/// Lifecycle of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Sniffed,
    Staged,
    Running,
    Completed,
    Failed,
    Cleaned,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sniffed => "sniffed",
            Self::Staged => "staged",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cleaned => "cleaned",
        };
        f.write_str(name)
    }
}

/// Snapshot of the service's conversion slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Maximum concurrent engine runs.
    pub max_parallel_conversions: usize,
    /// Requests holding a slot right now.
    pub active: usize,
    /// Requests waiting for a slot.
    pub queued: usize,
    /// Conversions completed since startup.
    pub total_completed: u64,
    /// Conversions failed since startup.
    pub total_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_line_is_flattened() {
        let options = ConversionOptions::new().with_arg_line("  -pix_fmt   yuv420p -r 30 ");
        assert_eq!(options.extra_args, vec!["-pix_fmt", "yuv420p", "-r", "30"]);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_reserved_flags_rejected() {
        for flag in ["-i", "-f", "-vf", "-filter_complex", "-y"] {
            let options = ConversionOptions::new().with_args([flag, "x"]);
            let err = options.validate().unwrap_err();
            assert!(
                matches!(err, ConversionError::InvalidOptions { .. }),
                "{flag} accepted"
            );
        }
    }

    #[test]
    fn test_bare_output_path_rejected() {
        let options = ConversionOptions::new().with_arg_line("-c copy /tmp/elsewhere.mp4");
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("positional"), "{err}");

        let options = ConversionOptions::new().with_arg_line("-an elsewhere.mp4");
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_file_reading_flags_rejected() {
        for line in [
            "-filter_complex_script graph.txt",
            "-attach cover.png",
            "-dump_attachment:t out.bin",
            "-map 0:a",
        ] {
            let options = ConversionOptions::new().with_arg_line(line);
            assert!(options.validate().is_err(), "{line} accepted");
        }
    }

    #[test]
    fn test_values_may_not_contain_paths() {
        let options = ConversionOptions::new().with_arg_line("-metadata title=../../etc/passwd");
        assert!(options.validate().is_err());

        let options = ConversionOptions::new().with_args(["-tag:v", "a\\b"]);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_stream_specifiers_and_switches_allowed() {
        let options =
            ConversionOptions::new().with_arg_line("-c:v libx264 -b:a 96k -an -crf 23 -shortest");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_missing_value_rejected() {
        let options = ConversionOptions::new().with_arg_line("-an -b:a");
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("needs a value"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let options = ConversionOptions::new().with_timeout(Duration::ZERO);
        assert!(options.validate().is_err());
    }

    #[tokio::test]
    async fn test_bytes_output_into_bytes() {
        let output = ConversionOutput::Bytes(vec![1, 2, 3]);
        assert_eq!(output.into_bytes().await.unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_request_state_display() {
        assert_eq!(RequestState::Running.to_string(), "running");
        assert_eq!(RequestState::Cleaned.to_string(), "cleaned");
    }
}
