//! Transcoding engine invocation.
//!
//! This module provides the `Engine` trait and an FFmpeg-backed implementation
//! that runs one external process per conversion.
//!
//! # Behavior
//!
//! - Arguments are passed as a flat vector, never through a shell
//! - Each input may carry an explicit demuxer hint (`-f` before `-i`)
//! - stderr is drained line by line; a bounded tail is kept for diagnostics
//! - A run that exceeds its deadline is killed and reported as a timeout
//! - Exit status 0 with a missing or empty output file is a failure
//!
//! # Example
//!
//! ```ignore
//! use mediaforge_core::engine::{Engine, EngineInput, EngineInvocation, FfmpegEngine};
//!
//! let engine = FfmpegEngine::with_defaults();
//! engine.validate().await?;
//!
//! let invocation = EngineInvocation {
//!     inputs: vec![EngineInput::with_format("/tmp/in.wav", "wav")],
//!     args: vec!["-c:a".into(), "libmp3lame".into()],
//!     output: PathBuf::from("/tmp/out.mp3"),
//!     timeout: None,
//! };
//! let report = engine.run(&invocation).await?;
//! println!("Wrote {} bytes in {} ms", report.output_size_bytes, report.duration_ms);
//! ```

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::EngineConfig;
pub use error::EngineError;
pub use ffmpeg::FfmpegEngine;
pub use traits::Engine;
pub use types::{EngineInput, EngineInvocation, EngineReport, MediaInfo};
