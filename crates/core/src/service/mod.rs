//! Conversion service.
//!
//! The public entry point for turning a media buffer into another format.
//! A request is either a named profile (see [`crate::profiles`]) or an ad-hoc
//! [`Operation`]; both render to a [`TranscodePlan`] and run through the same
//! pipeline:
//!
//! 1. Sniff the input; unknown formats fail before anything touches disk
//! 2. Stage the input and reserve an output path
//! 3. Run the engine with the plan's flattened arguments
//! 4. Read the output back (or hand it over as a [`ConversionOutput::File`])
//! 5. Release the temp files, whatever happened
//!
//! # Example
//!
//! ```ignore
//! use mediaforge_core::service::{ConversionOptions, ConversionService, ServiceConfig};
//!
//! let service = ConversionService::new(ServiceConfig::default(), staging, engine);
//! let result = service.convert(&bytes, "toAudio", ConversionOptions::default()).await?;
//! println!("{} -> {}", result.source.extension, result.extension);
//! ```

mod config;
mod error;
mod frames;
mod operations;
mod pipeline;
mod plan;
mod types;

pub use config::ServiceConfig;
pub use error::{ConversionError, ServiceError};
pub use frames::split_jpeg_stream;
pub use operations::{Operation, Position, MJPEG_OUTPUT};
pub use pipeline::ConversionService;
pub use plan::TranscodePlan;
pub use types::{
    ConversionOptions, ConversionOutput, ConversionResult, RequestState, ServiceStatus,
};
