//! Media transcoding core: format sniffing, temp file staging, conversion
//! profiles, the ffmpeg engine and the conversion service tying them together.

pub mod config;
pub mod engine;
pub mod metrics;
pub mod profiles;
pub mod service;
pub mod sniffer;
pub mod staging;
pub mod testing;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, SanitizedConfig, ServerConfig,
};
pub use engine::{Engine, EngineConfig, EngineError, FfmpegEngine, MediaInfo};
pub use profiles::ConversionProfile;
pub use service::{
    ConversionError, ConversionOptions, ConversionOutput, ConversionResult, ConversionService,
    Operation, Position, ServiceConfig, ServiceError,
};
pub use sniffer::{sniff, MediaBuffer, MediaKind, SniffError, SniffedFormat};
pub use staging::{StagingConfig, StagingError, TempFile, TempFileManager};
