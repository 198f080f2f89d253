use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::engine::EngineConfig;
use crate::service::ServiceConfig;
use crate::staging::StagingConfig;

/// Top-level configuration. Every section has defaults, so an empty file is
/// a valid configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Temp file directory and naming.
    #[serde(default)]
    pub staging: StagingConfig,
    /// ffmpeg/ffprobe binaries and run limits.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Conversion concurrency.
    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024 // 64 MiB
}

/// Configuration as exposed by the API. Binary locations are reduced to
/// their file names.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub staging: SanitizedStagingConfig,
    pub engine: SanitizedEngineConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStagingConfig {
    pub prefix: String,
    pub stale_after_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEngineConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub log_level: String,
    pub timeout_secs: u64,
}

fn binary_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            staging: SanitizedStagingConfig {
                prefix: config.staging.prefix.clone(),
                stale_after_secs: config.staging.stale_after_secs,
            },
            engine: SanitizedEngineConfig {
                ffmpeg: binary_name(&config.engine.ffmpeg_path),
                ffprobe: binary_name(&config.engine.ffprobe_path),
                log_level: config.engine.log_level.clone(),
                timeout_secs: config.engine.timeout_secs,
            },
            service: config.service.clone(),
        }
    }
}
