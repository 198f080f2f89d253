use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - At least one conversion slot
/// - Engine timeout is not 0
/// - Staging prefix is a plain file name fragment
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.service.max_parallel_conversions == 0 {
        return Err(ConfigError::ValidationError(
            "service.max_parallel_conversions cannot be 0".to_string(),
        ));
    }

    if config.engine.timeout_secs == 0 || config.service.timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "conversion timeouts cannot be 0".to_string(),
        ));
    }

    let prefix = &config.staging.prefix;
    if prefix.is_empty() || prefix.contains(['/', '\\']) {
        return Err(ConfigError::ValidationError(format!(
            "staging.prefix must be a non-empty name without path separators, got {prefix:?}"
        )));
    }

    Ok(())
}
