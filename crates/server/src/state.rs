use std::sync::Arc;
use std::time::Duration;

use mediaforge_core::{Config, ConversionService, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    service: Arc<ConversionService>,
}

impl AppState {
    pub fn new(config: Config, service: Arc<ConversionService>) -> Self {
        Self { config, service }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Longest deadline a request may ask for: the service deadline, or the
    /// engine's when the service sets none.
    pub fn max_timeout(&self) -> Duration {
        Duration::from_secs(
            self.config
                .service
                .timeout_secs
                .unwrap_or(self.config.engine.timeout_secs),
        )
    }

    pub fn service(&self) -> &ConversionService {
        self.service.as_ref()
    }
}
