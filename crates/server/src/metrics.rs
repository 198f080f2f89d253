//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the mediaforge server:
//! - HTTP request metrics (latency, counts, payload sizes)
//! - Conversion slot usage (collected dynamically)
//! - Core conversion and staging metrics, registered from `mediaforge_core`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;
use tracing::warn;

use mediaforge_core::profiles;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediaforge_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediaforge_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediaforge_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Request body sizes in bytes, by route.
pub static HTTP_REQUEST_BODY_BYTES: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediaforge_http_request_body_bytes",
            "Size of uploaded media in bytes",
        )
        .buckets(prometheus::exponential_buckets(1024.0, 4.0, 10).unwrap()),
        &["path"],
    )
    .unwrap()
});

// =============================================================================
// Service Metrics (collected dynamically)
// =============================================================================

/// Conversions holding a slot.
pub static SERVICE_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediaforge_service_active_conversions",
        "Conversions currently holding a slot",
    )
    .unwrap()
});

/// Conversions waiting for a slot.
pub static SERVICE_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediaforge_service_queued_conversions",
        "Conversions waiting for a free slot",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUEST_BODY_BYTES.clone()))
        .unwrap();

    // Service
    registry.register(Box::new(SERVICE_ACTIVE.clone())).unwrap();
    registry.register(Box::new(SERVICE_QUEUED.clone())).unwrap();

    // Core metrics (conversions, staging)
    for metric in mediaforge_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.service().status();
    SERVICE_ACTIVE.set(status.active as i64);
    SERVICE_QUEUED.set(status.queued as i64);
}

static CONVERT_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/api/v1/convert/([^/]+)$").unwrap());
static CONTAINER_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/api/v1/ops/container/[^/]+$").unwrap());

/// Routes without path parameters.
const STATIC_ROUTES: &[&str] = &[
    "/metrics",
    "/api/v1/health",
    "/api/v1/config",
    "/api/v1/profiles",
    "/api/v1/status",
    "/api/v1/ops/crop",
    "/api/v1/ops/scale",
    "/api/v1/ops/trim",
    "/api/v1/ops/frame",
    "/api/v1/ops/frames",
    "/api/v1/ops/waveform",
    "/api/v1/ops/reverse",
];

/// Label for paths that match no route.
pub const UNMATCHED_PATH: &str = "{unmatched}";

/// Normalize a path for metric labels.
///
/// Unknown profile names and container names collapse into placeholders,
/// and paths outside the router share one label, so label cardinality
/// stays bounded.
pub fn normalize_path(path: &str) -> String {
    if STATIC_ROUTES.contains(&path) {
        return path.to_string();
    }
    if let Some(caps) = CONVERT_SEGMENT.captures(path) {
        return match profiles::find(&caps[1]) {
            Some(profile) => format!("/api/v1/convert/{}", profile.name),
            None => "/api/v1/convert/{profile}".to_string(),
        };
    }
    if CONTAINER_SEGMENT.is_match(path) {
        return "/api/v1/ops/container/{name}".to_string();
    }
    UNMATCHED_PATH.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_known_profile() {
        let path = "/api/v1/convert/toAudio";
        assert_eq!(normalize_path(path), "/api/v1/convert/toAudio");
    }

    #[test]
    fn test_normalize_path_profile_case_folds() {
        assert_eq!(normalize_path("/api/v1/convert/TOAUDIO"), "/api/v1/convert/toAudio");
    }

    #[test]
    fn test_normalize_path_unknown_profile() {
        let path = "/api/v1/convert/definitely-not-a-profile";
        assert_eq!(normalize_path(path), "/api/v1/convert/{profile}");
    }

    #[test]
    fn test_normalize_path_container() {
        let path = "/api/v1/ops/container/mkv";
        assert_eq!(normalize_path(path), "/api/v1/ops/container/{name}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
    }

    #[test]
    fn test_normalize_path_unmatched() {
        for path in [
            "/wp-admin/setup.php",
            "/api/v1/nope",
            "/api/v2/convert/toAudio",
            "/api/v1/convert/toAudio/extra",
            "/api/v1/health/",
        ] {
            assert_eq!(normalize_path(path), UNMATCHED_PATH, "{path}");
        }
    }

    #[test]
    fn test_normalize_path_static_routes() {
        assert_eq!(normalize_path("/metrics"), "/metrics");
        assert_eq!(normalize_path("/api/v1/ops/frames"), "/api/v1/ops/frames");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        // Access metrics to ensure they're initialized
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("mediaforge_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        // Prometheus only outputs vectors that have been accessed
        HTTP_REQUEST_DURATION
            .with_label_values(&["POST", "/api/v1/convert/toAudio", "200"])
            .observe(0.1);
        mediaforge_core::metrics::CONVERSIONS_TOTAL
            .with_label_values(&["toAudio", "success"])
            .inc();
        SERVICE_ACTIVE.set(0);

        let output = encode_metrics();

        assert!(output.contains("mediaforge_http_request_duration_seconds"));
        assert!(output.contains("mediaforge_http_requests_in_flight"));
        assert!(output.contains("mediaforge_service_active_conversions"));
        assert!(output.contains("mediaforge_conversions_total"));
        assert!(output.contains("mediaforge_cleanup_failures_total"));
    }
}
