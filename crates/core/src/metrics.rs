//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Conversions (attempts by result, duration, in flight)
//! - Staging (bytes staged, cleanup failures)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Conversion Metrics
// =============================================================================

/// Conversions total by operation and result.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediaforge_conversions_total", "Total conversion requests"),
        &["operation", "result"], // result: "success", "failed", "rejected"
    )
    .unwrap()
});

/// Conversion duration in seconds, staging to cleanup.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediaforge_conversion_duration_seconds",
            "Duration of a conversion request",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["operation"],
    )
    .unwrap()
});

/// Engine processes currently running.
pub static CONVERSIONS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediaforge_conversions_in_flight",
        "Number of engine processes currently running",
    )
    .unwrap()
});

// =============================================================================
// Staging Metrics
// =============================================================================

/// Bytes written to the staging directory.
pub static STAGED_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediaforge_staged_bytes_total",
        "Total bytes written to the staging directory",
    )
    .unwrap()
});

/// Temp file releases that failed.
pub static CLEANUP_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediaforge_cleanup_failures_total",
        "Temp file releases that failed",
    )
    .unwrap()
});

/// All core metrics, for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(CONVERSIONS_IN_FLIGHT.clone()),
        Box::new(STAGED_BYTES.clone()),
        Box::new(CLEANUP_FAILURES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_registers() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        CONVERSIONS_TOTAL
            .with_label_values(&["toAudio", "success"])
            .inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "mediaforge_conversions_total"));
    }
}
