//! Prometheus metrics for the query and submission endpoints.
//!
//! Names follow `my_places_{area}_{name}[_total]`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::{info, warn};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

macro_rules! places_metric {
    (counter, $area:literal, $name:literal) => {
        concat!("my_places_", $area, "_", $name, "_total")
    };
    (histogram, $area:literal, $name:literal) => {
        concat!("my_places_", $area, "_", $name)
    };
}

/// Install the Prometheus recorder. Idempotent; later calls return the first handle.
pub fn init_metrics() -> Option<PrometheusHandle> {
    if let Some(handle) = HANDLE.get() {
        return Some(handle.clone());
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("Prometheus recorder installed");
            Some(HANDLE.get_or_init(|| handle).clone())
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    }
}

/// Render the current snapshot, or an empty body when no recorder is installed.
pub fn render() -> String {
    HANDLE.get().map(|h| h.render()).unwrap_or_default()
}

pub struct PlacesMetrics;

impl PlacesMetrics {
    pub fn record_query() {
        ::metrics::counter!(places_metric!(counter, "query", "requests")).increment(1);
    }

    pub fn record_empty_result() {
        ::metrics::counter!(places_metric!(counter, "query", "empty")).increment(1);
    }

    pub fn record_result_size(count: usize) {
        ::metrics::histogram!(places_metric!(histogram, "query", "result_size")).record(count as f64);
    }

    pub fn record_submission_accepted() {
        ::metrics::counter!(places_metric!(counter, "submissions", "accepted")).increment(1);
    }

    pub fn record_submission_failed() {
        ::metrics::counter!(places_metric!(counter, "submissions", "failed")).increment(1);
    }

    /// Token check failed; nothing was persisted.
    pub fn record_submission_rejected() {
        ::metrics::counter!(places_metric!(counter, "submissions", "rejected")).increment(1);
    }
}
