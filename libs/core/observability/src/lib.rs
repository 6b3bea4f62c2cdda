//! Observability utilities for the spot price tool.
//!
//! This crate provides:
//! - Prometheus metrics recording and text rendering
//! - Custom metrics for regional fetches, the instance-type catalog and reports
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, render_metrics, SpotMetrics};
//!
//! init_metrics();
//! SpotMetrics::record_catalog_page(100);
//! eprintln!("{}", render_metrics());
//! ```

pub mod spot;

pub use spot::{RunTimer, SpotMetrics};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup. Until then every metric call is a no-op.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;

        info!("Prometheus metrics recorder initialized");

        register_metric_descriptions();

        Ok(handle)
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Prometheus text exposition of everything recorded so far
pub fn render_metrics() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    describe_counter!(
        "spot_region_fetches_total",
        "Regional price history queries by outcome"
    );
    describe_counter!(
        "spot_quotes_total",
        "Quotes kept after client-side filtering, by region"
    );
    describe_histogram!(
        "spot_region_fetch_duration_seconds",
        "Regional price history query duration in seconds"
    );
    describe_counter!(
        "spot_catalog_pages_total",
        "Instance-type catalog pages fetched"
    );
    describe_counter!(
        "spot_catalog_items_total",
        "Instance-type names received from the catalog"
    );
    describe_gauge!(
        "spot_quotes_reported",
        "Quotes in the last rendered report"
    );
    describe_histogram!(
        "spot_run_duration_seconds",
        "Duration of a whole run by mode"
    );
}
