//! Spot price query metrics.

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Spot metrics recorder
pub struct SpotMetrics;

impl SpotMetrics {
    // =========================================================================
    // Regional Fetch Metrics
    // =========================================================================

    /// Record the outcome of one regional price history query.
    ///
    /// `status` is one of `ok`, `empty`, `denied`, `failed`, `timeout`.
    pub fn record_region_fetch(region: &str, status: &'static str, quotes: usize, elapsed: Duration) {
        counter!("spot_region_fetches_total", "status" => status).increment(1);
        counter!("spot_quotes_total", "region" => region.to_string()).increment(quotes as u64);
        histogram!("spot_region_fetch_duration_seconds", "status" => status)
            .record(elapsed.as_secs_f64());

        tracing::trace!(
            region = region,
            status = status,
            quotes = quotes,
            elapsed_ms = elapsed.as_millis() as u64,
            "Recorded region fetch"
        );
    }

    // =========================================================================
    // Catalog Metrics
    // =========================================================================

    /// Record one page of the instance-type catalog
    pub fn record_catalog_page(items: usize) {
        counter!("spot_catalog_pages_total").increment(1);
        counter!("spot_catalog_items_total").increment(items as u64);
    }

    // =========================================================================
    // Report Metrics
    // =========================================================================

    /// Set the number of quotes in the final report
    pub fn set_quotes_reported(count: usize) {
        gauge!("spot_quotes_reported").set(count as f64);
    }
}

/// Timer guard for a whole query run.
///
/// Records the duration when `stop()` is called or when dropped.
pub struct RunTimer {
    start: Instant,
    mode: &'static str,
    stopped: bool,
}

impl RunTimer {
    pub fn start(mode: &'static str) -> Self {
        Self {
            start: Instant::now(),
            mode,
            stopped: false,
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(&mut self) -> Duration {
        let elapsed = self.start.elapsed();
        if !self.stopped {
            self.stopped = true;
            histogram!("spot_run_duration_seconds", "mode" => self.mode).record(elapsed.as_secs_f64());
        }
        elapsed
    }
}

impl Drop for RunTimer {
    fn drop(&mut self) {
        if !self.stopped {
            self.stop();
        }
    }
}
