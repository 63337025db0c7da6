//! Pipeline metrics collection.
//!
//! Provides standardized metrics for monitoring acquire rounds:
//! - Candidate outcomes by failure kind
//! - Round and download latency histograms
//! - Search attempt counters

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Candidates reaching a terminal state, by outcome.
    pub const CANDIDATES_TOTAL: &str = "vscrape_candidates_total";

    /// Wall-clock duration of one acquire round.
    pub const ACQUIRE_DURATION_SECONDS: &str = "vscrape_acquire_duration_seconds";

    /// Duration of successful downloads.
    pub const DOWNLOAD_DURATION_SECONDS: &str = "vscrape_download_duration_seconds";

    /// Search attempts by status.
    pub const SEARCH_ATTEMPTS_TOTAL: &str = "vscrape_search_attempts_total";
}

/// Install the Prometheus recorder and serve `/metrics` on `port`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .install()
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record a candidate's terminal outcome (`done` or a failure kind).
pub fn record_candidate(outcome: &str) {
    counter!(
        names::CANDIDATES_TOTAL,
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a finished acquire round.
pub fn record_acquire(duration_secs: f64, met_target: bool) {
    histogram!(
        names::ACQUIRE_DURATION_SECONDS,
        "met_target" => met_target.to_string()
    )
    .record(duration_secs);
}

pub fn record_download_duration(duration_secs: f64) {
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration_secs);
}

/// Record a search attempt (`ok` or `error`).
pub fn record_search_attempt(status: &str) {
    counter!(
        names::SEARCH_ATTEMPTS_TOTAL,
        "status" => status.to_string()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================
