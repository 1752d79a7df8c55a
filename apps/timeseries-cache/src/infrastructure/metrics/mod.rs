//! Prometheus Metrics Module
//!
//! Exposes cache, upstream and HTTP metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Cache**: lookups by result, live entries, expirations
//! - **Upstream**: catalog requests by outcome and their latency
//! - **HTTP**: requests by method/status and their latency
//!
//! # Integration
//!
//! When a metrics port is configured, the exporter serves `/metrics` on its
//! own listener so the public route table stays untouched. Without it no
//! recorder is installed and every recording call is a no-op.

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// =============================================================================
// Exporter Installation
// =============================================================================

static EXPORTER_ADDR: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within a tokio runtime. Subsequent calls are no-ops
/// and return the address of the first installation.
///
/// # Errors
///
/// Returns an error if the recorder or listener cannot be installed.
pub fn init_metrics(addr: SocketAddr) -> Result<SocketAddr, BuildError> {
    if let Some(existing) = EXPORTER_ADDR.get() {
        return Ok(*existing);
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    register_metrics();
    Ok(*EXPORTER_ADDR.get_or_init(|| addr))
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "timeseries_cache_lookups_total",
        "Series cache lookups by result"
    );
    describe_gauge!(
        "timeseries_cache_entries",
        "Number of entries held in the series cache"
    );
    describe_counter!(
        "timeseries_cache_expired_total",
        "Series cache entries removed after their TTL elapsed"
    );

    describe_counter!(
        "timeseries_cache_upstream_requests_total",
        "Upstream catalog requests by outcome"
    );
    describe_histogram!(
        "timeseries_cache_upstream_request_seconds",
        "Upstream catalog request latency"
    );

    describe_counter!(
        "timeseries_cache_http_requests_total",
        "HTTP requests served by method and status"
    );
    describe_histogram!(
        "timeseries_cache_http_request_seconds",
        "HTTP request handling latency"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Result label for cache lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    /// Value served from cache.
    Hit,
    /// Value absent or expired.
    Miss,
}

impl LookupResult {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

/// Outcome label for upstream requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamOutcome {
    /// Catalog fetched and decoded.
    Success,
    /// Transport, status or payload failure.
    Error,
}

impl UpstreamOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Record a series cache lookup.
pub fn record_cache_lookup(result: LookupResult) {
    counter!(
        "timeseries_cache_lookups_total",
        "result" => result.as_str()
    )
    .increment(1);
}

/// Update the cache entry gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_cache_entries(count: usize) {
    gauge!("timeseries_cache_entries").set(count as f64);
}

/// Record entries removed by expiry.
pub fn record_cache_expired(count: u64) {
    counter!("timeseries_cache_expired_total").increment(count);
}

/// Record an upstream catalog request.
pub fn record_upstream_request(outcome: UpstreamOutcome, duration: Duration) {
    counter!(
        "timeseries_cache_upstream_requests_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!("timeseries_cache_upstream_request_seconds").record(duration.as_secs_f64());
}

/// Record a served HTTP request.
pub fn record_http_request(method: &str, status: u16, duration: Duration) {
    counter!(
        "timeseries_cache_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "timeseries_cache_http_request_seconds",
        "method" => method.to_string()
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
