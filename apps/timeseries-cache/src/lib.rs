#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Time-Series Cache - Market Data Caching Proxy
//!
//! An HTTP service that answers range queries over OHLC series, keeping every
//! `(symbol, period)` series in a process-local TTL cache and priming the
//! whole cache from an upstream catalog on the first miss.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Series types, keys, timestamp parsing and range filtering
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: The upstream catalog interface
//!   - `services`: Cache-or-fetch retrieval
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `cache`: TTL store with passive and periodic expiry
//!   - `upstream`: reqwest client for the catalog
//!   - `http`: axum router (`/`, `/api`, 404 fallback)
//!   - `config`, `telemetry`, `metrics`: ambient setup
//!
//! # Data Flow
//!
//! ```text
//! GET /api ──► RetrievalService ──hit──► filter range ──► 200
//!                    │
//!                   miss
//!                    ▼
//!             upstream catalog ──► prime every series ──► filter range ──► 200
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core time-series types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::series::{
    SeriesKey, TimeRange, TimeSeriesEntry, TimeSeriesSeries, TimestampError, parse_timestamp,
};

// Application
pub use application::ports::{TimeSeriesSource, UpstreamError};
pub use application::services::{RetrievalError, RetrievalService, SeriesCache};

// Infrastructure
pub use infrastructure::cache::{CacheConfig, CacheStats, CacheStore, CacheSweeper};
pub use infrastructure::config::{ConfigError, ServiceConfig};
pub use infrastructure::http::{AppState, HttpServer, create_router};
pub use infrastructure::metrics::init_metrics;
pub use infrastructure::upstream::{HttpTimeSeriesSource, UpstreamConfig};
