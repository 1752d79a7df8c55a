//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations behind the application layer: the TTL cache,
//! the HTTP catalog client, the axum server and the ambient plumbing.

/// In-process TTL key/value store and its expiry sweeper.
pub mod cache;

/// Environment-based configuration.
pub mod config;

/// HTTP API server.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry setup.
pub mod telemetry;

/// HTTP client for the upstream series catalog.
pub mod upstream;
