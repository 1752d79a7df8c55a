//! Port Interfaces
//!
//! ## Driven Ports (Outbound)
//!
//! - `TimeSeriesSource`: the upstream catalog of every known series

use async_trait::async_trait;

use crate::domain::series::TimeSeriesSeries;

/// Upstream catalog failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// Request could not be sent or the response body could not be read.
    #[error("upstream request failed: {message}")]
    Transport {
        /// Error details.
        message: String,
    },

    /// Upstream answered with a non-success status.
    #[error("upstream returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Response body is not a valid series catalog.
    #[error("invalid upstream payload: {message}")]
    InvalidPayload {
        /// Error details.
        message: String,
    },
}

/// Source of the full series catalog.
///
/// One call returns every series the upstream knows about, regardless of
/// which one the caller is interested in.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TimeSeriesSource: Send + Sync {
    /// Fetch the complete catalog.
    async fn fetch_all(&self) -> Result<Vec<TimeSeriesSeries>, UpstreamError>;
}
