//! Upstream Catalog Client
//!
//! HTTP implementation of [`TimeSeriesSource`]. One GET returns the full
//! catalog; the body is validated here so nothing malformed ever reaches
//! the cache.

use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::{TimeSeriesSource, UpstreamError};
use crate::domain::series::TimeSeriesSeries;

/// Default catalog endpoint.
pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:4000/timeseries";

/// Upstream client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Catalog endpoint.
    pub url: String,
    /// Request timeout. `None` leaves the transport default in place.
    pub timeout: Option<Duration>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.to_string(),
            timeout: None,
        }
    }
}

/// Fetches the series catalog over HTTP. Single attempt, no retries.
#[derive(Debug, Clone)]
pub struct HttpTimeSeriesSource {
    client: reqwest::Client,
    url: String,
}

impl HttpTimeSeriesSource {
    /// Create a client for `config.url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| UpstreamError::Transport {
            message: e.to_string(),
        })?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// Catalog endpoint.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TimeSeriesSource for HttpTimeSeriesSource {
    async fn fetch_all(&self) -> Result<Vec<TimeSeriesSeries>, UpstreamError> {
        tracing::debug!(url = %self.url, "Requesting upstream catalog");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| UpstreamError::Transport {
            message: e.to_string(),
        })?;

        decode_catalog(&body)
    }
}

/// Decode and validate a catalog response body.
///
/// Every entry must carry a parseable timestamp and numeric OHLC fields, and
/// every series a non-empty symbol and period.
///
/// # Errors
///
/// Returns [`UpstreamError::InvalidPayload`] describing the first problem.
pub fn decode_catalog(body: &[u8]) -> Result<Vec<TimeSeriesSeries>, UpstreamError> {
    let catalog: Vec<TimeSeriesSeries> =
        serde_json::from_slice(body).map_err(|e| UpstreamError::InvalidPayload {
            message: e.to_string(),
        })?;

    if let Some(index) = catalog
        .iter()
        .position(|s| s.symbol.trim().is_empty() || s.period.trim().is_empty())
    {
        return Err(UpstreamError::InvalidPayload {
            message: format!("series at index {index} has an empty symbol or period"),
        });
    }

    Ok(catalog)
}
