//! Application Services
//!
//! - `RetrievalService`: cache-or-fetch lookup of a series slice

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::application::ports::{TimeSeriesSource, UpstreamError};
use crate::domain::series::{SeriesKey, TimeRange, TimeSeriesEntry, TimeSeriesSeries};
use crate::infrastructure::cache::CacheStore;
use crate::infrastructure::metrics::{self, LookupResult, UpstreamOutcome};

/// Cache of full series keyed by `"{symbol}-{period}"`.
pub type SeriesCache = CacheStore<Arc<[TimeSeriesEntry]>>;

/// Message returned to clients for every retrieval failure.
pub const RETRIEVAL_FAILURE_MESSAGE: &str = "Failed to fetch data from external API";

/// Retrieval failure.
///
/// Both variants render the same client-facing message; the variant and
/// source exist for logging and tests only.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The upstream catalog could not be fetched.
    #[error("Failed to fetch data from external API")]
    Upstream(#[source] UpstreamError),

    /// The catalog did not contain the series, or it was empty.
    #[error("Failed to fetch data from external API")]
    SeriesNotFound {
        /// Cache key of the missing series.
        key: String,
    },
}

/// Serves range queries from the series cache, priming it from the upstream
/// catalog on a miss.
///
/// A miss fetches the *whole* catalog and writes every series it contains,
/// so one cold request warms the cache for all other (symbol, period) pairs
/// as well. Cached values are always complete series; slicing happens on
/// read. Concurrent misses are not coalesced: each issues its own upstream
/// request and the last bulk write wins.
pub struct RetrievalService {
    cache: Arc<SeriesCache>,
    source: Arc<dyn TimeSeriesSource>,
    series_ttl: Duration,
}

impl RetrievalService {
    /// Create a service writing series with the cache's default TTL.
    #[must_use]
    pub fn new(cache: Arc<SeriesCache>, source: Arc<dyn TimeSeriesSource>) -> Self {
        let series_ttl = cache.config().default_ttl;
        Self {
            cache,
            source,
            series_ttl,
        }
    }

    /// Override the TTL used for series written on a miss.
    #[must_use]
    pub fn with_series_ttl(mut self, ttl: Duration) -> Self {
        self.series_ttl = ttl;
        self
    }

    /// The backing cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<SeriesCache> {
        &self.cache
    }

    /// Entries of the series `key` whose timestamp lies in `range`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] if the cache misses and the upstream fails
    /// or does not contain a non-empty series for `key`.
    pub async fn fetch_range(
        &self,
        key: &SeriesKey,
        range: &TimeRange,
    ) -> Result<Vec<TimeSeriesEntry>, RetrievalError> {
        let cache_key = key.cache_key();

        if let Some(cached) = self.cache.get(&cache_key) {
            metrics::record_cache_lookup(LookupResult::Hit);
            let entries = range.filter(&cached);
            tracing::info!(
                key = %cache_key,
                returned = entries.len(),
                "Cache hit"
            );
            return Ok(entries);
        }

        metrics::record_cache_lookup(LookupResult::Miss);
        tracing::warn!(key = %cache_key, "Cache miss, fetching from upstream");

        let catalog = self.fetch_catalog().await?;
        match self.prime_cache(catalog, key) {
            Some(series) if !series.is_empty() => {
                let entries = range.filter(&series);
                tracing::info!(
                    key = %cache_key,
                    returned = entries.len(),
                    "Fetched and filtered upstream data"
                );
                Ok(entries)
            }
            _ => {
                tracing::error!(key = %cache_key, "Requested series not found upstream");
                Err(RetrievalError::SeriesNotFound { key: cache_key })
            }
        }
    }

    async fn fetch_catalog(&self) -> Result<Vec<TimeSeriesSeries>, RetrievalError> {
        let started = Instant::now();
        let result = self.source.fetch_all().await;
        let elapsed = started.elapsed();

        match result {
            Ok(catalog) => {
                metrics::record_upstream_request(UpstreamOutcome::Success, elapsed);
                tracing::debug!(
                    series = catalog.len(),
                    elapsed_ms = elapsed.as_millis(),
                    "Upstream catalog fetched"
                );
                Ok(catalog)
            }
            Err(e) => {
                metrics::record_upstream_request(UpstreamOutcome::Error, elapsed);
                tracing::error!(error = %e, "Error fetching data from upstream");
                Err(RetrievalError::Upstream(e))
            }
        }
    }

    /// Write every series of `catalog` to the cache and return the entries of
    /// the first series matching `requested`, if present. Duplicate keys
    /// overwrite each other in the cache, so the cache keeps the last one.
    fn prime_cache(
        &self,
        catalog: Vec<TimeSeriesSeries>,
        requested: &SeriesKey,
    ) -> Option<Arc<[TimeSeriesEntry]>> {
        let mut found = None;

        for series in catalog {
            let is_requested = series.matches(requested);
            let cache_key = series.key().cache_key();
            let entries: Arc<[TimeSeriesEntry]> = Arc::from(series.data);

            if is_requested && found.is_none() {
                found = Some(Arc::clone(&entries));
            }

            tracing::debug!(key = %cache_key, entries = entries.len(), "Series cached");
            self.cache.set_with_ttl(cache_key, entries, self.series_ttl);
        }

        found
    }
}

// =============================================================================
// Tests
// =============================================================================
