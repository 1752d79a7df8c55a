//! Time-Series Types
//!
//! OHLC entries, per-(symbol, period) series, cache keys and the inclusive
//! time range used to slice a full series at read time.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Entries and Series
// =============================================================================

/// A single OHLC sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesEntry {
    /// Sample timestamp, normalized to UTC.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub time: DateTime<Utc>,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
}

/// The full series for one symbol and period, as served by the upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesSeries {
    /// Instrument symbol (e.g. "AAPL").
    pub symbol: String,
    /// Sampling period (e.g. "1min").
    pub period: String,
    /// Entries, chronological by convention only.
    #[serde(default)]
    pub data: Vec<TimeSeriesEntry>,
}

impl TimeSeriesSeries {
    /// Key identifying this series in the cache.
    #[must_use]
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.symbol.clone(), self.period.clone())
    }

    /// Whether this series is the one identified by `key`.
    #[must_use]
    pub fn matches(&self, key: &SeriesKey) -> bool {
        self.symbol == key.symbol && self.period == key.period
    }
}

// =============================================================================
// Series Key
// =============================================================================

/// Identifies one full series: a (symbol, period) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    symbol: String,
    period: String,
}

impl SeriesKey {
    /// Create a key.
    #[must_use]
    pub fn new(symbol: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            period: period.into(),
        }
    }

    /// Symbol component.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Period component.
    #[must_use]
    pub fn period(&self) -> &str {
        &self.period
    }

    /// Cache key string, `"{symbol}-{period}"`.
    #[must_use]
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.symbol, self.period)
    }
}

// =============================================================================
// Time Range
// =============================================================================

/// Inclusive `[start, end]` range of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a range. `start > end` is allowed and matches nothing.
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// A range that contains no instant.
    pub const EMPTY: Self = Self::new(DateTime::<Utc>::MAX_UTC, DateTime::<Utc>::MIN_UTC);

    /// Parse both bounds with [`parse_timestamp`].
    ///
    /// # Errors
    ///
    /// Returns the first bound that fails to parse.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimestampError> {
        Ok(Self::new(parse_timestamp(start)?, parse_timestamp(end)?))
    }

    /// Parse both bounds, falling back to [`TimeRange::EMPTY`] when either
    /// is not a timestamp.
    #[must_use]
    pub fn parse_or_empty(start: &str, end: &str) -> Self {
        Self::parse(start, end).unwrap_or(Self::EMPTY)
    }

    /// Lower bound.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Upper bound.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `time` lies within the range, bounds included.
    #[must_use]
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start <= time && time <= self.end
    }

    /// Entries whose timestamp lies within the range, in input order.
    #[must_use]
    pub fn filter(&self, entries: &[TimeSeriesEntry]) -> Vec<TimeSeriesEntry> {
        entries
            .iter()
            .filter(|entry| self.contains(entry.time))
            .cloned()
            .collect()
    }
}

// =============================================================================
// Timestamp Parsing
// =============================================================================

/// A timestamp string that none of the accepted formats could parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp: {input:?}")]
pub struct TimestampError {
    /// The rejected input.
    pub input: String,
}

/// Parse a timestamp into a UTC instant.
///
/// Accepts RFC 3339 with any offset, a naive date-time (`T` or space
/// separated, optional fraction) taken as UTC, or a bare date taken as
/// midnight UTC.
///
/// # Errors
///
/// Returns [`TimestampError`] when no format matches.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TimestampError {
            input: input.to_string(),
        })
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

// =============================================================================
// Tests
// =============================================================================
