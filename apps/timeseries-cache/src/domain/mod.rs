//! Domain Layer - Core time-series types.
//!
//! Pure types with serialization support and no I/O.

/// OHLC entries, series keys and range filtering.
pub mod series;
