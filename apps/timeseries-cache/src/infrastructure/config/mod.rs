//! Configuration Module
//!
//! Configuration loading for the cache service.

mod settings;

pub use settings::{ConfigError, ServerSettings, ServiceConfig};
