//! Service Configuration Settings
//!
//! Configuration types for the cache service, loaded from environment
//! variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::infrastructure::cache::CacheConfig;
use crate::infrastructure::upstream::UpstreamConfig;

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Bind address.
    pub host: IpAddr,
    /// HTTP port.
    pub port: u16,
    /// Prometheus exporter port (0 = disabled).
    pub metrics_port: u16,
}

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Listener settings.
    pub server: ServerSettings,
    /// Cache TTL and sweep settings.
    pub cache: CacheConfig,
    /// Upstream catalog settings.
    pub upstream: UpstreamConfig,
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is missing, empty or not a valid port.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is missing, empty or not a valid port.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = required_port(&lookup, "PORT")?;

        let host = parse_or(&lookup, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let metrics_port = parse_or(&lookup, "METRICS_PORT", 0u16);

        let defaults = CacheConfig::default();
        let cache = CacheConfig {
            default_ttl: parse_duration_secs(&lookup, "CACHE_TTL_SECS", defaults.default_ttl),
            check_period: parse_duration_secs(
                &lookup,
                "CACHE_CHECK_PERIOD_SECS",
                defaults.check_period,
            ),
        };

        let upstream_defaults = UpstreamConfig::default();
        let upstream = UpstreamConfig {
            url: lookup("UPSTREAM_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(upstream_defaults.url),
            timeout: Some(parse_duration_secs(
                &lookup,
                "UPSTREAM_TIMEOUT_SECS",
                Duration::ZERO,
            ))
            .filter(|t| !t.is_zero()),
        };

        Ok(Self {
            server: ServerSettings {
                host,
                port,
                metrics_port,
            },
            cache,
            upstream,
        })
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub const fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    /// Address of the Prometheus exporter, if enabled.
    #[must_use]
    pub const fn metrics_addr(&self) -> Option<SocketAddr> {
        if self.server.metrics_port == 0 {
            None
        } else {
            Some(SocketAddr::new(self.server.host, self.server.metrics_port))
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable could not be parsed.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Rejected value.
        value: String,
    },
}

fn required_port<F>(lookup: &F, key: &str) -> Result<u16, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }

    match trimmed.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}
