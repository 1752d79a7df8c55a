//! Time-Series Cache Binary
//!
//! Starts the HTTP cache server.
//!
//! # Usage
//!
//! ```bash
//! PORT=8080 cargo run --bin timeseries-cache
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `PORT`: HTTP listen port
//!
//! ## Optional
//! - `HOST`: Bind address (default: 0.0.0.0)
//! - `UPSTREAM_URL`: Catalog endpoint (default: <http://localhost:4000/timeseries>)
//! - `UPSTREAM_TIMEOUT_SECS`: Upstream request timeout (default: none)
//! - `CACHE_TTL_SECS`: Series TTL, 0 = no expiry (default: 600)
//! - `CACHE_CHECK_PERIOD_SECS`: Expiry sweep interval, 0 = disabled (default: 120)
//! - `METRICS_PORT`: Prometheus exporter port, 0 = disabled (default: 0)
//! - `LOG_DIR`: Also write `combined.log` and `error.log` here (default: unset)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use timeseries_cache::infrastructure::telemetry;
use timeseries_cache::{
    AppState, CacheSweeper, HttpServer, HttpTimeSeriesSource, RetrievalService, SeriesCache,
    ServiceConfig, init_metrics,
};

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();

    let telemetry_guard = telemetry::init();
    tracing::debug!(
        otel_export = telemetry_guard.is_exporting(),
        "Telemetry initialized"
    );

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "Fatal error, shutting down");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    if let Some(addr) = config.metrics_addr() {
        match init_metrics(addr) {
            Ok(bound) => tracing::info!(addr = %bound, "Prometheus exporter listening"),
            Err(e) => tracing::warn!(error = %e, "Prometheus exporter disabled"),
        }
    }

    let shutdown_token = CancellationToken::new();

    let cache = Arc::new(SeriesCache::new(config.cache));
    install_panic_hook(Arc::clone(&cache));

    let sweeper = tokio::spawn(CacheSweeper::new(Arc::clone(&cache), shutdown_token.clone()).run());

    let source =
        HttpTimeSeriesSource::new(&config.upstream).context("failed to build upstream client")?;
    let retrieval = Arc::new(RetrievalService::new(Arc::clone(&cache), Arc::new(source)));

    let server = HttpServer::bind(config.listen_addr(), AppState::new(retrieval)).await?;
    tracing::info!(
        "Backend is running on http://localhost:{}",
        config.server.port
    );

    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let served = server.run(shutdown_token.clone()).await;

    shutdown_token.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Cache sweeper task failed");
    }
    let stats = cache.stats();
    tracing::info!(
        hits = stats.hits,
        misses = stats.misses,
        keys = stats.keys,
        "Cache stats at shutdown"
    );
    cache.clear();

    served?;
    tracing::info!("Cache successfully flushed.");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &ServiceConfig) {
    tracing::info!(
        port = config.server.port,
        host = %config.server.host,
        metrics_port = config.server.metrics_port,
        ttl_secs = config.cache.default_ttl.as_secs(),
        check_period_secs = config.cache.check_period.as_secs(),
        "Configuration loaded"
    );
    tracing::debug!(upstream_url = %config.upstream.url, "Upstream endpoint");
}

/// Treat any panic as fatal: log it, drop cached data and exit non-zero.
fn install_panic_hook(cache: Arc<SeriesCache>) {
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(panic = %info, "Uncaught panic, shutting down");
        if !cache.try_clear() {
            tracing::warn!("Cache locked during panic, skipping flush");
        }
        std::process::exit(1);
    }));
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, flushing cache");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, flushing cache");
        }
    }

    shutdown_token.cancel();
}
