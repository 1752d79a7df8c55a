//! HTTP API
//!
//! # Endpoints
//!
//! - `GET /` - Liveness message and process uptime
//! - `GET /api?symbol=&period=&start=&end=` - Entries of one series within
//!   an inclusive time range
//!
//! Everything else, including other methods on the two routes above, answers
//! 404 with `{"status": false, "message": "Route not found!"}`.

mod error;
mod middleware;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::RetrievalService;
use crate::domain::series::{SeriesKey, TimeRange, TimeSeriesEntry};

pub use error::{ApiError, ErrorBody, MISSING_PARAMS_MESSAGE, ROUTE_NOT_FOUND_MESSAGE};
pub use middleware::{REQUEST_ID_HEADER, log_requests};

/// Body of `GET /`.
pub const HEALTH_MESSAGE: &str = "Backend cache server is up and running!";

// =============================================================================
// State
// =============================================================================

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    retrieval: Arc<RetrievalService>,
}

impl AppState {
    /// Create state with the uptime clock starting now.
    #[must_use]
    pub fn new(retrieval: Arc<RetrievalService>) -> Self {
        Self {
            started_at: Instant::now(),
            retrieval,
        }
    }

    /// The retrieval service behind `/api`.
    #[must_use]
    pub const fn retrieval(&self) -> &Arc<RetrievalService> {
        &self.retrieval
    }
}

// =============================================================================
// Router
// =============================================================================

/// Build the router with all endpoints and request logging.
#[must_use]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health).fallback(route_not_found))
        .route("/api", get(timeseries).fallback(route_not_found))
        .fallback(route_not_found)
        .layer(axum::middleware::from_fn(log_requests))
        .with_state(state)
}

// =============================================================================
// Server
// =============================================================================

/// HTTP server error.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind the listener.
    #[error("failed to bind {0}: {1}")]
    BindFailed(SocketAddr, String),
    /// The server stopped with an I/O error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

/// Default time in-flight requests get to finish after shutdown is signalled.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Bound HTTP server, ready to serve.
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
    shutdown_grace: Duration,
}

impl HttpServer {
    /// Bind `addr` and prepare the router for `state`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpServerError::BindFailed`] if the address is unavailable.
    pub async fn bind(addr: SocketAddr, state: AppState) -> Result<Self, HttpServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(addr, e.to_string()))?;

        Ok(Self {
            listener,
            router: create_router(state),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        })
    }

    /// Override how long in-flight requests may run after shutdown.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// The address actually bound.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, HttpServerError> {
        self.listener
            .local_addr()
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))
    }

    /// Serve until `cancel` fires, then drain in-flight requests for at most
    /// the shutdown grace period. Requests still running after that are
    /// abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`HttpServerError::ServerFailed`] if serving fails.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), HttpServerError> {
        let grace = self.shutdown_grace;
        let serve = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(cancel.clone().cancelled_owned())
            .into_future();
        tokio::pin!(serve);

        let drain_deadline = async {
            cancel.cancelled().await;
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            result = &mut serve => {
                result.map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;
            }
            () = drain_deadline => {
                tracing::warn!(
                    grace_ms = grace.as_millis(),
                    "In-flight requests still running after shutdown grace, abandoning them"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Body of `GET /`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `true`.
    pub status: bool,
    /// Fixed liveness message.
    pub message: &'static str,
    /// Whole seconds since the server state was created.
    pub uptime: u64,
}

/// Successful body of `GET /api`.
#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    /// Always `true`.
    pub status: bool,
    /// Matching entries in series order.
    pub data: Vec<TimeSeriesEntry>,
}

/// Query string of `GET /api`.
#[derive(Debug, Default, Deserialize)]
pub struct SeriesQuery {
    /// Instrument symbol.
    pub symbol: Option<String>,
    /// Bar period.
    pub period: Option<String>,
    /// Inclusive range start.
    pub start: Option<String>,
    /// Inclusive range end.
    pub end: Option<String>,
}

impl SeriesQuery {
    /// Validate into a series key and time range.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if any parameter is missing or empty.
    /// Bounds that are not timestamps yield a range matching nothing.
    pub fn into_request(self) -> Result<(SeriesKey, TimeRange), ApiError> {
        let (Some(symbol), Some(period), Some(start), Some(end)) = (
            non_empty(self.symbol),
            non_empty(self.period),
            non_empty(self.start),
            non_empty(self.end),
        ) else {
            return Err(ApiError::Validation(MISSING_PARAMS_MESSAGE));
        };

        let range = TimeRange::parse_or_empty(&start, &end);
        if range == TimeRange::EMPTY {
            tracing::debug!(%start, %end, "Unparseable range bounds, nothing will match");
        }

        Ok((SeriesKey::new(symbol, period), range))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: true,
        message: HEALTH_MESSAGE,
        uptime: state.started_at.elapsed().as_secs(),
    })
}

async fn timeseries(
    State(state): State<AppState>,
    query: Result<Query<SeriesQuery>, QueryRejection>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let query = query.map(|Query(q)| q).unwrap_or_default();

    let (key, range) = query.into_request().inspect_err(|e| {
        tracing::warn!(reason = e.message(), "Rejected series request");
    })?;

    let data = state.retrieval.fetch_range(&key, &range).await?;

    Ok(Json(SeriesResponse { status: true, data }))
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound
}

// =============================================================================
// Tests
// =============================================================================
