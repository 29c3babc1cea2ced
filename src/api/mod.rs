//! Read-only REST API over a finalized trajectory.
//!
//! Provides three GET endpoints:
//! - `/channels`: recorded channels and the time reached
//! - `/series/{group}/{component}/{signal}`: one channel, optionally windowed
//! - `/metrics`: response metrics of the plotted signals

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::extract::{Channel, Extractor};
use crate::sim::metrics::ResponseMetrics;

pub use types::{ChannelInfo, ChannelsResponse, ErrorResponse, MetricsRecord, SeriesResponse};

/// Immutable application state shared across all request handlers.
///
/// Constructed once after the study completes and wrapped in `Arc`; no
/// locks are needed since all data is read-only.
pub struct AppState {
    /// Final simulated time (s).
    pub final_time: f64,
    /// Query handle over the finalized trajectory.
    pub extractor: Extractor,
    /// Metrics of the plotted signals.
    pub metrics: Vec<(Channel, ResponseMetrics)>,
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/channels", get(handlers::get_channels))
        .route(
            "/series/{group}/{component}/{signal}",
            get(handlers::get_series),
        )
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
}

/// Binds to the given address and serves the API until the process exits.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
