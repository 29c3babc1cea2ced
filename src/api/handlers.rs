//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use super::AppState;
use super::types::{
    ChannelInfo, ChannelsResponse, ErrorResponse, MetricsRecord, SeriesResponse, WindowQuery,
};
use crate::extract::{Signal, SignalGroup};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: String) -> ApiError {
    (status, Json(ErrorResponse { error: message }))
}

/// Lists recorded channels.
///
/// `GET /channels` → 200 + `ChannelsResponse` JSON
pub async fn get_channels(State(state): State<Arc<AppState>>) -> Json<ChannelsResponse> {
    Json(ChannelsResponse {
        final_time: state.final_time,
        samples: state.extractor.trajectory().len(),
        channels: state
            .extractor
            .channels()
            .iter()
            .map(ChannelInfo::from)
            .collect(),
    })
}

/// Returns one channel, optionally restricted to a time window.
///
/// `GET /series/sync/g5/S` → 200 + `SeriesResponse` JSON
/// `GET /series/sync/g5/S?from=5&to=20` → samples with 5 <= t <= 20
/// `GET /series/sync/g9/S` → 404 + `ErrorResponse`
/// `GET /series/sync/g5/S?from=20&to=5` → 400 + `ErrorResponse`
pub async fn get_series(
    State(state): State<Arc<AppState>>,
    Path((group, component, signal)): Path<(String, String, String)>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let group: SignalGroup = group
        .parse()
        .map_err(|e: String| error(StatusCode::BAD_REQUEST, e))?;
    let signal = Signal::from_code(group, &signal).ok_or_else(|| {
        error(
            StatusCode::BAD_REQUEST,
            format!("unknown {group} signal \"{signal}\""),
        )
    })?;

    let from = query.from.unwrap_or(f64::NEG_INFINITY);
    let to = query.to.unwrap_or(f64::INFINITY);
    if from > to {
        return Err(error(
            StatusCode::BAD_REQUEST,
            format!("`from` ({from}) must be <= `to` ({to})"),
        ));
    }

    let series = state
        .extractor
        .series(&component, signal)
        .map_err(|e| error(StatusCode::NOT_FOUND, e.to_string()))?;
    Ok(Json(SeriesResponse::windowed(&series, from, to)))
}

/// Returns the response metrics of every plotted signal.
///
/// `GET /metrics` → 200 + `Vec<MetricsRecord>` JSON
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<Vec<MetricsRecord>> {
    Json(
        state
            .metrics
            .iter()
            .map(|(channel, metrics)| MetricsRecord {
                channel: channel.to_string(),
                metrics: metrics.clone(),
            })
            .collect(),
    )
}
