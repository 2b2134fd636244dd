//! HTTP surface of the tile server.
//!
//! Every path other than `/health` is treated as a tile request. The path is
//! parsed into a [`TileCoord`], handed to the shared [`TilePool`], and the
//! rendered bytes become the response body. Failures map to:
//!
//! - invalid path → `404 Not Found`
//! - engine error or lost worker → `500 Internal Server Error`
//! - pool shut down → `503 Service Unavailable`
//! - render timeout → `504 Gateway Timeout`
//!
//! Error bodies are the plain-text error message. Nothing is retried here.

use crate::server::telemetry::{
    decrement_renders_inflight, increment_parse_errors, increment_render_errors,
    increment_renders_inflight, increment_requests, record_render_duration,
};
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use core::time::Duration;
use serde_json::json;
use std::{sync::Arc, time::Instant};
use tilecast::{Error, ParseError, TileCoord, TilePool};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pool: Arc<TilePool>,
    render_timeout: Option<Duration>,
}

impl AppState {
    pub const fn new(pool: Arc<TilePool>, render_timeout: Option<Duration>) -> Self {
        Self {
            pool,
            render_timeout,
        }
    }

    async fn render(&self, coord: TileCoord) -> Result<Bytes, Error> {
        match self.render_timeout {
            Some(deadline) => self.pool.render_with_deadline(coord, deadline).await,
            None => self.pool.render(coord).await,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(tile)
        .with_state(state)
}

/// Failure of a single tile request.
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Pool(#[from] Error),
}

impl TileError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Parse(_) => StatusCode::NOT_FOUND,
            Self::Pool(Error::PoolClosed) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Pool(Error::DeadlineExceeded(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Pool(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Keeps the in-flight gauge balanced even when the client disconnects and
/// the handler future is dropped mid-render.
struct InflightGuard {
    started: Instant,
}

impl InflightGuard {
    fn enter() -> Self {
        increment_renders_inflight();
        Self {
            started: Instant::now(),
        }
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        decrement_renders_inflight();
        record_render_duration(self.started.elapsed().as_secs_f64() * 1000.0);
    }
}

#[tracing::instrument(skip_all, fields(path = %uri.path()))]
async fn tile(State(state): State<AppState>, uri: Uri) -> Result<Response, TileError> {
    increment_requests();

    let coord = TileCoord::parse(uri.path()).inspect_err(|e| {
        increment_parse_errors();
        tracing::debug!(error = %e, "rejected tile path");
    })?;
    let content_type = content_type(coord.format());

    let tile = {
        let _inflight = InflightGuard::enter();
        state.render(coord).await.inspect_err(|e| {
            increment_render_errors();
            tracing::warn!(error = %e, "tile request failed");
        })?
    };

    Ok(([(header::CONTENT_TYPE, content_type)], tile).into_response())
}

async fn health(State(state): State<AppState>) -> Response {
    let pool = &state.pool;
    let closed = pool.is_closed();
    let status = if closed {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let body = Json(json!({
        "workers": pool.worker_count(),
        "busy": pool.busy_workers(),
        "closed": closed,
    }));
    (status, body).into_response()
}

/// Media type for a tile format token. Unknown formats are served as raw
/// bytes.
pub fn content_type(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "pbf" | "mvt" => "application/vnd.mapbox-vector-tile",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "json" | "geojson" => "application/geo+json",
        _ => "application/octet-stream",
    }
}
