//! The HTTP surface: health, stats, and the public room catalog, served
//! from the same bound port as the WebSocket upgrade endpoint.
//!
//! `/health` is exempt from the rate limiter — it exists for uptime
//! monitors that need to reach it even under a hostile request burst.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rookery_protocol::{RoomId, RoomListEntry, RoomState, RoomView};
use serde::Deserialize;
use serde_json::json;

use crate::server::ServerState;

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);
const RATE_LIMIT_MAX_REQUESTS: u32 = 100;

/// Fixed-window request limiter, one window per source IP. A burst
/// straddling a window boundary can briefly allow close to double the
/// nominal limit — acceptable for an advisory abuse guard on a handful of
/// read-only endpoints, not a correctness-critical gate.
pub struct RateLimiter {
    buckets: Mutex<HashMap<IpAddr, (Instant, u32)>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter { buckets: Mutex::new(HashMap::new()) }
    }

    fn allow(&self, addr: IpAddr) -> bool {
        let mut buckets = self.buckets.lock().expect("rate limiter poisoned");
        let now = Instant::now();
        let entry = buckets.entry(addr).or_insert((now, 0));
        if now.duration_since(entry.0) >= RATE_LIMIT_WINDOW {
            *entry = (now, 0);
        }
        entry.1 += 1;
        entry.1 <= RATE_LIMIT_MAX_REQUESTS
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

async fn rate_limit(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: axum::extract::Request,
    next: Next,
) -> Response {
    if state.rate_limiter.allow(addr.ip()) {
        next.run(req).await
    } else {
        (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": "rate limit exceeded" }))).into_response()
    }
}

/// Builds the HTTP router. Takes `state` up front only so the rate-limit
/// middleware can close over it — the caller still applies `.with_state`
/// once, after merging this with the WebSocket route.
pub fn http_router(state: Arc<ServerState>) -> Router<Arc<ServerState>> {
    let limited = Router::new()
        .route("/api/stats", get(stats))
        .route("/api/rooms/listings", get(listings))
        .route("/api/rooms/:room_id", get(room_by_id))
        .route_layer(middleware::from_fn_with_state(state, rate_limit));

    Router::new().route("/health", get(health)).merge(limited)
}

async fn health(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "cache": "in_memory",
        "identityBackend": if state.config.identity_backend_enabled() { "enabled" } else { "disabled" },
    }))
}

async fn stats(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    Json(json!({
        "rooms": state.rooms.room_count().await,
        "listedRooms": state.rooms.listings().len(),
    }))
}

#[derive(Debug, Deserialize)]
struct ListingsQuery {
    state: Option<RoomState>,
    #[serde(rename = "hasTimeControl")]
    has_time_control: Option<bool>,
}

async fn listings(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ListingsQuery>,
) -> Json<Vec<RoomListEntry>> {
    let mut entries = state.rooms.listings();
    if let Some(filter_state) = query.state {
        entries.retain(|entry| entry.state == filter_state);
    }
    if let Some(has_tc) = query.has_time_control {
        entries.retain(|entry| entry.time_control.is_some() == has_tc);
    }
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(entries)
}

async fn room_by_id(
    State(state): State<Arc<ServerState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomView>, StatusCode> {
    let handle = state
        .rooms
        .get(&RoomId::new(room_id))
        .await
        .ok_or(StatusCode::NOT_FOUND)?;
    let view = handle.snapshot().await.ok_or(StatusCode::NOT_FOUND)?;
    if view.settings.is_private {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(view))
}
