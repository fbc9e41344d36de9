//! Builds the shared server state and the `axum` router that serves both
//! the HTTP surface and the WebSocket upgrade endpoint on one bound port.
//!
//! This is the entry point for running the chess room engine. It ties
//! together every layer: transport → protocol → session → room.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use rookery_room::{InMemoryRoomCache, RoomStore};
use rookery_session::{Authenticator, IdentityResolver, JwtAuthenticator, SessionError};
use rookery_transport::axum_ws::{next_connection_id, AxumWsConnection};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handler::handle_connection;
use crate::http::{http_router, RateLimiter};
use crate::RookeryError;

/// How often the idle-room sweep runs, independent of any per-room tick.
const GC_INTERVAL: Duration = Duration::from_secs(60);

/// Stands in for token verification when no identity backend is configured
/// (`DATABASE_URL`/`JWT_SECRET` absent) — every token fails, demoting the
/// identity resolution straight to the guest/connection path.
pub struct NullAuthenticator;

impl Authenticator for NullAuthenticator {
    async fn authenticate(&self, _token: &str) -> Result<String, SessionError> {
        Err(SessionError::AuthFailed("token verification is disabled".into()))
    }
}

/// Either a real JWT verifier or the disabled stand-in, chosen once at
/// startup from [`Config::identity_backend_enabled`].
pub enum AppAuthenticator {
    Jwt(JwtAuthenticator),
    Disabled(NullAuthenticator),
}

impl Authenticator for AppAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<String, SessionError> {
        match self {
            AppAuthenticator::Jwt(auth) => auth.authenticate(token).await,
            AppAuthenticator::Disabled(auth) => auth.authenticate(token).await,
        }
    }
}

/// Shared across every connection handler task.
pub struct ServerState {
    pub rooms: RoomStore,
    pub resolver: IdentityResolver<AppAuthenticator>,
    pub config: Config,
    pub rate_limiter: RateLimiter,
    pub started_at: Instant,
}

/// A bound, not-yet-running Rookery server.
pub struct RookeryServer {
    router: Router,
    listener: tokio::net::TcpListener,
}

impl RookeryServer {
    /// Builds the shared state, the combined HTTP+WebSocket router, and
    /// binds the configured port. Also starts the background idle-room
    /// sweep. Does not accept connections until [`run`](Self::run) is
    /// called.
    pub async fn bind(config: Config) -> Result<Self, RookeryError> {
        let authenticator = if config.identity_backend_enabled() {
            AppAuthenticator::Jwt(JwtAuthenticator::new(
                config.jwt_secret.clone().expect("checked by identity_backend_enabled"),
            ))
        } else {
            AppAuthenticator::Disabled(NullAuthenticator)
        };

        let state = Arc::new(ServerState {
            rooms: RoomStore::new(Arc::new(InMemoryRoomCache::new())),
            resolver: IdentityResolver::new(authenticator),
            rate_limiter: RateLimiter::new(),
            started_at: Instant::now(),
            config: config.clone(),
        });

        let cors = build_cors(&config);

        let router = Router::new()
            .merge(http_router(state.clone()))
            .route("/ws", get(ws_upgrade))
            .with_state(state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http());

        let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(rookery_transport::TransportError::AcceptFailed)?;
        tracing::info!(%addr, "rookery server bound");

        spawn_gc_sweep(state);

        Ok(RookeryServer { router, listener })
    }

    /// The address the server actually bound to (useful in tests that bind
    /// to port 0 and need to discover the real port).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop. Returns only if the listener itself fails —
    /// ordinary per-connection errors are handled and logged inside the
    /// connection task, not propagated here.
    pub async fn run(self) -> Result<(), RookeryError> {
        tracing::info!("rookery server running");
        axum::serve(
            self.listener,
            self.router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(rookery_transport::TransportError::AcceptFailed)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
    #[serde(rename = "guestId")]
    guest_id: Option<String>,
}

async fn ws_upgrade(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let connection_id = next_connection_id();
        let conn = AxumWsConnection::new(connection_id, socket);
        handle_connection(conn, query.token, query.guest_id, state).await;
    })
}

fn build_cors(config: &Config) -> CorsLayer {
    if config.client_origins.is_empty() {
        return CorsLayer::new();
    }
    let origins: Vec<HeaderValue> = config
        .client_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(origins))
}

/// Periodic idle-room collection, independent of any per-room sweep — rooms
/// nobody ever joined, and finished rooms past their retention window.
fn spawn_gc_sweep(state: Arc<ServerState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(GC_INTERVAL);
        loop {
            interval.tick().await;
            let collected = state.rooms.gc().await;
            if collected > 0 {
                tracing::debug!(collected, "room store gc swept idle rooms");
            }
        }
    });
}
