//! Per-connection handling: identity resolution, the request/response/event
//! loop, and cleanup once the socket closes.
//!
//! One task per connection, mirroring the one-task-per-room shape in
//! `rookery-room`: the loop here is the only thing that ever reads from or
//! writes to a given connection, so inbound requests and outbound events
//! never race each other on the wire.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rookery_protocol::{
    Ack, ClientRequest, Codec, Envelope, ErrorCode, JsonCodec, Payload, RoomId, ServerEvent,
};
use rookery_room::{RoomError, RoomHandle};
use rookery_session::Identity;
use rookery_transport::{Connection, ConnectionId};
use tokio::sync::mpsc;

use crate::server::ServerState;

/// A connection that hasn't sent or received anything in this long is
/// treated as gone.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before the epoch")
        .as_millis() as u64
}

/// Drives one connection end to end: resolves its identity, then loops
/// decoding inbound requests and forwarding outbound events until the
/// socket closes or goes idle, then releases the identity's hold on
/// whatever room it was in.
pub(crate) async fn handle_connection<C: Connection>(
    conn: C,
    token: Option<String>,
    guest_id: Option<String>,
    state: Arc<ServerState>,
) {
    let connection_id = conn.id();
    let identity = state
        .resolver
        .resolve(token.as_deref(), guest_id.as_deref(), connection_id)
        .await;
    tracing::info!(%connection_id, %identity, "connection identified");

    let codec = JsonCodec;
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerEvent>();

    loop {
        tokio::select! {
            event = outbound_rx.recv() => {
                let Some(event) = event else { break };
                match codec.encode(&Envelope::event(event)) {
                    Ok(bytes) => {
                        if conn.send(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => tracing::warn!(%connection_id, %err, "failed to encode outbound event"),
                }
            }
            incoming = tokio::time::timeout(IDLE_TIMEOUT, conn.recv()) => {
                let data = match incoming {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => break,
                    Ok(Err(err)) => {
                        tracing::debug!(%connection_id, %err, "connection read failed");
                        break;
                    }
                    Err(_) => {
                        tracing::debug!(%connection_id, "connection idle timeout");
                        break;
                    }
                };

                let envelope: Envelope = match codec.decode(&data) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        tracing::debug!(%connection_id, %err, "failed to decode envelope");
                        continue;
                    }
                };

                let Payload::Request(request) = envelope.payload else {
                    tracing::debug!(%connection_id, "ignoring non-request frame from a client");
                    continue;
                };
                let Some(request_id) = envelope.request_id else {
                    tracing::debug!(%connection_id, "request frame with no requestId, dropping");
                    continue;
                };

                let ack = dispatch(&state, &identity, connection_id, &outbound_tx, request).await;

                match codec.encode(&Envelope::response(request_id, ack)) {
                    Ok(bytes) => {
                        if conn.send(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => tracing::warn!(%connection_id, %err, "failed to encode response"),
                }
            }
        }
    }

    state.rooms.disconnect(identity, connection_id).await;
    tracing::info!(%connection_id, "connection closed");
}

async fn room_handle(state: &ServerState, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
    state
        .rooms
        .get(room_id)
        .await
        .ok_or_else(|| RoomError::NotFound(room_id.clone()))
}

fn error_ack(err: RoomError) -> Ack {
    Ack::err(err.to_error_code(), err.to_string())
}

async fn with_room<F, Fut>(state: &ServerState, room_id: &RoomId, body: F) -> Ack
where
    F: FnOnce(RoomHandle) -> Fut,
    Fut: std::future::Future<Output = Result<serde_json::Value, RoomError>>,
{
    match room_handle(state, room_id).await {
        Ok(handle) => match body(handle).await {
            Ok(data) => Ack::ok(data),
            Err(err) => error_ack(err),
        },
        Err(err) => error_ack(err),
    }
}

/// Resolves one `ClientRequest` into a `RoomStore`/`RoomHandle` call and the
/// `Ack` to send back. Every room-scoped request carries its own `roomId`
/// except `room:leave`, which has to recover its room from the session
/// registry instead.
async fn dispatch(
    state: &ServerState,
    identity: &Identity,
    connection_id: ConnectionId,
    outbound: &mpsc::UnboundedSender<ServerEvent>,
    request: ClientRequest,
) -> Ack {
    match request {
        ClientRequest::RoomCreate { player_name, settings } => {
            match state
                .rooms
                .create(identity.clone(), player_name, settings, connection_id, outbound.clone())
                .await
            {
                Ok((_, view)) => Ack::ok(serde_json::json!({
                    "room": view,
                    "role": rookery_protocol::Role::Host,
                    "color": rookery_rules::Side::White,
                })),
                Err(err) => error_ack(err),
            }
        }

        ClientRequest::RoomJoin { room_id, player_name, password } => {
            match state
                .rooms
                .join(&room_id, identity.clone(), player_name, password, connection_id, outbound.clone())
                .await
            {
                Ok(view) => Ack::ok(serde_json::json!({
                    "room": view,
                    "role": rookery_protocol::Role::Opponent,
                    "color": rookery_rules::Side::Black,
                })),
                Err(err) => error_ack(err),
            }
        }

        ClientRequest::RoomSpectate { room_id, spectator_name, password } => {
            let name = spectator_name.unwrap_or_else(|| "Spectator".to_string());
            match state
                .rooms
                .spectate(&room_id, identity.clone(), name, password, connection_id, outbound.clone())
                .await
            {
                Ok(view) => Ack::ok(serde_json::json!({
                    "room": view,
                    "role": rookery_protocol::Role::Spectator,
                })),
                Err(err) => error_ack(err),
            }
        }

        ClientRequest::RoomLeave {} => {
            let Some(room_id) = state.rooms.current_room(identity) else {
                return Ack::err(ErrorCode::NotConnected, "not currently in a room");
            };
            with_room(state, &room_id, |handle| async move {
                handle.leave(identity.clone()).await?;
                Ok(serde_json::json!({}))
            })
            .await
        }

        ClientRequest::RoomKick { room_id, target_id } => {
            let Ok(target) = Identity::from_str(&target_id) else {
                return Ack::err(ErrorCode::NotFound, "unrecognized target id");
            };
            with_room(state, &room_id, |handle| async move {
                handle.kick_spectator(identity.clone(), target).await?;
                Ok(serde_json::json!({}))
            })
            .await
        }

        ClientRequest::RoomLock { room_id, locked, password } => {
            with_room(state, &room_id, |handle| async move {
                handle.lock(identity.clone(), locked, password).await?;
                Ok(serde_json::json!({}))
            })
            .await
        }

        ClientRequest::RoomUpdateSettings { room_id, settings } => {
            with_room(state, &room_id, |handle| async move {
                handle.update_settings(identity.clone(), settings).await?;
                Ok(serde_json::json!({}))
            })
            .await
        }

        ClientRequest::GameMove { room_id, from, to, promotion } => {
            with_room(state, &room_id, |handle| async move {
                let record = handle.apply_move(identity.clone(), from, to, promotion).await?;
                Ok(serde_json::json!({ "move": record }))
            })
            .await
        }

        ClientRequest::GameResign { room_id } => {
            with_room(state, &room_id, |handle| async move {
                handle.resign(identity.clone()).await?;
                Ok(serde_json::json!({}))
            })
            .await
        }

        ClientRequest::GameOfferDraw { room_id } => {
            with_room(state, &room_id, |handle| async move {
                handle.offer_draw(identity.clone()).await?;
                Ok(serde_json::json!({}))
            })
            .await
        }

        ClientRequest::GameAcceptDraw { room_id } => {
            with_room(state, &room_id, |handle| async move {
                handle.accept_draw(identity.clone()).await?;
                Ok(serde_json::json!({}))
            })
            .await
        }

        ClientRequest::GameDeclineDraw { room_id } => {
            with_room(state, &room_id, |handle| async move {
                handle.decline_draw(identity.clone()).await?;
                Ok(serde_json::json!({}))
            })
            .await
        }

        ClientRequest::ChatSend { room_id, message, chat_type } => {
            let Some(display_name) = state.rooms.session_name(identity) else {
                return Ack::err(ErrorCode::NotAPlayer, "no active session");
            };
            with_room(state, &room_id, |handle| async move {
                handle.chat_send(identity.clone(), display_name, message, chat_type).await?;
                Ok(serde_json::json!({}))
            })
            .await
        }

        ClientRequest::SessionRestore {} => {
            match state.rooms.restore(identity.clone(), connection_id, outbound.clone()).await {
                Ok(restored) => Ack::ok(serde_json::to_value(restored).unwrap_or(serde_json::Value::Null)),
                Err(err) => error_ack(err),
            }
        }

        ClientRequest::Ping {} => Ack::ok(serde_json::json!({ "serverTime": now_ms() })),
    }
}
