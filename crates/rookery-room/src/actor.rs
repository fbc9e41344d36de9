//! The room actor: one Tokio task per room, owning a [`Room`] and serializing
//! every operation against it through a command channel. This is the
//! concurrency boundary described for the Room Store — no two operations on
//! the same room ever run concurrently, because they all funnel through this
//! task's single `tokio::select!` loop.
//!
//! Disconnect grace and flag-fall detection share one low-rate
//! [`TickScheduler`] rather than each spawning their own timer, since both
//! are just "periodically look for a stale clock" checks on the same room.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rookery_protocol::{
    ChatMessage, ChatType, ErrorCode, GameStatus, MoveRecord, Promotion, Role, RoomId,
    RoomListEntry, RoomSettingsInput, RoomView, ServerEvent,
};
use rookery_session::{Identity, SessionRegistry};
use rookery_tick::TickScheduler;
use rookery_transport::ConnectionId;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error::RoomError;
use crate::game::now_ms;
use crate::room::{LeaveOutcome, Room};

/// A disconnected player's grace period, per §4.4 `leave`/reconnect handling.
/// A dropped connection doesn't immediately abandon the game — the player
/// gets this long to reconnect before the room treats it as a real leave.
const DISCONNECT_GRACE_MS: u64 = 60_000;

/// How often the actor wakes up to look for a fallen flag or an expired
/// grace period, independent of any client traffic.
const SWEEP_RATE_HZ: u32 = 1;

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Requests a room actor understands. Every variant but [`RoomCommand::Shutdown`]
/// carries a [`Reply`] so the caller gets a definite answer rather than
/// guessing from a later broadcast event.
pub enum RoomCommand {
    Join {
        identity: Identity,
        name: String,
        password: Option<String>,
        connection_id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
        reply: Reply<RoomView>,
    },
    Spectate {
        identity: Identity,
        name: String,
        password: Option<String>,
        connection_id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
        reply: Reply<RoomView>,
    },
    /// Reattaches an already-admitted identity's outbound channel after a
    /// reconnect (`session:restore`), without re-running admission checks.
    Resubscribe {
        identity: Identity,
        connection_id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
        reply: Reply<RoomView>,
    },
    /// The socket closed without an explicit `room:leave`. Starts the grace
    /// period for reconnectable identities; drops a spectator immediately.
    Disconnect {
        identity: Identity,
        connection_id: ConnectionId,
    },
    Leave {
        identity: Identity,
        reply: Reply<()>,
    },
    Move {
        identity: Identity,
        from: String,
        to: String,
        promotion: Option<Promotion>,
        reply: Reply<MoveRecord>,
    },
    Resign {
        identity: Identity,
        reply: Reply<()>,
    },
    OfferDraw {
        identity: Identity,
        reply: Reply<()>,
    },
    AcceptDraw {
        identity: Identity,
        reply: Reply<()>,
    },
    DeclineDraw {
        identity: Identity,
        reply: Reply<()>,
    },
    KickSpectator {
        identity: Identity,
        target: Identity,
        reply: Reply<()>,
    },
    Lock {
        identity: Identity,
        locked: bool,
        password: Option<String>,
        reply: Reply<()>,
    },
    UpdateSettings {
        identity: Identity,
        settings: RoomSettingsInput,
        reply: Reply<()>,
    },
    ChatSend {
        identity: Identity,
        display_name: String,
        message: String,
        chat_type: ChatType,
        reply: Reply<()>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomView>,
    },
    ListEntry {
        reply: oneshot::Sender<Option<RoomListEntry>>,
    },
    Shutdown,
}

/// A cheap-to-clone front door to a room's actor task. Every method sends a
/// command and awaits its reply; a channel that's gone (the actor already
/// shut down) surfaces as [`RoomError::Unavailable`].
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?
    }

    pub async fn join(
        &self,
        identity: Identity,
        name: String,
        password: Option<String>,
        connection_id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<RoomView, RoomError> {
        self.call(|reply| RoomCommand::Join {
            identity,
            name,
            password,
            connection_id,
            outbound,
            reply,
        })
        .await
    }

    pub async fn spectate(
        &self,
        identity: Identity,
        name: String,
        password: Option<String>,
        connection_id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<RoomView, RoomError> {
        self.call(|reply| RoomCommand::Spectate {
            identity,
            name,
            password,
            connection_id,
            outbound,
            reply,
        })
        .await
    }

    pub async fn resubscribe(
        &self,
        identity: Identity,
        connection_id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<RoomView, RoomError> {
        self.call(|reply| RoomCommand::Resubscribe {
            identity,
            connection_id,
            outbound,
            reply,
        })
        .await
    }

    /// Fire-and-forget — the caller doesn't need to wait for the grace
    /// period bookkeeping to land.
    pub async fn disconnect(&self, identity: Identity, connection_id: ConnectionId) {
        let _ = self
            .tx
            .send(RoomCommand::Disconnect {
                identity,
                connection_id,
            })
            .await;
    }

    pub async fn leave(&self, identity: Identity) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Leave { identity, reply }).await
    }

    pub async fn apply_move(
        &self,
        identity: Identity,
        from: String,
        to: String,
        promotion: Option<Promotion>,
    ) -> Result<MoveRecord, RoomError> {
        self.call(|reply| RoomCommand::Move {
            identity,
            from,
            to,
            promotion,
            reply,
        })
        .await
    }

    pub async fn resign(&self, identity: Identity) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Resign { identity, reply }).await
    }

    pub async fn offer_draw(&self, identity: Identity) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::OfferDraw { identity, reply }).await
    }

    pub async fn accept_draw(&self, identity: Identity) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::AcceptDraw { identity, reply }).await
    }

    pub async fn decline_draw(&self, identity: Identity) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::DeclineDraw { identity, reply }).await
    }

    pub async fn kick_spectator(
        &self,
        identity: Identity,
        target: Identity,
    ) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::KickSpectator {
            identity,
            target,
            reply,
        })
        .await
    }

    pub async fn lock(
        &self,
        identity: Identity,
        locked: bool,
        password: Option<String>,
    ) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Lock {
            identity,
            locked,
            password,
            reply,
        })
        .await
    }

    pub async fn update_settings(
        &self,
        identity: Identity,
        settings: RoomSettingsInput,
    ) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::UpdateSettings {
            identity,
            settings,
            reply,
        })
        .await
    }

    pub async fn chat_send(
        &self,
        identity: Identity,
        display_name: String,
        message: String,
        chat_type: ChatType,
    ) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::ChatSend {
            identity,
            display_name,
            message,
            chat_type,
            reply,
        })
        .await
    }

    pub async fn snapshot(&self) -> Option<RoomView> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(RoomCommand::Snapshot { reply: reply_tx }).await.ok()?;
        reply_rx.await.ok()
    }

    pub async fn list_entry(&self) -> Option<RoomListEntry> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::ListEntry { reply: reply_tx })
            .await
            .ok()?;
        reply_rx.await.ok().flatten()
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(RoomCommand::Shutdown).await;
    }
}

/// The task body. Owns the room and every connection currently subscribed
/// to its events.
struct ChessRoomActor {
    room: Room,
    rx: mpsc::Receiver<RoomCommand>,
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
    identity_connections: HashMap<Identity, ConnectionId>,
    pending_disconnect: HashMap<Identity, u64>,
    sessions: Arc<Mutex<SessionRegistry>>,
    catalog_notify: broadcast::Sender<()>,
    tick: TickScheduler,
    shutting_down: bool,
}

/// Spawns a room's actor task and returns a handle to it. `sessions` and
/// `catalog_notify` are shared across every room in the process — see
/// `RoomStore`.
pub fn spawn_room(
    room: Room,
    sessions: Arc<Mutex<SessionRegistry>>,
    catalog_notify: broadcast::Sender<()>,
) -> RoomHandle {
    let room_id = room.room_id.clone();
    let (tx, rx) = mpsc::channel(64);
    // Always sweeps at SWEEP_RATE_HZ — even a room with no time control
    // still needs the disconnect-grace check.
    let tick = TickScheduler::with_rate(SWEEP_RATE_HZ);

    let actor = ChessRoomActor {
        room,
        rx,
        connections: HashMap::new(),
        identity_connections: HashMap::new(),
        pending_disconnect: HashMap::new(),
        sessions,
        catalog_notify,
        tick,
        shutting_down: false,
    };

    tokio::spawn(actor.run());

    RoomHandle { room_id, tx }
}

impl ChessRoomActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(RoomCommand::Shutdown) => {
                            self.discard_sessions();
                            break;
                        }
                        None => break,
                        Some(cmd) => {
                            self.handle(cmd);
                            if self.shutting_down {
                                break;
                            }
                        }
                    }
                }
                _ = self.tick.wait_for_tick() => {
                    self.sweep();
                    self.tick.record_tick_end();
                }
            }
        }
        tracing::info!(room_id = %self.room.room_id, "room actor exiting");
    }

    fn subscribe(
        &mut self,
        identity: Identity,
        connection_id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    ) {
        self.connections.insert(connection_id, outbound);
        self.identity_connections.insert(identity, connection_id);
    }

    fn broadcast(&self, event: ServerEvent) {
        for sender in self.connections.values() {
            let _ = sender.send(event.clone());
        }
    }

    fn broadcast_to_players(&self, event: ServerEvent) {
        for (identity, connection_id) in &self.identity_connections {
            if matches!(
                self.room.role_of(identity),
                Some(Role::Host) | Some(Role::Opponent)
            ) {
                if let Some(sender) = self.connections.get(connection_id) {
                    let _ = sender.send(event.clone());
                }
            }
        }
    }

    fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        if let Some(sender) = self.connections.get(&connection_id) {
            let _ = sender.send(event);
        }
    }

    fn notify_catalog(&self) {
        let _ = self.catalog_notify.send(());
    }

    /// Discards the session registry entries for every current participant
    /// — called the instant the room transitions to `Finished`, enforcing
    /// the "at most one non-finished room per identity" invariant without
    /// any extra bookkeeping of which rooms are finished.
    fn discard_sessions(&self) {
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        for identity in self.room.participants() {
            sessions.discard(&identity);
        }
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                identity,
                name,
                password,
                connection_id,
                outbound,
                reply,
            } => {
                let result = self.room.join(identity.clone(), name.clone(), password.as_deref());
                match result {
                    Ok(()) => {
                        self.subscribe(identity.clone(), connection_id, outbound);
                        self.broadcast(ServerEvent::PlayerJoined {
                            room_id: self.room.room_id.clone(),
                            player_id: identity.to_string(),
                            player_name: name,
                        });
                        let view = self.room.to_view();
                        self.broadcast(ServerEvent::GameStarted { room: view.clone() });
                        self.notify_catalog();
                        let _ = reply.send(Ok(view));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            RoomCommand::Spectate {
                identity,
                name,
                password,
                connection_id,
                outbound,
                reply,
            } => {
                let result = self.room.spectate(identity.clone(), name.clone(), password.as_deref());
                match result {
                    Ok(()) => {
                        self.subscribe(identity.clone(), connection_id, outbound);
                        self.broadcast(ServerEvent::SpectatorJoined {
                            room_id: self.room.room_id.clone(),
                            spectator_id: identity.to_string(),
                            spectator_name: name,
                        });
                        let _ = reply.send(Ok(self.room.to_view()));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            RoomCommand::Resubscribe {
                identity,
                connection_id,
                outbound,
                reply,
            } => {
                if self.room.role_of(&identity).is_none() {
                    let _ = reply.send(Err(RoomError::NotAPlayer(self.room.room_id.clone())));
                    return;
                }
                self.pending_disconnect.remove(&identity);
                self.subscribe(identity.clone(), connection_id, outbound);
                self.broadcast(ServerEvent::PlayerReconnected {
                    room_id: self.room.room_id.clone(),
                    player_id: identity.to_string(),
                });
                let _ = reply.send(Ok(self.room.to_view()));
            }
            RoomCommand::Disconnect {
                identity,
                connection_id,
            } => {
                if let Some(&tracked) = self.identity_connections.get(&identity) {
                    if tracked == connection_id {
                        self.connections.remove(&connection_id);
                        self.identity_connections.remove(&identity);
                    }
                }
                match self.room.role_of(&identity) {
                    Some(Role::Host) | Some(Role::Opponent)
                        if self.room.state() == rookery_protocol::RoomState::InProgress =>
                    {
                        self.pending_disconnect.insert(identity.clone(), now_ms());
                        self.broadcast(ServerEvent::PlayerDisconnected {
                            room_id: self.room.room_id.clone(),
                            player_id: identity.to_string(),
                            grace_period: DISCONNECT_GRACE_MS,
                        });
                    }
                    Some(Role::Spectator) => {
                        let _ = self.room.leave(&identity);
                        self.sessions
                            .lock()
                            .expect("session registry poisoned")
                            .discard(&identity);
                        self.broadcast(ServerEvent::SpectatorLeft {
                            room_id: self.room.room_id.clone(),
                            spectator_id: identity.to_string(),
                        });
                    }
                    _ => {}
                }
            }
            RoomCommand::Leave { identity, reply } => {
                self.pending_disconnect.remove(&identity);
                match self.room.leave(&identity) {
                    Ok(outcome) => {
                        self.finish_leave(&identity, outcome);
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            RoomCommand::Move {
                identity,
                from,
                to,
                promotion,
                reply,
            } => {
                match self.room.apply_move(&identity, &from, &to, promotion) {
                    Ok(record) => {
                        let view = self.room.game().unwrap().to_view();
                        self.broadcast(ServerEvent::GameMove {
                            room_id: self.room.room_id.clone(),
                            mv: record.clone(),
                            game: view,
                        });
                        self.maybe_finish_game();
                        let _ = reply.send(Ok(record));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            RoomCommand::Resign { identity, reply } => {
                match self.room.resign(&identity) {
                    Ok(()) => {
                        self.maybe_finish_game();
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            RoomCommand::OfferDraw { identity, reply } => {
                match self.room.offer_draw(&identity) {
                    Ok(()) => {
                        self.broadcast(ServerEvent::DrawOffered {
                            room_id: self.room.room_id.clone(),
                            offered_by: identity.to_string(),
                        });
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            RoomCommand::AcceptDraw { identity, reply } => {
                match self.room.accept_draw(&identity) {
                    Ok(()) => {
                        self.maybe_finish_game();
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            RoomCommand::DeclineDraw { identity, reply } => {
                match self.room.decline_draw(&identity) {
                    Ok(()) => {
                        self.broadcast(ServerEvent::DrawDeclined {
                            room_id: self.room.room_id.clone(),
                        });
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            RoomCommand::KickSpectator {
                identity,
                target,
                reply,
            } => match self.room.kick_spectator(&identity, &target) {
                Ok(_name) => {
                    if let Some(connection_id) = self.identity_connections.remove(&target) {
                        self.send_to(
                            connection_id,
                            ServerEvent::RoomKicked {
                                room_id: self.room.room_id.clone(),
                            },
                        );
                        self.connections.remove(&connection_id);
                    }
                    self.broadcast(ServerEvent::SpectatorLeft {
                        room_id: self.room.room_id.clone(),
                        spectator_id: target.to_string(),
                    });
                    {
                        let mut sessions = self.sessions.lock().expect("session registry poisoned");
                        sessions.discard(&target);
                    }
                    let _ = reply.send(Ok(()));
                }
                Err(err) => {
                    let _ = reply.send(Err(err));
                }
            },
            RoomCommand::Lock {
                identity,
                locked,
                password,
                reply,
            } => match self.room.lock_room(&identity, locked, password) {
                Ok(()) => {
                    self.broadcast(ServerEvent::RoomUpdated {
                        room: self.room.to_view(),
                    });
                    let _ = reply.send(Ok(()));
                }
                Err(err) => {
                    let _ = reply.send(Err(err));
                }
            },
            RoomCommand::UpdateSettings {
                identity,
                settings,
                reply,
            } => match self.room.update_settings(&identity, settings) {
                Ok(catalog_affected) => {
                    self.broadcast(ServerEvent::RoomUpdated {
                        room: self.room.to_view(),
                    });
                    if catalog_affected {
                        self.notify_catalog();
                    }
                    let _ = reply.send(Ok(()));
                }
                Err(err) => {
                    let _ = reply.send(Err(err));
                }
            },
            RoomCommand::ChatSend {
                identity,
                display_name,
                message,
                chat_type,
                reply,
            } => {
                if self.room.role_of(&identity).is_none() {
                    let _ = reply.send(Err(RoomError::NotAPlayer(self.room.room_id.clone())));
                    return;
                }
                if let Err(err) = crate::validate::validate_chat_message(&message) {
                    let _ = reply.send(Err(err));
                    return;
                }
                let chat = ChatMessage {
                    room_id: self.room.room_id.clone(),
                    sender_id: identity.to_string(),
                    sender_name: display_name,
                    message,
                    chat_type,
                    timestamp: now_ms(),
                };
                match chat_type {
                    ChatType::Public => self.broadcast(ServerEvent::ChatMessage(chat)),
                    ChatType::Private => self.broadcast_to_players(ServerEvent::ChatMessage(chat)),
                }
                let _ = reply.send(Ok(()));
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.room.to_view());
            }
            RoomCommand::ListEntry { reply } => {
                let _ = reply.send(self.room.to_list_entry());
            }
            RoomCommand::Shutdown => {}
        }
    }

    fn finish_leave(&mut self, identity: &Identity, outcome: LeaveOutcome) {
        match outcome {
            LeaveOutcome::HostLeftBeforeStart => {
                self.broadcast(ServerEvent::RoomClosed {
                    room_id: self.room.room_id.clone(),
                    reason: "host left before an opponent joined".into(),
                });
                self.discard_sessions();
                self.notify_catalog();
                self.shutting_down = true;
            }
            LeaveOutcome::PlayerAbandoned { winner } => {
                self.broadcast(ServerEvent::PlayerLeft {
                    room_id: self.room.room_id.clone(),
                    player_id: identity.to_string(),
                });
                self.broadcast(ServerEvent::GameEnded {
                    room_id: self.room.room_id.clone(),
                    status: GameStatus::Abandoned,
                    winner: Some(winner),
                });
                self.discard_sessions();
            }
            LeaveOutcome::SpectatorLeft => {
                self.sessions
                    .lock()
                    .expect("session registry poisoned")
                    .discard(identity);
                self.broadcast(ServerEvent::SpectatorLeft {
                    room_id: self.room.room_id.clone(),
                    spectator_id: identity.to_string(),
                });
            }
        }
    }

    /// Emits `game:ended` if the last mutation just ended the game, and
    /// discards every participant's session per the Finished-room invariant.
    fn maybe_finish_game(&mut self) {
        if let Some(game) = self.room.game() {
            if !game.is_active() {
                self.broadcast(ServerEvent::GameEnded {
                    room_id: self.room.room_id.clone(),
                    status: game.status(),
                    winner: game.winner(),
                });
                self.discard_sessions();
            }
        }
    }

    /// The combined active sweep (§4.5): flag-fall detection and expired
    /// disconnect grace periods, run off the same low-rate scheduler.
    fn sweep(&mut self) {
        if self.room.check_flag_fall() {
            self.maybe_finish_game();
            return;
        }

        let now = now_ms();
        let expired: Vec<Identity> = self
            .pending_disconnect
            .iter()
            .filter(|(_, &since)| now.saturating_sub(since) >= DISCONNECT_GRACE_MS)
            .map(|(identity, _)| identity.clone())
            .collect();
        for identity in expired {
            self.pending_disconnect.remove(&identity);
            if let Ok(outcome) = self.room.leave(&identity) {
                self.finish_leave(&identity, outcome);
            }
        }
    }
}
