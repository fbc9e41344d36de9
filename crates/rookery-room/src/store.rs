//! The Room Store (§4.3): creates rooms, looks them up by id, enforces the
//! one-non-finished-room-per-identity invariant before handing off to a
//! room's actor, and runs the periodic garbage collection sweep over idle
//! rooms.
//!
//! The session registry and the public-catalog broadcast channel are owned
//! here and shared into every room actor at spawn time — a room never
//! constructs its own copy of either.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::Rng;
use rookery_protocol::{RestoredSession, RoomId, RoomListEntry, RoomSettingsInput, RoomView, ServerEvent};
use rookery_session::{Identity, SessionRegistry};
use rookery_transport::ConnectionId;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::actor::{spawn_room, RoomHandle};
use crate::cache::RoomCache;
use crate::error::RoomError;
use crate::game::now_ms;
use crate::room::Room;
use crate::settings::Settings;
use crate::validate::validate_name;

const ROOM_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ROOM_ID_LEN: usize = 6;

/// A room older than this with no opponent ever admitted is garbage.
const WAITING_ROOM_TTL_MS: u64 = 60 * 60 * 1000;
/// A finished room is kept around this long so players can still fetch its
/// final state before it's swept.
const FINISHED_ROOM_TTL_MS: u64 = 30 * 60 * 1000;

pub struct RoomStore {
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    sessions: Arc<Mutex<SessionRegistry>>,
    cache: Arc<dyn RoomCache>,
    catalog_notify: broadcast::Sender<()>,
}

impl RoomStore {
    pub fn new(cache: Arc<dyn RoomCache>) -> Self {
        let (catalog_notify, _rx) = broadcast::channel(64);
        RoomStore {
            rooms: RwLock::new(HashMap::new()),
            sessions: Arc::new(Mutex::new(SessionRegistry::new())),
            cache,
            catalog_notify,
        }
    }

    /// Subscribes to the best-effort `room:list-updated` signal (§4.6). A
    /// missed tick is harmless — the client just refetches the catalog a
    /// little late.
    pub fn subscribe_catalog(&self) -> broadcast::Receiver<()> {
        self.catalog_notify.subscribe()
    }

    fn fresh_room_id(&self, existing: &HashMap<RoomId, RoomHandle>) -> RoomId {
        loop {
            let mut rng = rand::rng();
            let token: String = (0..ROOM_ID_LEN)
                .map(|_| ROOM_ID_ALPHABET[rng.random_range(0..ROOM_ID_ALPHABET.len())] as char)
                .collect();
            let candidate = RoomId::new(token);
            if !existing.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn check_not_already_in_room(&self, identity: &Identity) -> Result<(), RoomError> {
        let sessions = self.sessions.lock().expect("session registry poisoned");
        if sessions.lookup(identity).is_some() {
            return Err(RoomError::AlreadyInRoom);
        }
        Ok(())
    }

    /// `room:create`.
    pub async fn create(
        &self,
        host_identity: Identity,
        host_name: String,
        settings_input: Option<RoomSettingsInput>,
        connection_id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<(RoomHandle, RoomView), RoomError> {
        validate_name(&host_name)?;
        self.check_not_already_in_room(&host_identity)?;

        let settings = Settings::from_input(settings_input)?;
        let mut rooms = self.rooms.write().await;
        let room_id = self.fresh_room_id(&rooms);
        let room = Room::new(room_id.clone(), host_identity.clone(), host_name.clone(), settings);

        let handle = spawn_room(room, self.sessions.clone(), self.catalog_notify.clone());

        {
            let mut sessions = self.sessions.lock().expect("session registry poisoned");
            sessions
                .register(
                    host_identity.clone(),
                    host_name,
                    room_id.clone(),
                    rookery_protocol::Role::Host,
                    Some(rookery_protocol::Side::White),
                    connection_id,
                )
                .map_err(|_| RoomError::AlreadyInRoom)?;
        }

        let view = handle
            .resubscribe(host_identity, connection_id, outbound)
            .await?;

        rooms.insert(room_id.clone(), handle.clone());
        drop(rooms);

        if let Some(entry) = handle.list_entry().await {
            self.cache.put(entry);
        }
        let _ = self.catalog_notify.send(());

        Ok((handle, view))
    }

    pub async fn get(&self, room_id: &RoomId) -> Option<RoomHandle> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).cloned()
    }

    /// `room:join`.
    pub async fn join(
        &self,
        room_id: &RoomId,
        identity: Identity,
        name: String,
        password: Option<String>,
        connection_id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<RoomView, RoomError> {
        validate_name(&name)?;
        self.check_not_already_in_room(&identity)?;
        let handle = self
            .get(room_id)
            .await
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        let view = handle
            .join(identity.clone(), name.clone(), password, connection_id, outbound)
            .await?;

        {
            let mut sessions = self.sessions.lock().expect("session registry poisoned");
            let _ = sessions.register(
                identity,
                name,
                room_id.clone(),
                rookery_protocol::Role::Opponent,
                Some(rookery_protocol::Side::Black),
                connection_id,
            );
        }

        self.refresh_cache(&handle).await;
        Ok(view)
    }

    /// `room:spectate`.
    pub async fn spectate(
        &self,
        room_id: &RoomId,
        identity: Identity,
        name: String,
        password: Option<String>,
        connection_id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<RoomView, RoomError> {
        validate_name(&name)?;
        self.check_not_already_in_room(&identity)?;
        let handle = self
            .get(room_id)
            .await
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        let view = handle
            .spectate(identity.clone(), name.clone(), password, connection_id, outbound)
            .await?;

        {
            let mut sessions = self.sessions.lock().expect("session registry poisoned");
            let _ = sessions.register(
                identity,
                name,
                room_id.clone(),
                rookery_protocol::Role::Spectator,
                None,
                connection_id,
            );
        }

        self.refresh_cache(&handle).await;
        Ok(view)
    }

    /// `session:restore` — reattaches a reconnecting identity to its
    /// existing room without re-running admission.
    pub async fn restore(
        &self,
        identity: Identity,
        connection_id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<RestoredSession, RoomError> {
        let (room_id, role, color) = {
            let mut sessions = self.sessions.lock().expect("session registry poisoned");
            let session = sessions
                .rebind(&identity, connection_id)
                .map_err(|_| RoomError::NotConnected)?;
            (session.room_id.clone(), session.role, session.color)
        };

        let handle = self
            .get(&room_id)
            .await
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        handle.resubscribe(identity, connection_id, outbound).await?;

        Ok(RestoredSession {
            room_id,
            role,
            color,
        })
    }

    /// The display name this identity registered under, if it currently
    /// holds a session anywhere — used for `chat:send`, which carries a
    /// message but not the sender's own name.
    pub fn session_name(&self, identity: &Identity) -> Option<String> {
        let sessions = self.sessions.lock().expect("session registry poisoned");
        sessions.lookup(identity).map(|s| s.display_name.clone())
    }

    /// The room an identity currently holds a session in, if any — used by
    /// `room:leave`, which (unlike every other room-scoped request) doesn't
    /// carry a `roomId` of its own.
    pub fn current_room(&self, identity: &Identity) -> Option<RoomId> {
        let sessions = self.sessions.lock().expect("session registry poisoned");
        sessions.lookup(identity).map(|s| s.room_id.clone())
    }

    /// Called when a connection drops without an explicit `room:leave`.
    pub async fn disconnect(&self, identity: Identity, connection_id: ConnectionId) {
        let room_id = {
            let sessions = self.sessions.lock().expect("session registry poisoned");
            sessions.lookup(&identity).map(|s| s.room_id.clone())
        };
        let Some(room_id) = room_id else { return };
        if let Some(handle) = self.get(&room_id).await {
            handle.disconnect(identity, connection_id).await;
        }
    }

    async fn refresh_cache(&self, handle: &RoomHandle) {
        match handle.list_entry().await {
            Some(entry) => self.cache.put(entry),
            None => self.cache.delete(handle.room_id()),
        }
        let _ = self.catalog_notify.send(());
    }

    /// The public catalog (§4.7) — served straight from the cache, which is
    /// write-through on every mutation that can change a listing.
    pub fn listings(&self) -> Vec<RoomListEntry> {
        self.cache.all()
    }

    /// Sweeps idle rooms: waiting rooms nobody ever joined, and finished
    /// rooms past their retention window (§3 Lifecycle, §5 Cancellation).
    /// Returns how many rooms were collected.
    pub async fn gc(&self) -> usize {
        let now = now_ms();
        let candidates: Vec<(RoomId, RoomHandle)> = {
            let rooms = self.rooms.read().await;
            rooms
                .iter()
                .map(|(id, handle)| (id.clone(), handle.clone()))
                .collect()
        };

        let mut collected = 0;
        for (room_id, handle) in candidates {
            let Some(view) = handle.snapshot().await else {
                continue;
            };
            if !is_collectible(&view, now) {
                continue;
            }
            handle.shutdown().await;
            self.rooms.write().await.remove(&room_id);
            self.cache.delete(&room_id);
            collected += 1;
        }
        collected
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

fn is_collectible(view: &RoomView, now: u64) -> bool {
    let idle_ms = now.saturating_sub(view.last_activity);
    match view.state {
        rookery_protocol::RoomState::Finished => idle_ms >= FINISHED_ROOM_TTL_MS,
        rookery_protocol::RoomState::WaitingForPlayer => idle_ms >= WAITING_ROOM_TTL_MS,
        rookery_protocol::RoomState::InProgress => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryRoomCache;

    fn store() -> RoomStore {
        RoomStore::new(Arc::new(InMemoryRoomCache::new()))
    }

    fn identity(name: &str) -> Identity {
        Identity::Guest(name.into())
    }

    #[tokio::test]
    async fn create_then_join_admits_the_opponent() {
        let store = store();
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let (_, view) = store
            .create(
                identity("host"),
                "Alice".into(),
                None,
                ConnectionId::new(1),
                host_tx,
            )
            .await
            .unwrap();

        let (opp_tx, _opp_rx) = mpsc::unbounded_channel();
        let view = store
            .join(
                &view.room_id,
                identity("opponent"),
                "Bob".into(),
                None,
                ConnectionId::new(2),
                opp_tx,
            )
            .await
            .unwrap();
        assert_eq!(view.state, rookery_protocol::RoomState::InProgress);
        assert_eq!(store.room_count().await, 1);
    }

    #[tokio::test]
    async fn joining_a_second_room_while_already_seated_is_rejected() {
        let store = store();
        let (host_tx, _) = mpsc::unbounded_channel();
        let (_, first) = store
            .create(identity("host"), "Alice".into(), None, ConnectionId::new(1), host_tx)
            .await
            .unwrap();

        let (host2_tx, _) = mpsc::unbounded_channel();
        let err = store
            .create(
                identity("host"),
                "Alice".into(),
                None,
                ConnectionId::new(3),
                host2_tx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::AlreadyInRoom));
        assert_eq!(first.room_id.as_str().len(), ROOM_ID_LEN);
    }

    #[tokio::test]
    async fn unknown_room_join_is_not_found() {
        let store = store();
        let (tx, _) = mpsc::unbounded_channel();
        let err = store
            .join(
                &RoomId::new("zzzzzz"),
                identity("opponent"),
                "Bob".into(),
                None,
                ConnectionId::new(1),
                tx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::NotFound(_)));
    }

    #[tokio::test]
    async fn created_room_appears_in_the_public_catalog() {
        let store = store();
        let (tx, _) = mpsc::unbounded_channel();
        store
            .create(identity("host"), "Alice".into(), None, ConnectionId::new(1), tx)
            .await
            .unwrap();
        assert_eq!(store.listings().len(), 1);
    }

    #[tokio::test]
    async fn gc_collects_a_room_abandoned_before_any_opponent_joined() {
        let store = store();
        let (tx, _) = mpsc::unbounded_channel();
        let (handle, _) = store
            .create(identity("host"), "Alice".into(), None, ConnectionId::new(1), tx)
            .await
            .unwrap();
        handle.leave(identity("host")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // Room is already Finished (host left before start) but not yet
        // idle long enough — gc should leave it alone until the TTL check
        // is satisfied. We can't fast-forward real time here, so this test
        // only checks that gc() doesn't panic and doesn't touch an
        // in-progress room; the TTL arithmetic itself is covered directly.
        let collected = store.gc().await;
        assert_eq!(collected, 0);
    }

    #[tokio::test]
    async fn session_name_and_current_room_reflect_a_registered_host() {
        let store = store();
        let (tx, _) = mpsc::unbounded_channel();
        let (_, view) = store
            .create(identity("host"), "Alice".into(), None, ConnectionId::new(1), tx)
            .await
            .unwrap();

        assert_eq!(store.session_name(&identity("host")), Some("Alice".into()));
        assert_eq!(store.current_room(&identity("host")), Some(view.room_id));
    }

    #[test]
    fn session_name_and_current_room_are_none_for_a_stranger() {
        let store = store();
        assert_eq!(store.session_name(&identity("nobody")), None);
        assert_eq!(store.current_room(&identity("nobody")), None);
    }

    #[test]
    fn is_collectible_respects_the_per_state_ttl() {
        let mut view_base = rookery_protocol::RoomView {
            room_id: RoomId::new("ab12cd"),
            host_id: "guest:host".into(),
            host_name: "Alice".into(),
            opponent_id: None,
            opponent_name: None,
            spectators: vec![],
            state: rookery_protocol::RoomState::WaitingForPlayer,
            created_at: 0,
            last_activity: 0,
            game: None,
            settings: crate::settings::Settings::default().to_view(),
        };
        assert!(is_collectible(&view_base, WAITING_ROOM_TTL_MS));
        assert!(!is_collectible(&view_base, WAITING_ROOM_TTL_MS - 1));

        view_base.state = rookery_protocol::RoomState::Finished;
        assert!(!is_collectible(&view_base, FINISHED_ROOM_TTL_MS - 1));
        assert!(is_collectible(&view_base, FINISHED_ROOM_TTL_MS));

        view_base.state = rookery_protocol::RoomState::InProgress;
        assert!(!is_collectible(&view_base, u64::MAX));
    }
}
