//! The Session Registry: the single source of truth for "who is present in
//! which room, as what."
//!
//! Keyed by [`Identity`], not by connection — that's what lets a player's
//! standing survive a reconnect. `SessionRegistry` itself is a plain
//! `HashMap` wrapper, not a concurrent one: it's owned by the Room Store
//! and mutated only from inside a room's own per-room critical section
//! (§5), so no internal locking is needed here.

use std::collections::HashMap;

use rookery_protocol::{Role, RoomId, Side};
use rookery_transport::ConnectionId;

use crate::{Identity, Session, SessionError};

/// Tracks every identity's current session, across every room.
pub struct SessionRegistry {
    sessions: HashMap<Identity, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: HashMap::new(),
        }
    }

    /// Registers a new session for `identity`.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyConnected`] if `identity` already has
    /// a connected session — data model invariant 2 (a stable identity
    /// participates in at most one non-finished room at a time) is enforced
    /// by the Room Store before this is called; this is the registry's own
    /// backstop against a caller skipping that check.
    pub fn register(
        &mut self,
        identity: Identity,
        display_name: impl Into<String>,
        room_id: RoomId,
        role: Role,
        color: Option<Side>,
        connection_id: ConnectionId,
    ) -> Result<&Session, SessionError> {
        if let Some(existing) = self.sessions.get(&identity) {
            if existing.is_connected {
                return Err(SessionError::AlreadyConnected(identity.to_string()));
            }
        }

        let session = Session::new(
            identity.clone(),
            display_name.into(),
            room_id,
            role,
            color,
            connection_id,
        );

        tracing::info!(identity = %identity, role = ?session.role, "session registered");
        self.sessions.insert(identity.clone(), session);
        Ok(self.sessions.get(&identity).expect("just inserted"))
    }

    /// Looks up the session for `identity`, if any.
    pub fn lookup(&self, identity: &Identity) -> Option<&Session> {
        self.sessions.get(identity)
    }

    /// Rebinds `identity`'s session onto a new connection: clears the
    /// disconnected flag and stamp, and replaces `connectionId`.
    pub fn rebind(
        &mut self,
        identity: &Identity,
        new_connection_id: ConnectionId,
    ) -> Result<&Session, SessionError> {
        let session = self
            .sessions
            .get_mut(identity)
            .ok_or_else(|| SessionError::NotFound(identity.to_string()))?;

        session.connection_id = new_connection_id;
        session.is_connected = true;
        session.disconnected_at = None;

        tracing::info!(%identity, "session rebound to new connection");
        Ok(session)
    }

    /// Marks `identity` as disconnected, preserving the entry. Callers are
    /// responsible for the role-dependent grace policy (§4.2): player
    /// sessions should stay registered through the grace window, spectator
    /// sessions should be `discard`ed immediately instead of ever calling
    /// this.
    pub fn mark_disconnected(&mut self, identity: &Identity) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(identity)
            .ok_or_else(|| SessionError::NotFound(identity.to_string()))?;

        session.is_connected = false;
        session.disconnected_at = Some(std::time::Instant::now());

        tracing::info!(%identity, "session marked disconnected");
        Ok(())
    }

    /// Removes `identity`'s session entirely.
    pub fn discard(&mut self, identity: &Identity) -> Option<Session> {
        let removed = self.sessions.remove(identity);
        if removed.is_some() {
            tracing::info!(%identity, "session discarded");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    #[test]
    fn register_then_lookup_returns_the_session() {
        let mut registry = SessionRegistry::new();
        let identity = Identity::Guest("g1".into());
        registry
            .register(
                identity.clone(),
                "Alice",
                RoomId::new("ab12cd"),
                Role::Host,
                Some(Side::White),
                conn(1),
            )
            .unwrap();

        let session = registry.lookup(&identity).unwrap();
        assert_eq!(session.display_name, "Alice");
        assert!(session.is_connected);
    }

    #[test]
    fn register_while_already_connected_is_rejected() {
        let mut registry = SessionRegistry::new();
        let identity = Identity::Guest("g1".into());
        registry
            .register(
                identity.clone(),
                "Alice",
                RoomId::new("ab12cd"),
                Role::Host,
                Some(Side::White),
                conn(1),
            )
            .unwrap();

        let err = registry
            .register(
                identity,
                "Alice",
                RoomId::new("ef34gh"),
                Role::Host,
                Some(Side::White),
                conn(2),
            )
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadyConnected(_)));
    }

    #[test]
    fn disconnect_then_rebind_restores_connected_state() {
        let mut registry = SessionRegistry::new();
        let identity = Identity::Authenticated("u1".into());
        registry
            .register(
                identity.clone(),
                "Bob",
                RoomId::new("ab12cd"),
                Role::Opponent,
                Some(Side::Black),
                conn(1),
            )
            .unwrap();

        registry.mark_disconnected(&identity).unwrap();
        assert!(!registry.lookup(&identity).unwrap().is_connected);
        assert!(registry.lookup(&identity).unwrap().disconnected_at.is_some());

        registry.rebind(&identity, conn(2)).unwrap();
        let session = registry.lookup(&identity).unwrap();
        assert!(session.is_connected);
        assert!(session.disconnected_at.is_none());
        assert_eq!(session.connection_id, conn(2));
    }

    #[test]
    fn rebind_unknown_identity_is_not_found() {
        let mut registry = SessionRegistry::new();
        let err = registry
            .rebind(&Identity::Guest("ghost".into()), conn(1))
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[test]
    fn discard_removes_the_entry() {
        let mut registry = SessionRegistry::new();
        let identity = Identity::Guest("g1".into());
        registry
            .register(
                identity.clone(),
                "Spectator",
                RoomId::new("ab12cd"),
                Role::Spectator,
                None,
                conn(1),
            )
            .unwrap();

        assert!(registry.discard(&identity).is_some());
        assert!(registry.lookup(&identity).is_none());
        assert!(registry.is_empty());
    }
}
