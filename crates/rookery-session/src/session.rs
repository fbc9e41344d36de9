//! The session type: the Session Registry's record of one identity's
//! standing in a room.

use std::time::Instant;

use rookery_protocol::{Role, RoomId, Side};
use rookery_transport::ConnectionId;

use crate::Identity;

/// One identity's participation in one room.
///
/// Created by [`crate::SessionRegistry::register`] on admission (as host,
/// opponent, or spectator) and updated in place across disconnects,
/// reconnects, and role-preserving events. A session never changes which
/// room it belongs to — leaving a room discards the session entirely
/// (`SessionRegistry::discard`), it doesn't transition it.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub display_name: String,
    pub room_id: RoomId,
    pub role: Role,
    /// `None` for spectators; `Some` for host (always white) and opponent
    /// (always black) per the data model's color invariant.
    pub color: Option<Side>,
    /// The connection currently carrying this session. Rewritten by
    /// `rebind` on reconnect.
    pub connection_id: ConnectionId,
    pub is_connected: bool,
    /// When this session last transitioned to disconnected. `None` while
    /// connected. The grace-period check (§5) reads this but does not
    /// live here — it's the room's active sweep that compares it against
    /// the 60s player grace window.
    pub disconnected_at: Option<Instant>,
}

impl Session {
    pub fn new(
        identity: Identity,
        display_name: String,
        room_id: RoomId,
        role: Role,
        color: Option<Side>,
        connection_id: ConnectionId,
    ) -> Self {
        Session {
            identity,
            display_name,
            room_id,
            role,
            color,
            connection_id,
            is_connected: true,
            disconnected_at: None,
        }
    }

    /// Seconds elapsed since this session disconnected, or `None` if it's
    /// currently connected.
    pub fn disconnected_for(&self) -> Option<std::time::Duration> {
        self.disconnected_at.map(|since| since.elapsed())
    }
}
