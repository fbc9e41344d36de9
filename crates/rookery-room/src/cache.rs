//! The Room Store's write-through cache (§4.3, §9). A room's canonical
//! state always lives in its actor; the cache is a read-side accelerator
//! for the public catalog and is never consulted for correctness — losing
//! it, or serving a stale entry from it briefly, is never visible as a
//! protocol violation.
//!
//! No example in this workspace's corpus pulls in `redis` or any other
//! external cache client, so the only implementation shipped here is an
//! in-memory one. A real deployment wanting a shared cache across
//! processes would implement this trait against whatever store it already
//! depends on; see DESIGN.md.

use std::collections::HashMap;
use std::sync::Mutex;

use rookery_protocol::{RoomId, RoomListEntry};

/// Advisory cache of public catalog entries, keyed by room id.
pub trait RoomCache: Send + Sync {
    fn put(&self, entry: RoomListEntry);
    fn get(&self, room_id: &RoomId) -> Option<RoomListEntry>;
    fn delete(&self, room_id: &RoomId);
    fn all(&self) -> Vec<RoomListEntry>;
}

/// The default, in-process cache. Good enough for a single server instance;
/// a multi-instance deployment would swap this for a shared store without
/// changing any caller.
#[derive(Default)]
pub struct InMemoryRoomCache {
    entries: Mutex<HashMap<RoomId, RoomListEntry>>,
}

impl InMemoryRoomCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomCache for InMemoryRoomCache {
    fn put(&self, entry: RoomListEntry) {
        let mut entries = self.entries.lock().expect("room cache poisoned");
        entries.insert(entry.room_id.clone(), entry);
    }

    fn get(&self, room_id: &RoomId) -> Option<RoomListEntry> {
        let entries = self.entries.lock().expect("room cache poisoned");
        entries.get(room_id).cloned()
    }

    fn delete(&self, room_id: &RoomId) {
        let mut entries = self.entries.lock().expect("room cache poisoned");
        entries.remove(room_id);
    }

    fn all(&self) -> Vec<RoomListEntry> {
        let entries = self.entries.lock().expect("room cache poisoned");
        entries.values().cloned().collect()
    }
}
