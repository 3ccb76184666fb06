//! Process-wide room registry keyed by initiator public key.

use crate::room::Room;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use signaling_types::Key;
use std::sync::Arc;

/// All rooms with at least one connection.
///
/// Membership is counted under the map's shard lock, so a room is never
/// reaped while a client is joining it.
#[derive(Debug)]
pub struct Rooms {
    rooms: DashMap<Key, Arc<Room>>,
    reap_empty: bool,
}

impl Rooms {
    /// Create an empty registry.
    pub fn new(reap_empty: bool) -> Self {
        Self {
            rooms: DashMap::new(),
            reap_empty,
        }
    }

    /// Get or create the room for `initiator_key` and count one member in.
    pub fn join(&self, initiator_key: Key) -> Arc<Room> {
        let room = self
            .rooms
            .entry(initiator_key)
            .or_insert_with(|| {
                tracing::debug!(initiator = ?initiator_key, "Creating room");
                Arc::new(Room::new(initiator_key))
            });
        room.join();
        room.value().clone()
    }

    /// Count one member out; removes the room once empty when reaping is on.
    pub fn leave(&self, room: &Arc<Room>) {
        match self.rooms.entry(room.initiator_key()) {
            Entry::Occupied(entry) if Arc::ptr_eq(entry.get(), room) => {
                if room.leave() == 0 && self.reap_empty {
                    tracing::debug!(initiator = ?room.initiator_key(), "Removing empty room");
                    entry.remove();
                }
            }
            _ => {
                room.leave();
            }
        }
    }

    /// Look up a room.
    pub fn get(&self, initiator_key: &Key) -> Option<Arc<Room>> {
        self.rooms.get(initiator_key).map(|r| r.value().clone())
    }

    /// Number of rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether there are no rooms.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Connections across all rooms.
    pub fn total_clients(&self) -> usize {
        self.rooms.iter().map(|r| r.value().members()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> Key {
        Key::from_bytes([byte; 32])
    }

    #[test]
    fn join_creates_once() {
        let rooms = Rooms::new(true);
        let a = rooms.join(key(1));
        let b = rooms.join(key(1));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms.total_clients(), 2);
    }

    #[test]
    fn rooms_are_independent() {
        let rooms = Rooms::new(true);
        let a = rooms.join(key(1));
        let b = rooms.join(key(2));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(rooms.len(), 2);
    }

    #[test]
    fn last_leave_reaps() {
        let rooms = Rooms::new(true);
        let a = rooms.join(key(1));
        let b = rooms.join(key(1));

        rooms.leave(&a);
        assert!(rooms.get(&key(1)).is_some());
        rooms.leave(&b);
        assert!(rooms.get(&key(1)).is_none());
        assert!(rooms.is_empty());
    }

    #[test]
    fn reaping_can_be_disabled() {
        let rooms = Rooms::new(false);
        let a = rooms.join(key(1));
        rooms.leave(&a);
        let kept = rooms.get(&key(1)).unwrap();
        assert_eq!(kept.members(), 0);
        assert!(Arc::ptr_eq(&kept, &a));
    }

    #[test]
    fn rejoin_after_reap_creates_fresh_room() {
        let rooms = Rooms::new(true);
        let old = rooms.join(key(1));
        rooms.leave(&old);
        let new = rooms.join(key(1));
        assert!(!Arc::ptr_eq(&old, &new));

        // A stale handle leaving must not reap the live room.
        rooms.leave(&old);
        assert!(rooms.get(&key(1)).is_some());
        assert_eq!(new.members(), 1);
    }
}
