//! A multi-room ping relay.
//!
//! Every open WebSocket runs its own read loop; the registry here is the
//! only state shared between those loops. Messages relayed into a room are
//! fanned out to every other live member of that room.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use tokio::sync::mpsc::UnboundedSender;

use crate::ws::{ConnId, Msg, RoomId};

/// Membership of a single room.
///
/// The mutex is held across a broadcast's fan-out, so a join or leave is
/// atomic with respect to any broadcast's membership snapshot.
#[derive(Debug, Default)]
struct Room {
    members: Mutex<HashMap<ConnId, UnboundedSender<Msg>>>,
}

/// Process-wide mapping from room key to its live members.
///
/// Rooms are created lazily on first join and deleted when their last
/// member leaves, so a room with zero members is indistinguishable from
/// one that never existed. Each room is guarded independently; traffic in
/// one room does not contend with joins, leaves, or broadcasts in another.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, Arc<Room>>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `conn` into `room`, creating the room if it is absent.
    ///
    /// Messages broadcast into the room from this point on are delivered
    /// to `tx`. Joining twice with the same id replaces the sender; the
    /// membership set never holds duplicates.
    pub fn join(&self, room: &str, conn: ConnId, tx: UnboundedSender<Msg>) {
        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());

        rooms
            .entry(room.to_string())
            .or_default()
            .members
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(conn, tx);

        log::debug!("Connection {conn} joined room {room}");
    }

    /// Removes `conn` from `room`, deleting the room entry once it has no
    /// members.
    ///
    /// Safe to call more than once and for rooms that were never created;
    /// both are no-ops.
    pub fn leave(&self, room: &str, conn: ConnId) {
        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());

        let Some(entry) = rooms.get(room) else {
            return;
        };

        let empty = {
            let mut members = entry.members.lock().unwrap_or_else(|e| e.into_inner());
            members.remove(&conn);
            members.is_empty()
        };

        if empty {
            rooms.remove(room);
        }

        log::debug!("Connection {conn} left room {room}");
    }

    /// Delivers `msg` to every member of `room` except `sender`.
    ///
    /// A member whose receiving half is gone is removed from the room as
    /// an implicit leave; delivery to the remaining members proceeds.
    /// Broadcasting into an absent room is a no-op.
    pub fn broadcast(&self, room: &str, sender: ConnId, msg: impl Into<Msg>) {
        let entry = {
            let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
            rooms.get(room).cloned()
        };

        let Some(entry) = entry else {
            log::debug!("Broadcast into absent room {room}");
            return;
        };

        let msg = msg.into();

        let empty = {
            let mut members = entry.members.lock().unwrap_or_else(|e| e.into_inner());

            let mut dead = Vec::new();

            for (conn, tx) in &*members {
                if *conn == sender {
                    continue;
                }

                // errors if the client disconnected abruptly and its read
                // loop has not run its leave yet
                if tx.send(msg.clone()).is_err() {
                    dead.push(*conn);
                }
            }

            for conn in &dead {
                log::debug!("Dropping dead connection {conn} from room {room}");
                members.remove(conn);
            }

            members.is_empty()
        };

        if empty {
            let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());

            // the room may have been recreated or repopulated since the
            // membership lock was released
            let still_empty = rooms.get(room).is_some_and(|current| {
                Arc::ptr_eq(current, &entry)
                    && current
                        .members
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .is_empty()
            });

            if still_empty {
                rooms.remove(room);
            }
        }
    }

    /// Whether `conn` is currently a member of `room`.
    #[must_use]
    pub fn is_member(&self, room: &str, conn: ConnId) -> bool {
        self.rooms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(room)
            .is_some_and(|entry| {
                entry
                    .members
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .contains_key(&conn)
            })
    }

    /// Number of live members in `room`; zero when the room is absent.
    #[must_use]
    pub fn room_len(&self, room: &str) -> usize {
        self.rooms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(room)
            .map_or(0, |entry| {
                entry
                    .members
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .len()
            })
    }

    /// Number of rooms currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    use super::*;

    fn join(registry: &RoomRegistry, room: &str, conn: ConnId) -> UnboundedReceiver<Msg> {
        let (tx, rx) = unbounded_channel();
        registry.join(room, conn, tx);
        rx
    }

    fn drain(rx: &mut UnboundedReceiver<Msg>) -> Vec<Msg> {
        let mut messages = Vec::new();

        while let Ok(msg) = rx.try_recv() {
            messages.push(msg);
        }

        messages
    }

    #[test]
    fn test_membership_tracks_joins_and_leaves() {
        let registry = RoomRegistry::new();

        let _a = join(&registry, "r1", 1);
        let _b = join(&registry, "r1", 2);
        let _c = join(&registry, "r1", 3);

        registry.leave("r1", 2);

        assert!(registry.is_member("r1", 1));
        assert!(!registry.is_member("r1", 2));
        assert!(registry.is_member("r1", 3));
        assert_eq!(registry.room_len("r1"), 2);
    }

    #[test]
    fn test_duplicate_join_is_absorbed() {
        let registry = RoomRegistry::new();

        let _first = join(&registry, "r1", 1);
        let _second = join(&registry, "r1", 1);

        assert_eq!(registry.room_len("r1"), 1);
    }

    #[test]
    fn test_broadcast_reaches_everyone_but_the_sender() {
        let registry = RoomRegistry::new();

        let mut a = join(&registry, "r1", 1);
        let mut b = join(&registry, "r1", 2);

        registry.broadcast("r1", 1, "hi");

        assert_eq!(drain(&mut b), vec!["hi".to_string()]);
        assert_eq!(drain(&mut a), Vec::<Msg>::new());
    }

    #[test]
    fn test_broadcast_after_peer_leaves_delivers_nothing() {
        let registry = RoomRegistry::new();

        let mut a = join(&registry, "r1", 1);
        let mut b = join(&registry, "r1", 2);

        registry.broadcast("r1", 1, "hi");
        assert_eq!(drain(&mut b), vec!["hi".to_string()]);

        registry.leave("r1", 2);

        registry.broadcast("r1", 1, "yo");

        assert_eq!(drain(&mut a), Vec::<Msg>::new());
        assert_eq!(drain(&mut b), Vec::<Msg>::new());
    }

    #[test]
    fn test_dead_recipient_is_implicitly_removed() {
        let registry = RoomRegistry::new();

        let mut a = join(&registry, "r2", 1);
        let b = join(&registry, "r2", 2);
        let mut c = join(&registry, "r2", 3);

        // simulate an abrupt disconnect of B's receiving half
        drop(b);

        registry.broadcast("r2", 1, "x");

        assert_eq!(drain(&mut c), vec!["x".to_string()]);
        assert_eq!(drain(&mut a), Vec::<Msg>::new());
        assert!(!registry.is_member("r2", 2));
        assert_eq!(registry.room_len("r2"), 2);
    }

    #[test]
    fn test_empty_room_is_deleted() {
        let registry = RoomRegistry::new();

        let _a = join(&registry, "r1", 1);
        let _b = join(&registry, "r1", 2);
        assert_eq!(registry.len(), 1);

        registry.leave("r1", 1);
        registry.leave("r1", 2);

        assert!(registry.is_empty());
        assert_eq!(registry.room_len("r1"), 0);
    }

    #[test]
    fn test_room_emptied_by_dead_recipients_is_deleted() {
        let registry = RoomRegistry::new();

        let a = join(&registry, "r1", 1);
        drop(a);

        // the sender is not a member; the only member's channel is gone
        registry.broadcast("r1", 2, "x");

        assert!(registry.is_empty());
    }

    #[test]
    fn test_leave_is_idempotent() {
        let registry = RoomRegistry::new();

        let _a = join(&registry, "r1", 1);

        registry.leave("r1", 1);
        registry.leave("r1", 1);

        assert!(registry.is_empty());
    }

    #[test]
    fn test_operations_on_absent_rooms_are_no_ops() {
        let registry = RoomRegistry::new();

        registry.broadcast("nowhere", 1, "hi");
        registry.leave("nowhere", 1);

        assert!(registry.is_empty());
    }

    #[test]
    fn test_per_sender_order_is_preserved() {
        let registry = RoomRegistry::new();

        let _a = join(&registry, "r1", 1);
        let mut b = join(&registry, "r1", 2);

        registry.broadcast("r1", 1, "one");
        registry.broadcast("r1", 1, "two");
        registry.broadcast("r1", 1, "three");

        assert_eq!(
            drain(&mut b),
            vec!["one".to_string(), "two".to_string(), "three".to_string()]
        );
    }

    #[test]
    fn test_concurrent_joins_and_broadcasts() {
        const CONNECTIONS: usize = 100;
        const BROADCASTS: usize = 50;

        let registry = RoomRegistry::new();

        let receivers = thread::scope(|scope| {
            let mut joins = Vec::with_capacity(CONNECTIONS);

            for conn in 1..=CONNECTIONS {
                let registry = &registry;
                joins.push(scope.spawn(move || (conn, join(registry, "r3", conn))));
            }

            for i in 0..BROADCASTS {
                let registry = &registry;
                scope.spawn(move || {
                    registry.broadcast("r3", i % CONNECTIONS + 1, format!("msg-{i}"));
                });
            }

            joins
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });

        assert_eq!(registry.room_len("r3"), CONNECTIONS);

        // all receivers are alive, so no send can have failed: each
        // broadcast reached every member present at its instant exactly
        // once, and never its own sender
        for (conn, mut rx) in receivers {
            let messages = drain(&mut rx);

            for i in 0..BROADCASTS {
                let copies = messages
                    .iter()
                    .filter(|m| m.as_str() == format!("msg-{i}"))
                    .count();

                assert!(copies <= 1, "connection {conn} saw msg-{i} {copies} times");

                if i % CONNECTIONS + 1 == conn {
                    assert_eq!(copies, 0, "connection {conn} received its own msg-{i}");
                }
            }
        }

        // after the dust settles every member sees a broadcast exactly once
        let mut receivers = (1..=CONNECTIONS)
            .map(|conn| (conn, join(&registry, "r3", conn)))
            .collect::<Vec<_>>();

        registry.broadcast("r3", 1, "final");

        for (conn, rx) in &mut receivers {
            let expected = usize::from(*conn != 1);
            assert_eq!(
                drain(rx)
                    .iter()
                    .filter(|m| m.as_str() == "final")
                    .count(),
                expected,
                "connection {conn}"
            );
        }
    }
}
