//! Process-wide map from room code to room.
//!
//! Each room sits behind its own `tokio::sync::Mutex`, so operations on one room never
//! wait on another. The map itself is a `DashMap`; lookups on different codes only
//! contend on a shard lock for the duration of the lookup.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::state::room::{Room, RoomCode};

/// Handle to one room. Lock it to read or mutate the room.
pub type SharedRoom = Arc<Mutex<Room>>;

#[derive(Default)]
pub struct RoomStore {
    rooms: DashMap<RoomCode, SharedRoom>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the room for `code`, creating an empty one on first access.
    pub fn get_or_create(&self, code: &RoomCode) -> SharedRoom {
        self.rooms
            .entry(code.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Room::new(code.clone()))))
            .value()
            .clone()
    }

    pub fn get(&self, code: &RoomCode) -> Option<SharedRoom> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    /// Remove `room` from the map, unless the code was already reused by a newer room.
    pub fn remove(&self, code: &RoomCode, room: &SharedRoom) -> bool {
        self.rooms
            .remove_if(code, |_, current| Arc::ptr_eq(current, room))
            .is_some()
    }

    /// Handles of every live room.
    pub fn rooms(&self) -> Vec<SharedRoom> {
        self.rooms.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn code(raw: &str) -> RoomCode {
        RoomCode::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_and_case_insensitive() {
        let store = RoomStore::new();
        let first = store.get_or_create(&code("abc"));
        let second = store.get_or_create(&code("ABC"));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
        assert_eq!(first.lock().await.code().as_str(), "ABC");
    }

    #[tokio::test]
    async fn removed_code_comes_back_fresh() {
        let store = RoomStore::new();
        let room_code = code("fresh");
        let room = store.get_or_create(&room_code);
        room.lock().await.add_connection(Uuid::new_v4());

        assert!(store.remove(&room_code, &room));
        assert!(store.get(&room_code).is_none());

        let again = store.get_or_create(&room_code);
        assert!(!Arc::ptr_eq(&room, &again));
        assert_eq!(again.lock().await.connection_count(), 0);
    }

    #[tokio::test]
    async fn stale_handle_does_not_remove_newer_room() {
        let store = RoomStore::new();
        let room_code = code("reuse");
        let old = store.get_or_create(&room_code);
        store.remove(&room_code, &old);
        let new = store.get_or_create(&room_code);

        assert!(!store.remove(&room_code, &old));
        assert!(store.get(&room_code).is_some_and(|room| Arc::ptr_eq(&room, &new)));
    }

    #[tokio::test]
    async fn holding_one_room_does_not_block_another() {
        let store = RoomStore::new();
        let a = store.get_or_create(&code("a"));
        let b = store.get_or_create(&code("b"));

        let _held = a.lock().await;
        let guard = tokio::time::timeout(std::time::Duration::from_millis(100), b.lock()).await;
        assert!(guard.is_ok());
    }
}
