//! Cached room list on the client.

use crate::entities::Room;

/// Rooms the current user can see, ordered by creation time.
#[derive(Debug, Default, Clone)]
pub struct RoomDirectory {
    rooms: Vec<Room>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache with a freshly fetched list.
    pub fn replace_all(&mut self, rooms: Vec<Room>) {
        self.rooms = rooms;
        self.sort();
    }

    /// Insert or update one room.
    pub fn upsert(&mut self, room: Room) {
        match self.rooms.iter_mut().find(|existing| existing.id == room.id) {
            Some(existing) => *existing = room,
            None => self.rooms.push(room),
        }
        self.sort();
    }

    /// Drop a room from the cache; returns it when it was cached.
    pub fn remove(&mut self, room_id: &str) -> Option<Room> {
        let index = self.rooms.iter().position(|room| room.id == room_id)?;
        Some(self.rooms.remove(index))
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.iter().find(|room| room.id == room_id)
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.get(room_id).is_some()
    }

    pub fn list(&self) -> &[Room] {
        &self.rooms
    }

    fn sort(&mut self) {
        self.rooms.sort_by_key(|room| room.created_at);
    }
}
