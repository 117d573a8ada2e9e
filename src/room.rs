use std::collections::HashMap;

use crate::types::ConnectionId;

/// The members of one room, kept in join order.
#[derive(Debug)]
struct Room {
    members: Vec<ConnectionId>,
}

impl Room {
    fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    fn add_member(&mut self, id: ConnectionId) {
        if !self.members.contains(&id) {
            self.members.push(id);
        }
    }

    fn remove_member(&mut self, id: ConnectionId) {
        self.members.retain(|&m| m != id);
    }
}

/// Live index from room name to the connections currently in it.
///
/// Room names are matched exactly. A room exists only while it has at
/// least one member; the last leave drops it.
#[derive(Debug, Default)]
pub struct RoomIndex {
    rooms: HashMap<String, Room>,
}

impl RoomIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, room: &str, id: ConnectionId) {
        self.rooms
            .entry(room.to_string())
            .or_insert_with(Room::new)
            .add_member(id);
    }

    pub fn remove(&mut self, room: &str, id: ConnectionId) {
        let Some(entry) = self.rooms.get_mut(room) else {
            return;
        };
        entry.remove_member(id);
        if entry.members.is_empty() {
            self.rooms.remove(room);
        }
    }

    /// Occupants of `room` in join order; empty if the room is unknown.
    pub fn occupants(&self, room: &str) -> &[ConnectionId] {
        self.rooms
            .get(room)
            .map(|r| r.members.as_slice())
            .unwrap_or(&[])
    }

    #[cfg(test)]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
