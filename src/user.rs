use crate::types::ConnectionId;

/// A chat participant bound to exactly one live connection.
///
/// Fields never change after a successful join. Renaming or switching rooms
/// means disconnecting and joining again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: ConnectionId,
    pub username: String,
    pub room: String,
}

impl User {
    pub fn new(id: ConnectionId, username: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            room: room.into(),
        }
    }

    /// Whether `other` would collide with this user's name.
    pub fn same_name(&self, other: &str) -> bool {
        normalize_username(&self.username) == normalize_username(other)
    }
}

/// Usernames compare trimmed and case-insensitively. Rooms are only trimmed.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}
