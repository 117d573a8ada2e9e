use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::error::ValidationError;
use crate::room::RoomIndex;
use crate::types::ConnectionId;
use crate::user::User;

struct Inner {
    users: HashMap<ConnectionId, User>,
    rooms: RoomIndex,
}

/// Owns every `User` and the room index derived from them.
///
/// One mutex guards both maps, so the uniqueness check and the insert in
/// `add_user` happen as a single step. Callers only ever get clones back.
pub struct UserRegistry {
    inner: Mutex<Inner>,
}

impl Default for UserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UserRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                users: HashMap::new(),
                rooms: RoomIndex::new(),
            }),
        }
    }

    /// Register `id` as `username` in `room`. Both are trimmed first.
    pub async fn add_user(
        &self,
        id: ConnectionId,
        username: &str,
        room: &str,
    ) -> Result<User, ValidationError> {
        let username = username.trim();
        let room = room.trim();
        if username.is_empty() || room.is_empty() {
            return Err(ValidationError::MissingField);
        }

        let mut inner = self.inner.lock().await;
        if inner.users.contains_key(&id) {
            return Err(ValidationError::AlreadyJoined);
        }

        let taken = inner
            .rooms
            .occupants(room)
            .iter()
            .filter_map(|member| inner.users.get(member))
            .any(|existing| existing.same_name(username));
        if taken {
            return Err(ValidationError::UsernameTaken);
        }

        let user = User::new(id, username, room);
        inner.rooms.insert(room, id);
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    /// Remove and return the user for `id`. Unknown ids are a no-op.
    pub async fn remove_user(&self, id: ConnectionId) -> Option<User> {
        let mut inner = self.inner.lock().await;
        let user = inner.users.remove(&id)?;
        inner.rooms.remove(&user.room, id);
        Some(user)
    }

    pub async fn get_user(&self, id: ConnectionId) -> Option<User> {
        self.inner.lock().await.users.get(&id).cloned()
    }

    /// Users in `room` (exact match) in the order they joined.
    pub async fn get_users_in_room(&self, room: &str) -> Vec<User> {
        let inner = self.inner.lock().await;
        inner
            .rooms
            .occupants(room)
            .iter()
            .filter_map(|id| inner.users.get(id).cloned())
            .collect()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.users.len()
    }
}
