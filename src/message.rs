use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::user::User;

/// Everything the relay can push to a connection.
///
/// Encoded as `{"event": "...", "data": {...}}`, one event per line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Message(ChatMessage),
    LocationMessage(LocationMessage),
    RoomData(RoomData),
    Ack(Ack),
}

/// A text line attributed to `username`. System notices use the admin name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub username: String,
    pub text: String,
    pub created_at: u64,
}

impl ChatMessage {
    pub fn new(username: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            text: text.into(),
            created_at: now_millis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationMessage {
    pub username: String,
    pub url: String,
    pub created_at: u64,
}

impl LocationMessage {
    pub fn new(username: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            username: username.into(),
            url: map_link(latitude, longitude),
            created_at: now_millis(),
        }
    }
}

/// Roster of a room: usernames in join order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomData {
    pub room: String,
    pub users: Vec<String>,
}

impl RoomData {
    pub fn new(room: impl Into<String>, users: &[User]) -> Self {
        Self {
            room: room.into(),
            users: users.iter().map(|u| u.username.clone()).collect(),
        }
    }
}

/// Reply to the connection that issued an operation. `error` is `None`
/// on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub op: String,
    pub error: Option<String>,
}

impl Ack {
    pub fn ok(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            error: None,
        }
    }

    pub fn err(op: impl Into<String>, error: impl ToString) -> Self {
        Self {
            op: op.into(),
            error: Some(error.to_string()),
        }
    }
}

pub fn map_link(latitude: f64, longitude: f64) -> String {
    format!("https://google.com/maps?q={latitude},{longitude}")
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::ConnectionId;

    #[test]
    fn message_encodes_with_event_tag() {
        let mut msg = ChatMessage::new("alice", "hello");
        msg.created_at = 1_700_000_000_000;
        let value = serde_json::to_value(ServerEvent::Message(msg)).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "message",
                "data": { "username": "alice", "text": "hello", "createdAt": 1_700_000_000_000u64 }
            })
        );
    }

    #[test]
    fn location_builds_map_link() {
        let loc = LocationMessage::new("bob", 51.5, -0.12);
        assert_eq!(loc.url, "https://google.com/maps?q=51.5,-0.12");
        let value = serde_json::to_value(ServerEvent::LocationMessage(loc)).unwrap();
        assert_eq!(value["event"], "locationMessage");
        assert!(value["data"]["createdAt"].as_u64().unwrap() > 0);
    }

    #[test]
    fn room_data_lists_usernames() {
        let users = [
            User::new(ConnectionId::new(1), "alice", "r1"),
            User::new(ConnectionId::new(2), "bob", "r1"),
        ];
        let value = serde_json::to_value(ServerEvent::RoomData(RoomData::new("r1", &users))).unwrap();
        assert_eq!(
            value,
            json!({ "event": "roomData", "data": { "room": "r1", "users": ["alice", "bob"] } })
        );
    }

    #[test]
    fn ack_carries_null_error_on_success() {
        let value = serde_json::to_value(ServerEvent::Ack(Ack::ok("join"))).unwrap();
        assert_eq!(value, json!({ "event": "ack", "data": { "op": "join", "error": null } }));
    }
}
