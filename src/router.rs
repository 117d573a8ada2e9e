use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::RelayError;
use crate::filter::ContentFilter;
use crate::message::{ChatMessage, LocationMessage, RoomData, ServerEvent};
use crate::registry::UserRegistry;
use crate::session::Session;
use crate::transport::Transport;
use crate::types::ConnectionId;
use crate::user::User;

/// Turns connection events into registry updates and outbound events.
///
/// The router never tracks connection state itself; `Session` does that
/// and only calls in here for transitions that are legal.
pub struct EventRouter {
    registry: UserRegistry,
    transport: Arc<dyn Transport>,
    filter: Box<dyn ContentFilter>,
    admin_name: String,
    welcome: String,
}

impl EventRouter {
    pub fn new(
        registry: UserRegistry,
        transport: Arc<dyn Transport>,
        filter: Box<dyn ContentFilter>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            filter,
            admin_name: config.admin_name.clone(),
            welcome: config.welcome.clone(),
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &UserRegistry {
        &self.registry
    }

    /// Start tracking a freshly connected socket.
    pub fn session(self: &Arc<Self>, id: ConnectionId) -> Session {
        Session::new(id, Arc::clone(self))
    }

    fn notice(&self, text: String) -> ServerEvent {
        ServerEvent::Message(ChatMessage::new(&self.admin_name, text))
    }

    /// Welcome the joiner, announce them to the others, then send the
    /// roster to everyone. Each recipient sees these in that order.
    pub(crate) async fn join(
        &self,
        id: ConnectionId,
        username: &str,
        room: &str,
    ) -> Result<User, RelayError> {
        let user = match self.registry.add_user(id, username, room).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(conn = %id, username, room, error = %e, "join rejected");
                return Err(e.into());
            }
        };
        tracing::info!(conn = %id, username = %user.username, room = %user.room, "joined");

        let occupants = self.registry.get_users_in_room(&user.room).await;
        let everyone: Vec<ConnectionId> = occupants.iter().map(|u| u.id).collect();
        let others: Vec<ConnectionId> = everyone.iter().copied().filter(|&c| c != id).collect();

        self.transport.send(id, self.notice(self.welcome.clone()));
        self.transport.send_many(
            &others,
            &self.notice(format!("{} has joined the chat!", user.username)),
        );
        self.transport.send_many(
            &everyone,
            &ServerEvent::RoomData(RoomData::new(&user.room, &occupants)),
        );

        Ok(user)
    }

    pub(crate) async fn send_message(&self, id: ConnectionId, text: &str) -> Result<(), RelayError> {
        let user = self.sender(id).await?;

        if self.filter.is_profane(text) {
            tracing::info!(conn = %id, room = %user.room, "message rejected by filter");
            return Err(RelayError::ProfanityRejected);
        }

        let targets = self.room_members(&user.room).await;
        tracing::debug!(conn = %id, room = %user.room, recipients = targets.len(), "relaying message");
        self.transport.send_many(
            &targets,
            &ServerEvent::Message(ChatMessage::new(&user.username, text)),
        );
        Ok(())
    }

    pub(crate) async fn send_location(
        &self,
        id: ConnectionId,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), RelayError> {
        let user = self.sender(id).await?;

        let targets = self.room_members(&user.room).await;
        tracing::debug!(conn = %id, room = %user.room, recipients = targets.len(), "relaying location");
        self.transport.send_many(
            &targets,
            &ServerEvent::LocationMessage(LocationMessage::new(&user.username, latitude, longitude)),
        );
        Ok(())
    }

    /// Drop the connection's user, if any, and tell whoever is left.
    pub(crate) async fn disconnect(&self, id: ConnectionId) -> Option<User> {
        let user = self.registry.remove_user(id).await?;
        tracing::info!(conn = %id, username = %user.username, room = %user.room, "left");

        let remaining = self.registry.get_users_in_room(&user.room).await;
        let targets: Vec<ConnectionId> = remaining.iter().map(|u| u.id).collect();

        self.transport.send_many(
            &targets,
            &self.notice(format!("{} has left!", user.username)),
        );
        self.transport.send_many(
            &targets,
            &ServerEvent::RoomData(RoomData::new(&user.room, &remaining)),
        );

        Some(user)
    }

    async fn sender(&self, id: ConnectionId) -> Result<User, RelayError> {
        self.registry.get_user(id).await.ok_or_else(|| {
            tracing::warn!(conn = %id, "event from connection with no user");
            RelayError::UnknownSender(id)
        })
    }

    async fn room_members(&self, room: &str) -> Vec<ConnectionId> {
        self.registry
            .get_users_in_room(room)
            .await
            .into_iter()
            .map(|u| u.id)
            .collect()
    }
}
