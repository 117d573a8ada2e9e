use std::fmt;
use std::sync::Arc;

use crate::error::RelayError;
use crate::router::EventRouter;
use crate::types::ConnectionId;
use crate::user::User;

/// Where a connection is in its lifecycle.
///
/// `Connected` → `Joined` → `Disconnected`. A failed join stays in
/// `Connected`; `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Joined,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Joined => "joined",
            ConnectionState::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// The operations a client can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Join,
    SendMessage,
    SendLocation,
}

impl Operation {
    /// Name used on the wire in acknowledgments.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Join => "join",
            Operation::SendMessage => "sendMessage",
            Operation::SendLocation => "sendLocation",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One connection's state machine. Each operation checks the current
/// state before touching the router, so an out-of-order request is an
/// `InvalidState` error with no side effects.
pub struct Session {
    id: ConnectionId,
    state: ConnectionState,
    router: Arc<EventRouter>,
}

impl Session {
    pub(crate) fn new(id: ConnectionId, router: Arc<EventRouter>) -> Self {
        Self {
            id,
            state: ConnectionState::Connected,
            router,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[cfg(test)]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn require(&self, op: Operation, allowed: ConnectionState) -> Result<(), RelayError> {
        if self.state == allowed {
            Ok(())
        } else {
            Err(RelayError::InvalidState {
                op,
                state: self.state,
            })
        }
    }

    pub async fn join(&mut self, username: &str, room: &str) -> Result<User, RelayError> {
        self.require(Operation::Join, ConnectionState::Connected)?;
        let user = self.router.join(self.id, username, room).await?;
        self.state = ConnectionState::Joined;
        Ok(user)
    }

    pub async fn send_message(&mut self, text: &str) -> Result<(), RelayError> {
        self.require(Operation::SendMessage, ConnectionState::Joined)?;
        self.router.send_message(self.id, text).await
    }

    pub async fn send_location(&mut self, latitude: f64, longitude: f64) -> Result<(), RelayError> {
        self.require(Operation::SendLocation, ConnectionState::Joined)?;
        self.router.send_location(self.id, latitude, longitude).await
    }

    /// Returns the user that was removed, if this connection had joined.
    /// Calling it again does nothing.
    pub async fn disconnect(&mut self) -> Option<User> {
        if self.state == ConnectionState::Disconnected {
            return None;
        }
        self.state = ConnectionState::Disconnected;
        self.router.disconnect(self.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::error::ValidationError;
    use crate::filter::ProfanityFilter;
    use crate::registry::UserRegistry;
    use crate::transport::ChannelTransport;

    fn router() -> (Arc<EventRouter>, Arc<ChannelTransport>) {
        let transport = Arc::new(ChannelTransport::new());
        let router = Arc::new(EventRouter::new(
            UserRegistry::new(),
            transport.clone(),
            Box::new(ProfanityFilter::new()),
            &ServerConfig::builder().build(),
        ));
        (router, transport)
    }

    #[tokio::test]
    async fn messages_before_join_are_invalid() {
        let (router, transport) = router();
        let (id, mut rx) = transport.attach();
        let mut session = router.session(id);

        assert_eq!(
            session.send_message("hi").await.unwrap_err(),
            RelayError::InvalidState {
                op: Operation::SendMessage,
                state: ConnectionState::Connected,
            }
        );
        assert_eq!(
            session.send_location(1.0, 1.0).await.unwrap_err(),
            RelayError::InvalidState {
                op: Operation::SendLocation,
                state: ConnectionState::Connected,
            }
        );
        assert_eq!(session.state(), ConnectionState::Connected);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejected_join_stays_connected_and_can_retry() {
        let (router, transport) = router();
        let (id, _rx) = transport.attach();
        let mut session = router.session(id);

        let err = session.join("  ", "r1").await.unwrap_err();
        assert_eq!(err, RelayError::Validation(ValidationError::MissingField));
        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(router.registry().len().await, 0);

        session.join("alice", "r1").await.unwrap();
        assert_eq!(session.state(), ConnectionState::Joined);
    }

    #[tokio::test]
    async fn second_join_is_invalid() {
        let (router, transport) = router();
        let (id, _rx) = transport.attach();
        let mut session = router.session(id);
        session.join("alice", "r1").await.unwrap();

        let err = session.join("alice", "r2").await.unwrap_err();
        assert_eq!(
            err,
            RelayError::InvalidState {
                op: Operation::Join,
                state: ConnectionState::Joined,
            }
        );
        assert!(router.registry().get_users_in_room("r2").await.is_empty());
    }

    #[tokio::test]
    async fn disconnect_is_terminal_and_idempotent() {
        let (router, transport) = router();
        let (id, _rx) = transport.attach();
        let mut session = router.session(id);
        session.join("alice", "r1").await.unwrap();

        assert!(session.disconnect().await.is_some());
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.disconnect().await.is_none());

        assert!(matches!(
            session.send_message("still here?").await,
            Err(RelayError::InvalidState {
                state: ConnectionState::Disconnected,
                ..
            })
        ));
        assert!(matches!(
            session.join("alice", "r1").await,
            Err(RelayError::InvalidState { op: Operation::Join, .. })
        ));
        assert!(router.registry().get_user(id).await.is_none());
    }

    #[test]
    fn invalid_state_reads_naturally() {
        let err = RelayError::InvalidState {
            op: Operation::SendMessage,
            state: ConnectionState::Connected,
        };
        assert_eq!(err.to_string(), "cannot sendMessage while connected");
    }
}
