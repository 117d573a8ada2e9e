use thiserror::Error;

use crate::session::{ConnectionState, Operation};
use crate::types::ConnectionId;

/// Failures of the network layer and process bootstrap.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

/// Why a join was refused. The registry is left untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Username and room are required!")]
    MissingField,

    #[error("Username is in use!")]
    UsernameTaken,

    #[error("connection has already joined a room")]
    AlreadyJoined,
}

/// Errors reported back to the connection that issued an operation.
/// None of them are ever broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Profanity is not allowed!")]
    ProfanityRejected,

    #[error("no user registered for {0}")]
    UnknownSender(ConnectionId),

    #[error("cannot {op} while {state}")]
    InvalidState {
        op: Operation,
        state: ConnectionState,
    },
}
