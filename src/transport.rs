use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::message::ServerEvent;
use crate::types::ConnectionId;

/// Delivers events to individual connections.
///
/// Sends are fire-and-forget: the relay decides who gets what, the
/// transport only hands the event to the socket. Events sent to one
/// connection arrive in the order they were sent.
pub trait Transport: Send + Sync {
    fn send(&self, to: ConnectionId, event: ServerEvent);

    fn send_many(&self, targets: &[ConnectionId], event: &ServerEvent) {
        for &target in targets {
            self.send(target, event.clone());
        }
    }
}

/// Events queued per connection before further sends to it are dropped.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 64;

/// A transport backed by one bounded channel per connection. The socket
/// task owns the receiving half and writes whatever arrives. A connection
/// that stops reading loses events once its outbox is full; nobody else
/// is held up by it.
pub struct ChannelTransport {
    next_id: AtomicU64,
    capacity: usize,
    outboxes: Mutex<HashMap<ConnectionId, mpsc::Sender<ServerEvent>>>,
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_OUTBOX_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            outboxes: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate an id for a new connection and open its outbox.
    pub fn attach(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.capacity);
        self.outboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        (id, rx)
    }

    /// Close the outbox. The receiver drains what is queued, then ends.
    pub fn detach(&self, id: ConnectionId) {
        self.outboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub fn connection_count(&self) -> usize {
        self.outboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Transport for ChannelTransport {
    fn send(&self, to: ConnectionId, event: ServerEvent) {
        let outboxes = self.outboxes.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = outboxes.get(&to) else {
            tracing::debug!(conn = %to, "dropping event for detached connection");
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!(conn = %to, "outbox full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(conn = %to, "dropping event, receiver closed");
            }
        }
    }
}
