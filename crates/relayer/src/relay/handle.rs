//! Connection handle: the relay's in-memory view of one live peer.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use shared::Role;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Opaque payload relayed verbatim between peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(t) => t.len(),
            Self::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Item queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Payload(Payload),
    Close,
}

/// Inbound frame as seen by the lifecycle controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Payload(Payload),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Closing,
    Closed,
}

/// Why a send to a handle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,

    #[error("outbound queue full")]
    Backlogged,
}

/// One peer's bidirectional channel.
///
/// Sends go into a bounded queue drained by the connection's writer task, so
/// [`ConnectionHandle::send`] never suspends. Receiving is owned by the
/// lifecycle controller and is not part of the handle.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: Uuid,
    role: Role,
    identity: Option<String>,
    connected_at: DateTime<Utc>,
    state: Mutex<LifecycleState>,
    outbound: mpsc::Sender<Outbound>,
    teardown: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle plus the receiving end its writer task drains.
    ///
    /// Identities are only kept for reporters; empty identities are dropped.
    pub fn new(
        role: Role,
        identity: Option<String>,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let identity = match role {
            Role::Reporter => identity
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty()),
            Role::Viewer => None,
        };
        let handle = Self {
            id: Uuid::new_v4(),
            role,
            identity,
            connected_at: Utc::now(),
            state: Mutex::new(LifecycleState::Active),
            outbound: tx,
            teardown: CancellationToken::new(),
        };
        (handle, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Only the lifecycle controller moves a handle between states.
    pub(crate) fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != LifecycleState::Closed {
            *state = next;
        }
    }

    /// True while the writer task is still draining the queue.
    pub fn is_connected(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Resolves once the writer task has dropped its end of the queue.
    pub async fn outbound_closed(&self) {
        self.outbound.closed().await
    }

    /// Mark the connection as failed so its controller tears it down.
    pub(crate) fn evict(&self) {
        self.teardown.cancel();
    }

    /// Resolves once the relay has evicted this connection.
    pub async fn evicted(&self) {
        self.teardown.cancelled().await
    }

    /// Queue a payload for delivery without waiting.
    pub fn send(&self, payload: Payload) -> Result<(), SendError> {
        if self.state() == LifecycleState::Closed {
            return Err(SendError::Closed);
        }
        self.outbound
            .try_send(Outbound::Payload(payload))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SendError::Backlogged,
                mpsc::error::TrySendError::Closed(_) => SendError::Closed,
            })
    }

    /// Ask the writer task to close the transport. Best effort.
    pub fn close(&self) {
        let _ = self.outbound.try_send(Outbound::Close);
    }
}
