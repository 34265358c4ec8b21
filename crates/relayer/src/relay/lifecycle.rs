//! Per-connection control loop: admit, pump inbound frames, unregister.

use std::fmt::Display;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use shared::{Role, RouteResponse, WsEnvelope};
use tokio::sync::mpsc;

use super::{ConnectionHandle, Frame, LifecycleState, Outbound, Payload, RelayState};

/// Why a connection's loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    /// Peer sent a close frame.
    Closed,
    /// Inbound stream ended without a close frame.
    Ended,
    /// Receive failed.
    Error(String),
    /// Outbound side is gone or the relay evicted the connection after a
    /// failed send.
    SendFailed,
}

/// An admitted, registered connection.
pub struct Session {
    relay: Arc<RelayState>,
    handle: Arc<ConnectionHandle>,
}

/// Register `handle` and hand back the session that owns its loop.
pub fn admit(relay: Arc<RelayState>, handle: Arc<ConnectionHandle>) -> Session {
    if let Some(prev) = relay.registry().register(handle.clone()) {
        tracing::info!(
            identity = handle.identity().unwrap_or_default(),
            superseded = %prev.id(),
            superseded_connected = prev.is_connected(),
            conn_id = %handle.id(),
            "reporter identity re-registered"
        );
    }
    tracing::info!(
        conn_id = %handle.id(),
        role = %handle.role(),
        identity = handle.identity().unwrap_or_default(),
        "connection admitted"
    );
    Session { relay, handle }
}

impl Session {
    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    /// Receive until close or error, dispatching each payload by role.
    /// Always unregisters before returning.
    pub async fn run<S, E>(self, inbound: S) -> Disconnect
    where
        S: Stream<Item = Result<Frame, E>>,
        E: Display,
    {
        let mut inbound = std::pin::pin!(inbound);
        let reason = loop {
            let next = tokio::select! {
                next = inbound.next() => next,
                _ = self.handle.outbound_closed() => break Disconnect::SendFailed,
                _ = self.handle.evicted() => break Disconnect::SendFailed,
            };
            match next {
                Some(Ok(Frame::Payload(payload))) => self.dispatch(payload),
                Some(Ok(Frame::Close)) => break Disconnect::Closed,
                Some(Err(e)) => break Disconnect::Error(e.to_string()),
                None => break Disconnect::Ended,
            }
        };
        self.handle.set_state(LifecycleState::Closing);
        self.relay.registry().unregister(&self.handle);
        self.handle.close();
        self.handle.set_state(LifecycleState::Closed);
        tracing::info!(
            conn_id = %self.handle.id(),
            role = %self.handle.role(),
            reason = ?reason,
            "connection closed"
        );
        reason
    }

    fn dispatch(&self, payload: Payload) {
        match self.handle.role() {
            Role::Reporter => {
                self.relay.broadcast(&payload);
            }
            Role::Viewer => {
                tracing::debug!(
                    conn_id = %self.handle.id(),
                    bytes = payload.len(),
                    "ignoring viewer message"
                );
            }
        }
    }
}

/// Administrative channel bound to one reporter identity: every inbound
/// payload is routed to `target` and answered with a `route_result` envelope.
/// The channel itself is never registered.
pub async fn run_operator<S, E>(
    relay: Arc<RelayState>,
    target: String,
    inbound: S,
    reply: mpsc::Sender<Outbound>,
) -> Disconnect
where
    S: Stream<Item = Result<Frame, E>>,
    E: Display,
{
    let mut inbound = std::pin::pin!(inbound);
    tracing::info!(identity = %target, "operator channel opened");
    let reason = loop {
        match inbound.next().await {
            Some(Ok(Frame::Payload(payload))) => {
                let outcome = relay.route(&target, payload);
                let result = RouteResponse {
                    identity: target.clone(),
                    outcome,
                };
                // A full reply queue waits; only a gone writer ends the channel.
                if reply.send(Outbound::Payload(route_result(&result))).await.is_err() {
                    break Disconnect::SendFailed;
                }
            }
            Some(Ok(Frame::Close)) => break Disconnect::Closed,
            Some(Err(e)) => break Disconnect::Error(e.to_string()),
            None => break Disconnect::Ended,
        }
    };
    let _ = reply.try_send(Outbound::Close);
    tracing::info!(identity = %target, reason = ?reason, "operator channel closed");
    reason
}

fn route_result(result: &RouteResponse) -> Payload {
    let envelope = WsEnvelope {
        version: 1,
        r#type: shared::ws_types::ROUTE_RESULT.to_string(),
        payload: serde_json::to_value(result).unwrap_or_default(),
        ts: Some(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
    };
    Payload::Text(serde_json::to_string(&envelope).unwrap_or_default())
}
