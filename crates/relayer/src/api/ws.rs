//! WebSocket admission and per-connection transport tasks.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        rejection::QueryRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::Response,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt};
use serde::Deserialize;
use shared::Role;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::api::routes::authorize;
use crate::api::AppState;
use crate::relay::{lifecycle, ConnectionHandle, Frame, Outbound, Payload};

/// How long a finished connection waits for its writer to flush.
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Connect-time hints: `?role=viewer|reporter&identity=<id>`.
#[derive(Debug, Default, Deserialize)]
pub struct AdmissionParams {
    pub role: Option<String>,
    #[serde(alias = "id")]
    pub identity: Option<String>,
}

impl AdmissionParams {
    /// Resolve the role once; unknown roles fall back to reporter.
    pub fn resolve(self) -> (Role, Option<String>) {
        (Role::from_hint(self.role.as_deref()), self.identity)
    }
}

/// `GET /ws`. A query string that fails to parse is treated as absent.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    params: Result<Query<AdmissionParams>, QueryRejection>,
) -> Response {
    let (role, identity) = params.map(|Query(p)| p).unwrap_or_default().resolve();
    ws.on_upgrade(move |socket| serve_member(socket, state, role, identity))
}

/// `GET /ws/{identity}`: addressable reporter, identity taken from the path.
pub async fn ws_identity_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(identity): Path<String>,
    params: Result<Query<AdmissionParams>, QueryRejection>,
) -> Response {
    let (role, _) = params.map(|Query(p)| p).unwrap_or_default().resolve();
    ws.on_upgrade(move |socket| serve_member(socket, state, role, Some(identity)))
}

/// `GET /ws/admin/{identity}`: every frame sent here is routed to `identity`.
pub async fn ws_admin_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(identity): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    authorize(&headers, &state)?;
    Ok(ws.on_upgrade(move |socket| serve_operator(socket, state, identity)))
}

async fn serve_member(
    socket: WebSocket,
    state: AppState,
    role: Role,
    identity: Option<String>,
) {
    let (ws_tx, ws_rx) = socket.split();
    let (handle, outbound) =
        ConnectionHandle::new(role, identity, state.config.outbound_buffer);
    let writer = tokio::spawn(write_loop(ws_tx, outbound, state.config.ping_interval));
    let session = lifecycle::admit(state.relay.clone(), Arc::new(handle));
    session.run(inbound_frames(ws_rx)).await;
    finish_writer(writer).await;
}

async fn serve_operator(socket: WebSocket, state: AppState, identity: String) {
    let (ws_tx, ws_rx) = socket.split();
    let (reply_tx, reply_rx) = mpsc::channel(state.config.outbound_buffer);
    let writer = tokio::spawn(write_loop(ws_tx, reply_rx, state.config.ping_interval));
    let inbound = inbound_frames(ws_rx);
    lifecycle::run_operator(state.relay.clone(), identity, inbound, reply_tx).await;
    finish_writer(writer).await;
}

async fn finish_writer(mut writer: JoinHandle<()>) {
    if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
}

/// Map socket messages to relay frames. Ping/pong are handled by the socket.
fn inbound_frames(
    ws_rx: SplitStream<WebSocket>,
) -> impl Stream<Item = Result<Frame, axum::Error>> {
    ws_rx.filter_map(|msg| async move {
        match msg {
            Ok(Message::Text(t)) => Some(Ok(Frame::Payload(Payload::Text(t.as_str().into())))),
            Ok(Message::Binary(b)) => Some(Ok(Frame::Payload(Payload::Binary(b.to_vec())))),
            Ok(Message::Close(_)) => Some(Ok(Frame::Close)),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
            Err(e) => Some(Err(e)),
        }
    })
}

/// Drain the outbound queue into the socket, pinging on an interval.
/// Exits on close, queue shutdown, or the first failed write.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    ping_interval: Option<Duration>,
) {
    let mut ping = ping_interval.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });
    loop {
        tokio::select! {
            item = outbound.recv() => {
                let msg = match item {
                    Some(Outbound::Payload(Payload::Text(t))) => Message::Text(t.into()),
                    Some(Outbound::Payload(Payload::Binary(b))) => Message::Binary(b.into()),
                    Some(Outbound::Close) | None => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                };
                if let Err(e) = ws_tx.send(msg).await {
                    tracing::debug!(error = %e, "websocket write failed");
                    break;
                }
            }
            _ = next_ping(&mut ping) => {
                if ws_tx.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(role: Option<&str>, identity: Option<&str>) -> AdmissionParams {
        AdmissionParams {
            role: role.map(String::from),
            identity: identity.map(String::from),
        }
    }

    #[test]
    fn resolves_viewer_and_reporter() {
        assert_eq!(params(Some("viewer"), None).resolve(), (Role::Viewer, None));
        assert_eq!(
            params(Some("reporter"), Some("host-A")).resolve(),
            (Role::Reporter, Some("host-A".to_string()))
        );
    }

    #[test]
    fn missing_or_unknown_role_is_reporter() {
        assert_eq!(params(None, None).resolve().0, Role::Reporter);
        assert_eq!(params(Some("root"), None).resolve().0, Role::Reporter);
    }

    #[test]
    fn id_is_an_alias_for_identity() {
        let p: AdmissionParams =
            serde_json::from_str(r#"{"role":"client","id":"host-B"}"#).unwrap();
        assert_eq!(p.resolve(), (Role::Reporter, Some("host-B".to_string())));
    }
}
