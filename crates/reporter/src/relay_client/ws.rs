//! WebSocket clients: reporter (sends snapshots) and viewer (prints payloads).

use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use shared::{ws_params, Role};
use tokio::io::AsyncWriteExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::snapshot;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Build the admission URL for `role`, replacing any role/identity already in
/// `ws_url`.
pub fn member_url(ws_url: &str, role: Role, identity: Option<&str>) -> Result<String> {
    let mut url =
        Url::parse(ws_url).map_err(|e| anyhow::anyhow!("invalid ws url {}: {}", ws_url, e))?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != ws_params::ROLE && k != ws_params::IDENTITY && k != "id")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair(ws_params::ROLE, role.as_str());
        if let Some(identity) = identity.filter(|i| !i.is_empty()) {
            pairs.append_pair(ws_params::IDENTITY, identity);
        }
    }
    Ok(url.to_string())
}

/// Connect as a reporter and keep sending snapshots. Reconnects forever; every
/// reconnect is a new connection on the relayer.
pub async fn run_reporter(ws_url: &str, identity: &str, interval: Duration) -> Result<()> {
    let url = member_url(ws_url, Role::Reporter, Some(identity))?;
    loop {
        match connect_async(&url).await {
            Ok((ws, _)) => {
                tracing::info!(identity, "Connected to relayer");
                if let Err(e) = handle_reporter_connection(ws, interval).await {
                    tracing::warn!("Connection error: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("Connect failed: {}, retrying in 5s", e);
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn handle_reporter_connection(ws: WsStream, interval: Duration) -> Result<()> {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let payload = serde_json::to_string(&snapshot::collect_snapshot())?;
                ws_tx.send(Message::Text(payload)).await?;
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(t))) => {
                        tracing::info!(message = %t, "Message from relayer");
                    }
                    Some(Ok(Message::Binary(b))) => {
                        tracing::info!(bytes = b.len(), "Binary message from relayer");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        }
    }

    Ok(())
}

/// Connect as a viewer and write each payload to stdout, one per line.
pub async fn run_viewer(ws_url: &str) -> Result<()> {
    let url = member_url(ws_url, Role::Viewer, None)?;
    loop {
        match connect_async(&url).await {
            Ok((ws, _)) => {
                tracing::info!("Connected to relayer");
                if let Err(e) = handle_viewer_connection(ws).await {
                    tracing::warn!("Connection error: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("Connect failed: {}, retrying in 5s", e);
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn handle_viewer_connection(ws: WsStream) -> Result<()> {
    let (_ws_tx, mut ws_rx) = ws.split();
    let mut stdout = tokio::io::stdout();
    while let Some(msg) = ws_rx.next().await {
        match msg? {
            Message::Text(t) => {
                stdout.write_all(t.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            Message::Binary(b) => {
                tracing::info!(bytes = b.len(), "Binary payload");
            }
            Message::Close(_) => break,
            _ => continue,
        }
    }
    Ok(())
}
