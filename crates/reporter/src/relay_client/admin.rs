//! Admin HTTP client: route one payload to an addressed reporter.

use anyhow::Result;
use reqwest::Url;
use shared::RouteResponse;

/// Derive the relayer's HTTP base from its WebSocket URL
/// (`ws://host:8000/ws?role=x` -> `http://host:8000`).
pub fn http_base_from_ws(ws_url: &str) -> String {
    let http_url = ws_url
        .replace("wss://", "https://")
        .replace("ws://", "http://");
    let without_query = http_url.split('?').next().unwrap_or_default();
    without_query
        .trim_end_matches('/')
        .trim_end_matches("/ws")
        .to_string()
}

/// POST `message` to `/api/route/{identity}`.
///
/// `unknown_identity` and `send_failed` come back as `Ok`; only transport
/// failures and unexpected statuses are errors.
pub async fn send_route(
    base_url: &str,
    api_key: Option<&str>,
    identity: &str,
    message: &str,
) -> Result<RouteResponse> {
    let client = reqwest::Client::new();
    let mut req = client
        .post(route_url(base_url, identity)?)
        .body(message.to_string());
    if let Some(key) = api_key {
        req = req.bearer_auth(key);
    }
    let res = req.send().await?;
    let status = res.status();
    if status.is_success()
        || status == reqwest::StatusCode::NOT_FOUND
        || status == reqwest::StatusCode::BAD_GATEWAY
    {
        match res.json::<RouteResponse>().await {
            Ok(body) => return Ok(body),
            Err(e) => anyhow::bail!("relayer returned {} with unreadable body: {}", status, e),
        }
    }
    let err: String = res.text().await.unwrap_or_default();
    anyhow::bail!("relayer returned {}: {}", status, err)
}

fn route_url(base_url: &str, identity: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| anyhow::anyhow!("invalid relayer url {}: {}", base_url, e))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("relayer url cannot be a base: {}", base_url))?
        .pop_if_empty()
        .extend(["api", "route", identity]);
    Ok(url)
}
