//! API route handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};

use shared::{RelayStatus, ReporterInfo, RouteOutcome, RouteResponse};

use crate::api::AppState;
use crate::relay::Payload;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/reporters", get(reporters_list))
        .route("/route/{identity}", post(route_send))
}

/// Membership counts.
async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RelayStatus>, (StatusCode, String)> {
    authorize(&headers, &state)?;
    Ok(Json(state.relay.status()))
}

/// Connected reporters, addressable ones first.
async fn reporters_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ReporterInfo>>, (StatusCode, String)> {
    authorize(&headers, &state)?;
    let reporters = state
        .relay
        .registry()
        .reporters()
        .iter()
        .map(|h| ReporterInfo {
            identity: h.identity().map(String::from),
            connection_id: h.id(),
            connected_at: h.connected_at().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        })
        .collect();
    Ok(Json(reporters))
}

/// Send the raw request body to one reporter. UTF-8 bodies go out as text
/// frames, anything else as binary.
async fn route_send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(identity): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<RouteResponse>), (StatusCode, String)> {
    authorize(&headers, &state)?;
    let payload = match String::from_utf8(body.to_vec()) {
        Ok(text) => Payload::Text(text),
        Err(e) => Payload::Binary(e.into_bytes()),
    };
    let outcome = state.relay.route(&identity, payload);
    let status = match outcome {
        RouteOutcome::Delivered => StatusCode::OK,
        RouteOutcome::UnknownIdentity => StatusCode::NOT_FOUND,
        RouteOutcome::SendFailed => StatusCode::BAD_GATEWAY,
    };
    Ok((status, Json(RouteResponse { identity, outcome })))
}

// --- Auth ---

/// No-op unless `ADMIN_API_KEY` is configured.
pub(crate) fn authorize(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<(), (StatusCode, String)> {
    let Some(expected) = state.config.admin_api_key.as_deref() else {
        return Ok(());
    };
    let token = extract_bearer_from_headers(headers)?;
    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        return Err((StatusCode::UNAUTHORIZED, "invalid admin api key".to_string()));
    }
    Ok(())
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn extract_bearer_from_headers(headers: &HeaderMap) -> Result<String, (StatusCode, String)> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").map(String::from))
        .ok_or((
            StatusCode::UNAUTHORIZED,
            "missing authorization".to_string(),
        ))
}

#[cfg(test)]
mod tests {
    use super::constant_time_eq;
    use crate::api::{router, AppState};
    use crate::config::Config;
    use crate::relay::{ConnectionHandle, Outbound, Payload};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use shared::{RelayStatus, ReporterInfo, Role, RouteOutcome, RouteResponse};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    fn connect(
        state: &AppState,
        role: Role,
        identity: Option<&str>,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<Outbound>) {
        let (h, rx) = ConnectionHandle::new(role, identity.map(String::from), 8);
        let h = Arc::new(h);
        state.relay.registry().register(h.clone());
        (h, rx)
    }

    async fn json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_route(identity: &str, body: &str, key: Option<&str>) -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri(format!("/api/route/{}", identity));
        if let Some(key) = key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_ok() {
        let app = router(AppState::new(Config::for_test(None)));
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn route_unknown_identity_is_404() {
        let app = router(AppState::new(Config::for_test(None)));
        let response = app.oneshot(post_route("host-C", "ping", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: RouteResponse = json(response).await;
        assert_eq!(body.outcome, RouteOutcome::UnknownIdentity);
        assert_eq!(body.identity, "host-C");
    }

    #[tokio::test]
    async fn route_delivers_body_verbatim() {
        let state = AppState::new(Config::for_test(None));
        let (_h, mut rx) = connect(&state, Role::Reporter, Some("host-B"));
        let app = router(state);
        let response = app.oneshot(post_route("host-B", "ping", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: RouteResponse = json(response).await;
        assert_eq!(body.outcome, RouteOutcome::Delivered);
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Payload(Payload::Text("ping".to_string()))
        );
    }

    #[tokio::test]
    async fn route_send_failure_is_502() {
        let state = AppState::new(Config::for_test(None));
        let (_h, rx) = connect(&state, Role::Reporter, Some("host-B"));
        drop(rx);
        let app = router(state);
        let response = app.oneshot(post_route("host-B", "ping", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: RouteResponse = json(response).await;
        assert_eq!(body.outcome, RouteOutcome::SendFailed);
    }

    #[tokio::test]
    async fn admin_key_required_when_configured() {
        let state = AppState::new(Config::for_test(Some("admin-key")));
        let (_h, _rx) = connect(&state, Role::Reporter, Some("host-B"));
        let app = router(state);

        let response = app
            .clone()
            .oneshot(post_route("host-B", "ping", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(post_route("host-B", "ping", Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(post_route("host-B", "ping", Some("admin-key")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn admin_key_comparison() {
        assert!(constant_time_eq(b"admin-key", b"admin-key"));
        assert!(!constant_time_eq(b"admin-key", b"admin-kez"));
        assert!(!constant_time_eq(b"admin-key", b"admin"));
        assert!(!constant_time_eq(b"", b"admin-key"));
    }

    #[tokio::test]
    async fn reporters_and_status() {
        let state = AppState::new(Config::for_test(None));
        let (_v, _rx1) = connect(&state, Role::Viewer, None);
        let (a, _rx2) = connect(&state, Role::Reporter, Some("host-A"));
        let (_anon, _rx3) = connect(&state, Role::Reporter, None);
        let app = router(state);

        let req = Request::builder()
            .uri("/api/reporters")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let reporters: Vec<ReporterInfo> = json(response).await;
        assert_eq!(reporters.len(), 2);
        assert_eq!(reporters[0].identity.as_deref(), Some("host-A"));
        assert_eq!(reporters[0].connection_id, a.id());
        assert!(reporters[1].identity.is_none());

        let req = Request::builder()
            .uri("/api/status")
            .body(Body::empty())
            .unwrap();
        let status: RelayStatus = json(app.oneshot(req).await.unwrap()).await;
        assert_eq!(
            status,
            RelayStatus {
                viewers: 1,
                reporters: 2
            }
        );
    }
}
