//! HTTP API and WebSocket routes.

mod routes;
mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::relay::RelayState;

pub use ws::AdmissionParams;

/// Shared app state.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayState>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            relay: Arc::new(RelayState::new()),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .nest("/api", routes::api_routes())
        .route("/ws", get(ws::ws_handler))
        .route("/ws/{identity}", get(ws::ws_identity_handler))
        .route("/ws/admin/{identity}", get(ws::ws_admin_handler))
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
