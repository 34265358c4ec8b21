//! Telemetry relayer — HTTP + WebSocket hub.
//!
//! Optional env: HOST, PORT, ADMIN_API_KEY, OUTBOUND_BUFFER, PING_INTERVAL_SECS

use std::net::SocketAddr;

use relayer::{api, config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address: {}", e))?;
    if config.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY not set; admin routes are open");
    }

    let state = api::AppState::new(config);
    let app = api::router(state);

    tracing::info!("Relayer listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
