//! Telemetry reporter — host snapshot sender and relay clients.

use std::env;
use std::time::Duration;

use clap::Parser;
use reporter::{cli, relay_client, snapshot};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let ws_url = env::var("RELAY_WS_URL").unwrap_or_else(|_| "ws://localhost:8000/ws".to_string());

    match cli.command.unwrap_or(cli::Commands::Run) {
        cli::Commands::Run => {
            let identity = env::var("REPORTER_IDENTITY")
                .ok()
                .filter(|i| !i.trim().is_empty())
                .unwrap_or_else(snapshot::hostname);
            let interval_secs: u64 = env::var("SEND_INTERVAL_SECS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SEND_INTERVAL_SECS must be a number"))?;
            if interval_secs == 0 {
                anyhow::bail!("SEND_INTERVAL_SECS must be greater than zero");
            }

            tracing::info!(identity = %identity, "System reporter starting. Server: {}", ws_url);
            relay_client::run_reporter(&ws_url, &identity, Duration::from_secs(interval_secs))
                .await?;
        }
        cli::Commands::Watch => {
            relay_client::run_viewer(&ws_url).await?;
        }
        cli::Commands::Send { identity, message } => {
            let base_url = env::var("RELAYER_URL")
                .unwrap_or_else(|_| relay_client::admin::http_base_from_ws(&ws_url));
            let api_key = env::var("ADMIN_API_KEY").ok();
            let res =
                relay_client::send_route(&base_url, api_key.as_deref(), &identity, &message)
                    .await?;
            println!("{}: {}", res.identity, res.outcome.as_str());
            if !res.outcome.is_delivered() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
