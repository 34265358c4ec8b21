//! Telemetry reporter — relay clients and host snapshots.

pub mod cli;
pub mod relay_client;
pub mod snapshot;
