//! Telemetry relayer: reporter/viewer WebSocket hub with addressable routing.

pub mod api;
pub mod config;
pub mod relay;
