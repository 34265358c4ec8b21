//! Shared types and models for the telemetry relay workspace.

mod models;

// Explicit re-exports (avoids rust-analyzer issues with `pub use models::*`)
pub use models::{ws_params, ws_types};
pub use models::{RelayStatus, ReporterInfo, Role, RouteOutcome, RouteResponse, WsEnvelope};
