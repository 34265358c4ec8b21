//! Shared request/response and domain models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role a connection plays on the relay, fixed at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Receives every reporter payload.
    Viewer,
    /// Produces telemetry payloads.
    Reporter,
}

impl Role {
    /// Resolve a connect-time role hint. Unknown or missing hints fall back to
    /// [`Role::Reporter`].
    pub fn from_hint(hint: Option<&str>) -> Self {
        match hint.map(|h| h.trim().to_ascii_lowercase()).as_deref() {
            Some("viewer") | Some("dashboard") => Self::Viewer,
            _ => Self::Reporter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Reporter => "reporter",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of routing one payload to an addressed reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOutcome {
    Delivered,
    UnknownIdentity,
    SendFailed,
}

impl RouteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::UnknownIdentity => "unknown_identity",
            Self::SendFailed => "send_failed",
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Route response (admin API and admin WebSocket channel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    pub identity: String,
    pub outcome: RouteOutcome,
}

/// One connected reporter, as listed by `GET /api/reporters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterInfo {
    pub identity: Option<String>,
    pub connection_id: Uuid,
    pub connected_at: String,
}

/// Relay membership counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStatus {
    pub viewers: usize,
    pub reporters: usize,
}

// --- WebSocket envelope ---

/// WebSocket message envelope (version 1). Only used for relay-originated
/// control messages; reporter payloads are forwarded unwrapped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEnvelope {
    #[serde(default)]
    pub version: u8,
    pub r#type: String,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

/// WebSocket message types.
pub mod ws_types {
    pub const ROUTE_RESULT: &str = "route_result";
}

/// Admission query parameters.
pub mod ws_params {
    pub const ROLE: &str = "role";
    pub const IDENTITY: &str = "identity";
}
