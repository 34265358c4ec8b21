//! WebSocket relay state: registry, broadcast fan-out and addressable routing.

mod handle;
pub mod lifecycle;
mod registry;

use std::sync::Arc;

use shared::{RelayStatus, RouteOutcome};

pub use handle::{ConnectionHandle, Frame, LifecycleState, Outbound, Payload, SendError};
pub use registry::Registry;

/// Result of one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    pub pruned: usize,
}

/// Relay state shared by every connection task.
#[derive(Default)]
pub struct RelayState {
    registry: Registry,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Deliver `payload` to every viewer.
    ///
    /// Iterates a snapshot; viewers whose send fails are pruned after the pass.
    pub fn broadcast(&self, payload: &Payload) -> BroadcastReport {
        let viewers = self.registry.snapshot_viewers();
        let mut report = BroadcastReport {
            attempted: viewers.len(),
            ..Default::default()
        };
        let mut failed: Vec<Arc<ConnectionHandle>> = Vec::new();
        for viewer in viewers {
            match viewer.send(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(conn_id = %viewer.id(), error = %e, "dropping viewer");
                    failed.push(viewer);
                }
            }
        }
        for viewer in &failed {
            if self.registry.unregister(viewer) {
                report.pruned += 1;
            }
            viewer.evict();
        }
        tracing::debug!(
            bytes = payload.len(),
            attempted = report.attempted,
            delivered = report.delivered,
            pruned = report.pruned,
            "broadcast"
        );
        report
    }

    /// Deliver `payload` to the reporter registered under `identity`.
    ///
    /// Never touches the registry. A failed send evicts the target, and its
    /// own controller unregisters it.
    pub fn route(&self, identity: &str, payload: Payload) -> RouteOutcome {
        let Some(target) = self.registry.lookup_reporter(identity) else {
            tracing::debug!(identity, "route miss");
            return RouteOutcome::UnknownIdentity;
        };
        match target.send(payload) {
            Ok(()) => RouteOutcome::Delivered,
            Err(e) => {
                tracing::warn!(identity, conn_id = %target.id(), error = %e, "route send failed");
                target.evict();
                RouteOutcome::SendFailed
            }
        }
    }

    pub fn status(&self) -> RelayStatus {
        RelayStatus {
            viewers: self.registry.viewer_count(),
            reporters: self.registry.reporter_count(),
        }
    }
}
