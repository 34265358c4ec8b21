//! Connection registry: who is connected, under which role and identity.
//!
//! All memberships sit behind one `RwLock`. The lock is never held across an
//! `.await`, and readers get owned snapshots, so iteration never observes a
//! membership being mutated.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use shared::Role;
use uuid::Uuid;

use super::handle::{ConnectionHandle, LifecycleState};

#[derive(Default)]
struct Memberships {
    viewers: HashMap<Uuid, Arc<ConnectionHandle>>,
    /// identity -> reporter. Last registration wins.
    reporters: HashMap<String, Arc<ConnectionHandle>>,
    /// Reporters admitted without an identity. Counted, never routable.
    anonymous: HashMap<Uuid, Arc<ConnectionHandle>>,
}

/// Process-wide connection table.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Memberships>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Memberships> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Memberships> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a handle under its role and identity.
    ///
    /// Returns the reporter previously mapped to the same identity, if any. The
    /// superseded handle is not closed here; its own controller notices when
    /// its transport fails. Handles that are closing or closed are refused.
    pub fn register(&self, handle: Arc<ConnectionHandle>) -> Option<Arc<ConnectionHandle>> {
        let id = handle.id();
        let mut m = self.write();
        // Checked under the lock: teardown marks `Closing` before it unregisters.
        let state = handle.state();
        if state != LifecycleState::Active {
            tracing::warn!(
                conn_id = %id,
                state = ?state,
                "refusing to register finished connection"
            );
            return None;
        }
        match (handle.role(), handle.identity()) {
            (Role::Viewer, _) => {
                m.viewers.insert(id, handle.clone());
                None
            }
            (Role::Reporter, Some(identity)) => m
                .reporters
                .insert(identity.to_string(), handle.clone())
                .filter(|prev| prev.id() != id),
            (Role::Reporter, None) => {
                m.anonymous.insert(id, handle.clone());
                None
            }
        }
    }

    /// Remove a handle from whichever membership holds it. Idempotent.
    ///
    /// A reporter that was superseded under its identity leaves the newer
    /// mapping alone.
    pub fn unregister(&self, handle: &ConnectionHandle) -> bool {
        let mut m = self.write();
        match (handle.role(), handle.identity()) {
            (Role::Viewer, _) => m.viewers.remove(&handle.id()).is_some(),
            (Role::Reporter, Some(identity)) => {
                let owned = m
                    .reporters
                    .get(identity)
                    .is_some_and(|current| current.id() == handle.id());
                if owned {
                    m.reporters.remove(identity);
                }
                owned
            }
            (Role::Reporter, None) => m.anonymous.remove(&handle.id()).is_some(),
        }
    }

    /// Point-in-time copy of the viewer membership.
    pub fn snapshot_viewers(&self) -> Vec<Arc<ConnectionHandle>> {
        self.read().viewers.values().cloned().collect()
    }

    pub fn lookup_reporter(&self, identity: &str) -> Option<Arc<ConnectionHandle>> {
        self.read().reporters.get(identity).cloned()
    }

    /// All connected reporters, addressable ones first, sorted by identity.
    pub fn reporters(&self) -> Vec<Arc<ConnectionHandle>> {
        let m = self.read();
        let mut named: Vec<_> = m.reporters.values().cloned().collect();
        named.sort_by(|a, b| a.identity().cmp(&b.identity()));
        let mut anonymous: Vec<_> = m.anonymous.values().cloned().collect();
        anonymous.sort_by_key(|h| h.connected_at());
        named.extend(anonymous);
        named
    }

    pub fn viewer_count(&self) -> usize {
        self.read().viewers.len()
    }

    pub fn reporter_count(&self) -> usize {
        let m = self.read();
        m.reporters.len() + m.anonymous.len()
    }
}
