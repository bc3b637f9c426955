use std::sync::RwLock;

use bundlehub_protocol::session::{InstallationItem, InstallationSnapshot, ItemStatus, SessionStatus};

/// Derived counters over a snapshot's items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemCounts {
    pub total: usize,
    pub pending: usize,
    pub installing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Thread-safe mirror of the hub's installation session.
///
/// One mutating operation: [`replace`](Self::replace), an atomic wholesale
/// swap. Readers never observe a half-applied snapshot, and there is no
/// merge logic to drift from the hub under out-of-order pushes.
pub struct InstallationModel {
    inner: RwLock<InstallationSnapshot>,
}

impl Default for InstallationModel {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallationModel {
    /// Creates an empty idle mirror.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(InstallationSnapshot::default()),
        }
    }

    /// Replaces the whole aggregate with a new authoritative snapshot.
    pub fn replace(&self, snapshot: InstallationSnapshot) {
        *self.inner.write().unwrap() = snapshot;
    }

    /// Returns a copy of the current snapshot.
    pub fn snapshot(&self) -> InstallationSnapshot {
        self.inner.read().unwrap().clone()
    }

    /// Overall session status as last reported.
    pub fn status(&self) -> SessionStatus {
        self.inner.read().unwrap().status
    }

    /// Looks up one item by id.
    pub fn item(&self, id: &str) -> Option<InstallationItem> {
        self.inner
            .read()
            .unwrap()
            .items
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    /// Derived counters for the current snapshot.
    pub fn counts(&self) -> ItemCounts {
        let inner = self.inner.read().unwrap();
        let mut counts = ItemCounts {
            total: inner.items.len(),
            ..ItemCounts::default()
        };
        for item in &inner.items {
            match item.status {
                ItemStatus::Pending => counts.pending += 1,
                ItemStatus::Installing => counts.installing += 1,
                ItemStatus::Completed => counts.completed += 1,
                ItemStatus::Failed => counts.failed += 1,
                ItemStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}
