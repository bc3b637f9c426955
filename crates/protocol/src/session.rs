//! Installation session snapshot types.
//!
//! The hub is the sole source of truth for install state. It pushes complete
//! snapshots via `ReportSessionStatus`; the client never patches items
//! individually.

use serde::{Deserialize, Serialize};

/// Lifecycle of a single installation item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Installing,
    Completed,
    Failed,
    Cancelled,
}

/// Overall state of the install batch as reported by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
    /// Forward compatibility: unrecognized server states parse instead of
    /// breaking the mirroring loop.
    #[serde(other)]
    Unknown,
}

/// One item inside a session snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationItem {
    pub id: String,
    pub version: String,
    pub status: ItemStatus,
    /// Percent complete, 0-100.
    #[serde(default)]
    pub progress: u8,
}

/// A complete, authoritative description of the installation session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationSnapshot {
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub items: Vec<InstallationItem>,
}

impl InstallationSnapshot {
    /// Parses a `ReportSessionStatus` payload defensively.
    ///
    /// Some hub builds push the snapshot as a structured object, others as a
    /// JSON string containing the object. Both shapes must parse. Item
    /// progress over 100 is clamped rather than rejected.
    pub fn from_report(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut snap: Self = match value {
            serde_json::Value::String(s) => serde_json::from_str(s)?,
            other => serde_json::from_value(other.clone())?,
        };
        for item in &mut snap.items {
            item.progress = item.progress.min(100);
        }
        Ok(snap)
    }
}
