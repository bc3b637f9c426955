//! Session command/response layer and push reactions.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bundlehub_protocol::constants::{ERR_CANCEL_REJECTED, MessageType};
use bundlehub_protocol::envelope::{HubError, Message};
use bundlehub_protocol::messages::{
    InstallControl, InstallItem, InstallRequest, ModifySessionRequest, RemainingTimeReport,
    SessionAction,
};
use bundlehub_protocol::session::InstallationSnapshot;
use tracing::{debug, warn};

use crate::error::InstallError;
use crate::model::InstallationModel;

/// Minimum gap between proactively requested snapshots.
///
/// Progress hints can arrive in bursts; one snapshot per window is enough
/// since every snapshot is total anyway.
pub const DEFAULT_SNAPSHOT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Abstract RPC channel for installation commands.
///
/// Mirrors `bundlehub_upload::HubChannel` but stays a separate seam so this
/// crate has no dependency on the upload flow.
pub trait ControlChannel: Send + Sync {
    fn invoke(
        &self,
        msg_type: MessageType,
        payload: Option<serde_json::Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Message, InstallError>> + Send + '_>>;
}

/// Issues session commands and keeps the [`InstallationModel`] in sync with
/// hub pushes.
///
/// The controller never mutates the model from command results: state only
/// changes through snapshots, and a cancel's effect is only knowable from
/// the next snapshot.
pub struct SessionController {
    channel: Arc<dyn ControlChannel>,
    model: Arc<InstallationModel>,
    debounce: Duration,
    last_refresh: Mutex<Option<Instant>>,
}

impl SessionController {
    pub fn new(channel: Arc<dyn ControlChannel>, model: Arc<InstallationModel>) -> Self {
        Self {
            channel,
            model,
            debounce: DEFAULT_SNAPSHOT_DEBOUNCE,
            last_refresh: Mutex::new(None),
        }
    }

    /// Overrides the snapshot debounce window (tests use zero).
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn model(&self) -> &Arc<InstallationModel> {
        &self.model
    }

    /// Requests installation of a batch of items.
    pub async fn request_install(&self, items: Vec<InstallItem>) -> Result<(), InstallError> {
        let payload = serde_json::to_value(InstallRequest(items))?;
        self.invoke_checked(MessageType::Install, Some(payload))
            .await?;
        Ok(())
    }

    /// Pauses or resumes the active install batch.
    pub async fn control_install(&self, control: InstallControl) -> Result<(), InstallError> {
        let payload = serde_json::to_value(control)?;
        self.invoke_checked(MessageType::ControlInstall, Some(payload))
            .await?;
        Ok(())
    }

    /// Requests an immediate full snapshot. The snapshot itself arrives as
    /// a `ReportSessionStatus` push, not in the acknowledgment.
    pub async fn request_status_snapshot(&self) -> Result<(), InstallError> {
        *self.last_refresh.lock().unwrap() = Some(Instant::now());
        self.invoke_checked(MessageType::GetSessionStatus, None)
            .await?;
        Ok(())
    }

    /// Requests cancellation of one item.
    ///
    /// Only a pending item is cancellable, but current status is only
    /// knowable from a fresh snapshot, so enforcement is the hub's; a
    /// rejection surfaces as [`InstallError::CancellationRejected`] and the
    /// local mirror stays untouched until the next snapshot.
    pub async fn cancel_item(&self, id: &str, version: &str) -> Result<(), InstallError> {
        let payload = serde_json::to_value(ModifySessionRequest {
            action: SessionAction::Cancel,
            item: InstallItem {
                id: id.to_string(),
                version: version.to_string(),
            },
        })?;
        let result = self
            .invoke_checked(MessageType::ModifyInstallationSession, Some(payload))
            .await;
        match result {
            Err(InstallError::Rejected { code, .. }) if code == ERR_CANCEL_REJECTED => {
                Err(InstallError::CancellationRejected { id: id.to_string() })
            }
            other => other.map(|_| ()),
        }
    }

    /// Handles a `ReportSessionStatus` push: wholesale replacement.
    pub fn on_snapshot_pushed(&self, payload: &serde_json::Value) -> Result<(), InstallError> {
        let snapshot = InstallationSnapshot::from_report(payload)
            .map_err(|e| InstallError::Snapshot(e.to_string()))?;
        debug!(
            items = snapshot.items.len(),
            status = ?snapshot.status,
            "session snapshot replaced"
        );
        self.model.replace(snapshot);
        Ok(())
    }

    /// Handles an `InstallCompleted` hint: something changed, so pull a
    /// fresh authoritative snapshot rather than trusting the hint payload.
    /// Debounced; returns whether a request actually went out.
    pub async fn on_install_completed(&self) -> Result<bool, InstallError> {
        if !self.should_refresh() {
            debug!("snapshot refresh suppressed by debounce");
            return Ok(false);
        }
        self.invoke_checked(MessageType::GetSessionStatus, None)
            .await?;
        Ok(true)
    }

    /// Handles a `ReportInstallationRemainingTime` push. Advisory only.
    pub fn on_remaining_time(&self, report: &RemainingTimeReport) {
        debug!(
            item = %report.item_id,
            remaining_secs = report.remaining_seconds,
            "install time estimate"
        );
    }

    /// Resynchronizes after a reconnect: the mirror survives the connection
    /// but needs a fresh snapshot, unconditionally.
    pub async fn resync(&self) -> Result<(), InstallError> {
        *self.last_refresh.lock().unwrap() = None;
        self.request_status_snapshot().await
    }

    fn should_refresh(&self) -> bool {
        let mut last = self.last_refresh.lock().unwrap();
        match *last {
            Some(t) if t.elapsed() < self.debounce => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }

    async fn invoke_checked(
        &self,
        msg_type: MessageType,
        payload: Option<serde_json::Value>,
    ) -> Result<Message, InstallError> {
        let resp = self.channel.invoke(msg_type, payload).await?;
        resp.into_result().map_err(|HubError { code, message }| {
            warn!(?msg_type, code, "hub rejected session command");
            InstallError::Rejected { code, message }
        })
    }
}
