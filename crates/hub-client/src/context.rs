//! Per-connection context and push routing.
//!
//! A [`HubContext`] outlives any single socket. It owns the session key
//! slot, the installation mirror, and the reconnect policy, and it is what
//! the upload and install layers talk to via [`HubHandle`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use bundlehub_install::{ControlChannel, InstallError, InstallationModel, SessionController};
use bundlehub_protocol::constants::MessageType;
use bundlehub_protocol::envelope::Message;
use bundlehub_protocol::messages::RemainingTimeReport;
use bundlehub_transfer::{KeySlot, SessionKey};
use bundlehub_upload::{HubChannel, UploadError};

use crate::reconnection::{cancel_reconnect, reconnect_loop};
use crate::types::{ConnectionEvent, ConnectionState, ReconnectConfig};
use crate::ws_client::WsClient;

type ClientSlot = Arc<Mutex<Option<WsClient>>>;
type ReconnectSlot = Arc<std::sync::Mutex<Option<CancellationToken>>>;

/// Connection-lifetime state for one hub.
#[derive(Clone)]
pub struct HubContext {
    key_slot: KeySlot,
    controller: Arc<SessionController>,
    client: ClientSlot,
    events_tx: mpsc::Sender<ConnectionEvent>,
    pub(crate) reconnect_cancel: ReconnectSlot,
    manual_disconnect: Arc<AtomicBool>,
    pub(crate) reconnect_config: ReconnectConfig,
    url: Arc<std::sync::Mutex<Option<String>>>,
}

impl HubContext {
    /// Creates a context and the event stream the application drains.
    pub fn new(reconnect_config: ReconnectConfig) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(256);
        let client: ClientSlot = Arc::new(Mutex::new(None));
        let controller = Arc::new(SessionController::new(
            Arc::new(HubHandle {
                client: client.clone(),
            }),
            Arc::new(InstallationModel::new()),
        ));
        let ctx = Self {
            key_slot: KeySlot::new(),
            controller,
            client,
            events_tx,
            reconnect_cancel: Arc::new(std::sync::Mutex::new(None)),
            manual_disconnect: Arc::new(AtomicBool::new(false)),
            reconnect_config,
            url: Arc::new(std::sync::Mutex::new(None)),
        };
        (ctx, events_rx)
    }

    /// The shared session key slot. Upload sessions read it; the
    /// `SetEncryptionKey` push writes it; disconnects clear it.
    pub fn key_slot(&self) -> &KeySlot {
        &self.key_slot
    }

    /// The installation session mirror.
    pub fn model(&self) -> &Arc<InstallationModel> {
        self.controller.model()
    }

    /// The installation session controller.
    pub fn controller(&self) -> &Arc<SessionController> {
        &self.controller
    }

    /// An RPC handle for the upload and install layers.
    pub fn channel(&self) -> HubHandle {
        HubHandle {
            client: self.client.clone(),
        }
    }

    pub(crate) fn url(&self) -> Option<String> {
        self.url.lock().unwrap().clone()
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            warn!("dropping connection event: {e}");
        }
    }

    /// Connects to the hub and wires up push and disconnect handling.
    pub async fn connect(&self, url: &str) -> Result<(), crate::ws_client::WsError> {
        self.manual_disconnect.store(false, Ordering::Relaxed);
        cancel_reconnect(&self.reconnect_cancel);

        // Remember the target first so a failed attempt can still be
        // retried by the reconnect loop.
        *self.url.lock().unwrap() = Some(url.to_string());
        let client = WsClient::connect(url).await?;
        self.attach(client).await;
        self.emit(ConnectionEvent::StateChanged(ConnectionState::Connected));
        Ok(())
    }

    /// Closes the connection without reconnecting.
    pub async fn disconnect(&self) {
        self.manual_disconnect.store(true, Ordering::Relaxed);
        cancel_reconnect(&self.reconnect_cancel);
        if let Some(client) = self.client.lock().await.take() {
            client.close().await;
        }
        self.key_slot.clear();
    }

    pub async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }

    /// Installs callbacks on a fresh client and makes it current.
    pub(crate) async fn attach(&self, client: WsClient) {
        // Pushes are forwarded to the event stream rather than handled in
        // the read pump's callback: routing can invoke requests of its
        // own, which must not wait on the task that reads the responses.
        let events_tx = self.events_tx.clone();
        client
            .set_push_callback(Box::new(move |msg_type, message| {
                trace!(?msg_type, "forwarding hub push to event loop");
                if let Err(e) = events_tx.try_send(ConnectionEvent::Push { msg_type, message }) {
                    warn!("failed to forward hub push: {e}");
                }
            }))
            .await;

        let ctx = self.clone();
        client
            .set_disconnect_callback(Box::new(move || {
                // The key is connection-scoped on the hub side, so it is
                // invalid the moment the socket dies.
                ctx.key_slot.clear();
                ctx.emit(ConnectionEvent::StateChanged(ConnectionState::Disconnected));

                if !ctx.manual_disconnect.load(Ordering::Relaxed) {
                    let cancel = CancellationToken::new();
                    cancel_reconnect(&ctx.reconnect_cancel);
                    *ctx.reconnect_cancel.lock().unwrap() = Some(cancel.clone());
                    tokio::spawn(reconnect_loop(ctx.clone(), cancel));
                }
            }))
            .await;

        *self.client.lock().await = Some(client);
    }

    /// Routes one hub push. Applications call this for every
    /// [`ConnectionEvent::Push`] they receive.
    pub async fn handle_push(&self, message: Message) {
        match message.msg_type {
            MessageType::SetEncryptionKey => match message.parse_payload::<String>() {
                Ok(Some(encoded)) => match SessionKey::from_base64(&encoded) {
                    Ok(key) => {
                        self.key_slot.install(key);
                        info!("session key installed");
                    }
                    Err(e) => warn!("rejected pushed session key: {e}"),
                },
                Ok(None) => warn!("key push without payload"),
                Err(e) => warn!("malformed key push: {e}"),
            },

            MessageType::ReportSessionStatus => {
                match message.parse_payload::<serde_json::Value>() {
                    Ok(Some(report)) => {
                        if let Err(e) = self.controller.on_snapshot_pushed(&report) {
                            warn!("discarding session snapshot: {e}");
                        }
                    }
                    Ok(None) => warn!("session status push without payload"),
                    Err(e) => warn!("malformed session status push: {e}"),
                }
            }

            MessageType::InstallCompleted => {
                if let Err(e) = self.controller.on_install_completed().await {
                    warn!("snapshot refresh after install hint failed: {e}");
                }
            }

            MessageType::ReportInstallationRemainingTime => {
                match message.parse_payload::<RemainingTimeReport>() {
                    Ok(Some(report)) => self.controller.on_remaining_time(&report),
                    Ok(None) => {}
                    Err(e) => warn!("malformed remaining-time push: {e}"),
                }
            }

            other => trace!(msg_type = ?other, "ignoring unexpected frame"),
        }
    }

    /// Drives push routing until the event stream closes, passing every
    /// non-push event through to `forward`.
    pub async fn run_events<F>(&self, mut events_rx: mpsc::Receiver<ConnectionEvent>, forward: F)
    where
        F: Fn(ConnectionEvent),
    {
        while let Some(event) = events_rx.recv().await {
            match event {
                ConnectionEvent::Push { message, .. } => self.handle_push(message).await,
                other => forward(other),
            }
        }
    }
}

/// RPC handle over the current connection.
///
/// Cheap to clone; each invocation locks the client slot for its whole
/// duration, which keeps requests strictly sequential.
#[derive(Clone)]
pub struct HubHandle {
    client: ClientSlot,
}

impl HubHandle {
    async fn invoke_raw(
        &self,
        msg_type: MessageType,
        payload: Option<serde_json::Value>,
    ) -> Result<Message, String> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(|| "not connected".to_string())?;
        client
            .request(msg_type, payload.as_ref())
            .await
            .map_err(|e| e.to_string())
    }
}

impl HubChannel for HubHandle {
    fn invoke(
        &self,
        msg_type: MessageType,
        payload: Option<serde_json::Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Message, UploadError>> + Send + '_>> {
        Box::pin(async move {
            self.invoke_raw(msg_type, payload)
                .await
                .map_err(UploadError::Transport)
        })
    }
}

impl ControlChannel for HubHandle {
    fn invoke(
        &self,
        msg_type: MessageType,
        payload: Option<serde_json::Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Message, InstallError>> + Send + '_>> {
        Box::pin(async move {
            self.invoke_raw(msg_type, payload)
                .await
                .map_err(InstallError::Transport)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use bundlehub_install::ItemCounts;

    fn context() -> (HubContext, mpsc::Receiver<ConnectionEvent>) {
        HubContext::new(ReconnectConfig::default())
    }

    fn key_push(bytes: &[u8]) -> Message {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Message::new("push-key", MessageType::SetEncryptionKey, Some(&encoded)).unwrap()
    }

    #[tokio::test]
    async fn key_push_installs_the_session_key() {
        let (ctx, _rx) = context();
        assert!(!ctx.key_slot().is_installed());

        ctx.handle_push(key_push(&[7u8; 32])).await;
        assert!(ctx.key_slot().is_installed());
    }

    #[tokio::test]
    async fn short_key_push_is_rejected() {
        let (ctx, _rx) = context();
        ctx.handle_push(key_push(&[7u8; 16])).await;
        assert!(!ctx.key_slot().is_installed());
    }

    #[tokio::test]
    async fn replacement_key_wins() {
        use bundlehub_transfer::{decrypt_chunk, encrypt_chunk};

        let (ctx, _rx) = context();
        ctx.handle_push(key_push(&[1u8; 32])).await;
        let first = ctx.key_slot().get().unwrap();
        let sealed = encrypt_chunk(b"chunk", &first).unwrap();

        ctx.handle_push(key_push(&[2u8; 32])).await;
        let current = ctx.key_slot().get().unwrap();
        assert!(decrypt_chunk(&sealed, &current).is_err());
    }

    #[tokio::test]
    async fn snapshot_push_replaces_the_mirror() {
        let (ctx, _rx) = context();
        let payload = serde_json::json!({
            "status": "running",
            "items": [
                {"id": "a", "version": "1.0", "status": "installing", "progress": 30},
                {"id": "b", "version": "2.0", "status": "pending"}
            ]
        });
        let msg = Message::new("push-1", MessageType::ReportSessionStatus, Some(&payload)).unwrap();
        ctx.handle_push(msg).await;

        let counts = ctx.model().counts();
        assert_eq!(
            counts,
            ItemCounts {
                total: 2,
                pending: 1,
                installing: 1,
                ..ItemCounts::default()
            }
        );
    }

    #[tokio::test]
    async fn malformed_pushes_do_not_poison_the_context() {
        let (ctx, _rx) = context();
        let bad_snapshot = Message::new(
            "push-2",
            MessageType::ReportSessionStatus,
            Some(&serde_json::json!({"items": 5})),
        )
        .unwrap();
        ctx.handle_push(bad_snapshot).await;
        assert_eq!(ctx.model().counts().total, 0);

        // A good push afterwards still lands.
        let good = Message::new(
            "push-3",
            MessageType::ReportSessionStatus,
            Some(&serde_json::json!({"status": "running", "items": []})),
        )
        .unwrap();
        ctx.handle_push(good).await;
    }

    #[tokio::test]
    async fn install_hint_without_a_connection_is_survivable() {
        let (ctx, _rx) = context();
        // The snapshot request inside fails (no client), which must not
        // panic or wedge the context.
        let hint = Message::new::<()>("push-4", MessageType::InstallCompleted, None).unwrap();
        ctx.handle_push(hint).await;
        assert!(!ctx.is_connected().await);
    }

    #[tokio::test]
    async fn handle_without_connection_reports_transport_failure() {
        let (ctx, _rx) = context();
        let handle = ctx.channel();
        let result = HubChannel::invoke(&handle, MessageType::GetSessionStatus, None).await;
        assert!(matches!(result, Err(UploadError::Transport(_))));
    }

    #[tokio::test]
    async fn disconnect_clears_the_key() {
        let (ctx, _rx) = context();
        ctx.handle_push(key_push(&[9u8; 32])).await;
        assert!(ctx.key_slot().is_installed());

        ctx.disconnect().await;
        assert!(!ctx.key_slot().is_installed());
    }
}
