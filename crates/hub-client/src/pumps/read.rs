//! WebSocket read pump.
//!
//! Routes each incoming text frame either to the pending request it
//! answers or to the push callback, and watches a silence deadline so a
//! dead connection is noticed even when the peer never sends a close.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use bundlehub_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PONG_WAIT};
use bundlehub_protocol::envelope::Message;

use crate::ws_client::{DisconnectCallback, PendingMap, PushCallback};

pub(crate) async fn read_pump<S>(
    mut read: S,
    pending: PendingMap,
    on_push: Arc<Mutex<Option<PushCallback>>>,
    on_disconnect: DisconnectCallback,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    // Any incoming frame resets the deadline, not just pongs: traffic of
    // any kind proves the connection is alive.
    let silence_deadline = tokio::time::sleep(WS_PONG_WAIT);
    tokio::pin!(silence_deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut silence_deadline => {
                warn!("no traffic within the pong window, closing");
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        silence_deadline
                            .as_mut()
                            .reset(tokio::time::Instant::now() + WS_PONG_WAIT);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                dispatch_frame(&text, &pending, &on_push).await;
                            }
                            tungstenite::Message::Ping(data) => {
                                trace!("ping received, answering");
                                let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Pong(_) => {
                                trace!("pong received");
                            }
                            tungstenite::Message::Close(_) => {
                                debug!("close frame received");
                                break;
                            }
                            _ => {} // Binary frames are not part of the protocol.
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    if let Some(cb) = on_disconnect.lock().await.as_ref() {
        cb();
    }
}

async fn dispatch_frame(
    text: &str,
    pending: &PendingMap,
    on_push: &Arc<Mutex<Option<PushCallback>>>,
) {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        warn!("frame too large ({} bytes), dropping", text.len());
        return;
    }

    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("unparseable frame: {e}");
            return;
        }
    };

    trace!(msg_type = ?msg.msg_type, id = %msg.id, "frame received");

    // A frame whose id matches a pending request is its response.
    let mut map = pending.lock().await;
    if let Some(tx) = map.remove(&msg.id) {
        let _ = tx.send(msg);
        return;
    }
    drop(map);

    // Everything else is a push.
    let guard = on_push.lock().await;
    if let Some(cb) = guard.as_ref() {
        cb(msg.msg_type, msg);
    } else {
        warn!(msg_type = ?msg.msg_type, id = %msg.id, "no push callback set, dropping frame");
    }
}
