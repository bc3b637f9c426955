//! Periodic keepalive pings.

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;

use bundlehub_protocol::constants::WS_PING_INTERVAL;

/// Queues a ping frame every [`WS_PING_INTERVAL`] until cancelled or the
/// write queue closes. The read pump's silence deadline does the liveness
/// judgement; this task only generates traffic for it to observe.
pub(crate) async fn ping_pump(
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(WS_PING_INTERVAL);
    interval.tick().await; // Skip the immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let ping = tungstenite::Message::Ping(vec![].into());
                if write_tx.send(ping).await.is_err() {
                    break;
                }
            }
        }
    }
}
