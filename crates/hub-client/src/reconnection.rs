//! Reconnection with exponential backoff.

use std::pin::Pin;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::HubContext;
use crate::types::{ConnectionEvent, ConnectionState};
use crate::ws_client::WsClient;

/// Cancels an in-flight reconnect loop, if any.
pub(crate) fn cancel_reconnect(slot: &std::sync::Mutex<Option<CancellationToken>>) {
    if let Ok(mut guard) = slot.lock()
        && let Some(token) = guard.take()
    {
        token.cancel();
    }
}

/// Retries the last known URL until it answers or the token fires.
///
/// Returns a boxed future to break the type cycle with
/// [`HubContext::attach`], whose disconnect callback spawns this loop.
pub(crate) fn reconnect_loop(
    ctx: HubContext,
    cancel: CancellationToken,
) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
    Box::pin(async move {
        let Some(url) = ctx.url() else {
            debug!("no previous URL, nothing to reconnect to");
            return;
        };

        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let delay = ctx.reconnect_config.delay_for_attempt(attempt);
            let delay_secs = delay.as_secs_f64();

            ctx.emit(ConnectionEvent::StateChanged(
                ConnectionState::Reconnecting { attempt },
            ));
            ctx.emit(ConnectionEvent::Reconnecting {
                attempt,
                next_retry_secs: delay_secs,
            });
            info!(
                attempt,
                delay_secs = format_args!("{delay_secs:.1}"),
                "reconnecting"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("reconnect cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match WsClient::connect(&url).await {
                Ok(client) => {
                    ctx.attach(client).await;
                    ctx.emit(ConnectionEvent::StateChanged(ConnectionState::Connected));

                    // The session key died with the old socket; a fresh
                    // one arrives as a push. The install mirror survives
                    // but may have missed snapshots, so pull one now.
                    if let Err(e) = ctx.controller().resync().await {
                        warn!("post-reconnect resync failed: {e}");
                    }

                    info!(attempt, "reconnected");
                    break;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "reconnect attempt failed");
                }
            }

            if cancel.is_cancelled() {
                return;
            }
        }

        if let Ok(mut guard) = ctx.reconnect_cancel.lock() {
            *guard = None;
        }
    })
}
