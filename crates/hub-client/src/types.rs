//! Public connection types.

use std::time::Duration;

use bundlehub_protocol::constants::MessageType;
use bundlehub_protocol::envelope::Message;

/// State of the hub connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Connected and exchanging frames.
    Connected,
    /// Connection lost, attempting to reconnect.
    Reconnecting { attempt: u32 },
    /// Connection lost or closed.
    Disconnected,
}

/// Events emitted by the connection context.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The connection changed state.
    StateChanged(ConnectionState),
    /// A reconnect attempt is scheduled.
    Reconnecting { attempt: u32, next_retry_secs: f64 },
    /// The hub pushed a frame that is not a response to any request.
    Push {
        msg_type: MessageType,
        message: Message,
    },
}

/// Automatic reconnection policy with exponential backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Delay for a 1-based attempt number, with ±25% jitter so a fleet of
    /// clients does not retry in lockstep.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        let jitter = capped * 0.25;
        let offset = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / u32::MAX as f64)
            * 2.0
            - 1.0; // [-1.0, 1.0)
        let with_jitter = (capped + jitter * offset).max(0.05);
        Duration::from_secs_f64(with_jitter)
    }
}
