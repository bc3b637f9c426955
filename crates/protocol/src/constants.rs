use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Protocol version sent during the initial handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum WebSocket message size: 8 MiB.
///
/// Chunks travel base64-encoded inside JSON, so the frame limit must leave
/// headroom above the raw chunk size (base64 inflates by 4/3).
pub const WS_MAX_MESSAGE_SIZE: usize = 8 * 1024 * 1024;

/// How long to wait for the hub to acknowledge a request.
pub const WS_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Keepalive ping interval.
pub const WS_PING_INTERVAL: Duration = Duration::from_secs(20);

/// How long the connection may stay silent before it is considered dead.
/// Must comfortably exceed [`WS_PING_INTERVAL`] so a single lost pong does
/// not kill a healthy connection.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(50);

// Error codes the hub attaches to rejected requests.

/// Malformed or out-of-sequence request.
pub const ERR_BAD_REQUEST: i32 = 400;
/// The addressed installation item is not in a cancellable state.
pub const ERR_CANCEL_REJECTED: i32 = 409;
/// Reassembled upload did not match the expected checksum.
pub const ERR_CHECKSUM_MISMATCH: i32 = 422;

/// Every method name on the wire.
///
/// Variant names are the wire contract verbatim; serde serializes unit
/// variants by name, so no renames are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Client -> hub: upload protocol.
    StartUpload,
    UploadChunk,
    EndUpload,

    // Client -> hub: installation session.
    Install,
    ControlInstall,
    GetSessionStatus,
    ModifyInstallationSession,

    // Hub -> client pushes.
    SetEncryptionKey,
    ReportSessionStatus,
    InstallCompleted,
    ReportInstallationRemainingTime,

    // Framing.
    Ack,
    Error,
    Ping,
    Pong,
}

impl MessageType {
    /// Returns `true` for methods the hub pushes without a prior request.
    pub fn is_push(&self) -> bool {
        matches!(
            self,
            MessageType::SetEncryptionKey
                | MessageType::ReportSessionStatus
                | MessageType::InstallCompleted
                | MessageType::ReportInstallationRemainingTime
        )
    }
}
