//! Installation control error types.

/// Errors from installation-session commands.
///
/// Per-command failures never stop the mirroring loop: the controller keeps
/// accepting pushes and requesting snapshots regardless.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("hub rejected request ({code}): {message}")]
    Rejected { code: i32, message: String },

    #[error("cancellation rejected for item {id}: not in a cancellable state")]
    CancellationRejected { id: String },

    #[error("malformed session snapshot: {0}")]
    Snapshot(String),
}
