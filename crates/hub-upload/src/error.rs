//! Upload error types.

use bundlehub_protocol::constants::ERR_CHECKSUM_MISMATCH;
use bundlehub_protocol::envelope::HubError;
use bundlehub_transfer::TransferError;

/// Errors produced while uploading a single bundle.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("no session key installed")]
    NotReady,

    #[error("invalid session state: expected {expected}, was {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("hub rejected request ({code}): {message}")]
    Rejected { code: i32, message: String },

    #[error("hub reported checksum mismatch on reassembly")]
    ChecksumMismatch,

    #[error("transfer incomplete: {sent} of {total} chunks sent")]
    IncompleteTransfer { sent: u64, total: u64 },

    #[error("file already queued: {0}")]
    Duplicate(String),

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Maps a hub error frame onto the taxonomy. Checksum rejections get
    /// their own variant since they fail the whole file.
    pub fn from_hub(err: HubError) -> Self {
        if err.code == ERR_CHECKSUM_MISMATCH {
            UploadError::ChecksumMismatch
        } else {
            UploadError::Rejected {
                code: err.code,
                message: err.message,
            }
        }
    }
}

/// A queue run failure, carrying the identity of the file that failed.
///
/// Files after the failing one are never attempted; that fail-fast choice
/// is part of the contract, not an accident.
#[derive(Debug, thiserror::Error)]
#[error("upload of {file} failed: {source}")]
pub struct QueueError {
    pub file: String,
    #[source]
    pub source: UploadError,
}
