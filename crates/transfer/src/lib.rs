//! Bundle transfer primitives: fixed-size chunking, whole-file SHA-256
//! digests, and independent AES-256-GCM encryption of each chunk.
//!
//! These pieces are deliberately free of any transport knowledge. The
//! upload crate composes them into the begin/stream/end protocol.

mod chunked;
mod crypto;
mod digest;

pub use chunked::{BundleReader, Chunk, ChunkPlan, ChunkSlot};
pub use crypto::{EncryptedChunk, KeySlot, SessionKey, decrypt_chunk, encrypt_chunk};
pub use digest::{digest_bytes, digest_file};

/// Default chunk size: 100 KiB, matching the hub's web client.
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("invalid session key: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("source file changed during transfer: expected {expected} bytes at chunk {index}, read {actual}")]
    ShortRead {
        index: u64,
        expected: u64,
        actual: u64,
    },
}
