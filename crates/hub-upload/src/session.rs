//! Per-file transfer session: the begin/stream/end state machine.

use bundlehub_protocol::constants::MessageType;
use bundlehub_protocol::messages::{StartUploadRequest, UploadChunkRequest};
use bundlehub_transfer::{BundleReader, KeySlot, SessionKey, digest_file, encrypt_chunk};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::channel::{HubChannel, invoke_checked};
use crate::error::UploadError;
use crate::types::{TransferDescriptor, UploadEvent};

/// Session lifecycle. `Ended` and `Failed` are terminal: a retried file
/// needs a fresh session starting from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Begun,
    Streaming,
    Ended,
    Failed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Begun => "Begun",
            SessionState::Streaming => "Streaming",
            SessionState::Ended => "Ended",
            SessionState::Failed => "Failed",
        }
    }
}

/// Outcome of one `stream_next` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStep {
    /// A chunk was encrypted and acknowledged as sent.
    Sent { index: u64, sent: u64, total: u64 },
    /// All chunks have been sent; call `end`.
    Finished,
}

/// Drives one bundle file through the upload protocol.
///
/// Chunks go out in strictly increasing index order with a single chunk in
/// flight; the hub reassembles by index and relies on that ordering. One
/// chunk buffer and one ciphertext buffer are resident at a time.
pub struct TransferSession<'a> {
    channel: &'a dyn HubChannel,
    descriptor: TransferDescriptor,
    key_slot: KeySlot,
    state: SessionState,
    key: Option<SessionKey>,
    reader: Option<BundleReader>,
    total_chunks: u64,
    sent_chunks: u64,
}

impl<'a> TransferSession<'a> {
    /// Creates an idle session for one file.
    pub fn new(channel: &'a dyn HubChannel, descriptor: TransferDescriptor, key_slot: KeySlot) -> Self {
        Self {
            channel,
            descriptor,
            key_slot,
            state: SessionState::Idle,
            key: None,
            reader: None,
            total_chunks: 0,
            sent_chunks: 0,
        }
    }

    /// Begin phase: digest, then `StartUpload` metadata.
    ///
    /// Fails with [`UploadError::NotReady`] when no session key has been
    /// delivered yet, checked before any byte of the file is touched.
    pub async fn begin(&mut self) -> Result<(), UploadError> {
        if self.state != SessionState::Idle {
            return Err(self.invalid_state("Idle"));
        }
        let key = self.key_slot.get().ok_or(UploadError::NotReady)?;
        self.key = Some(key);

        match self.begin_inner().await {
            Ok(()) => {
                self.state = SessionState::Begun;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn begin_inner(&mut self) -> Result<(), UploadError> {
        // The digest covers the whole plaintext and is computed exactly
        // once, before the first chunk leaves the reader.
        let digest = match &self.descriptor.expected_digest {
            Some(d) => d.clone(),
            None => {
                let d = digest_file(&self.descriptor.path)?;
                self.descriptor.expected_digest = Some(d.clone());
                d
            }
        };

        let reader = BundleReader::open(&self.descriptor.path, self.descriptor.chunk_size)?;
        self.total_chunks = reader.plan().chunk_count();
        self.reader = Some(reader);

        let req = StartUploadRequest {
            file_name: self.descriptor.name.clone(),
            file_size: self.descriptor.size,
            chunk_size: self.descriptor.chunk_size,
            expected_checksum: digest,
        };
        invoke_checked(
            self.channel,
            MessageType::StartUpload,
            Some(serde_json::to_value(&req)?),
        )
        .await?;

        debug!(
            file = %self.descriptor.name,
            size = self.descriptor.size,
            chunks = self.total_chunks,
            "upload begun"
        );
        Ok(())
    }

    /// Stream phase: reads, encrypts and sends the next chunk.
    ///
    /// The next chunk is not touched until the previous one is acknowledged
    /// as sent, which both bounds memory and preserves ordering.
    pub async fn stream_next(&mut self) -> Result<StreamStep, UploadError> {
        if self.state != SessionState::Begun && self.state != SessionState::Streaming {
            return Err(self.invalid_state("Begun or Streaming"));
        }

        match self.stream_inner().await {
            Ok(step) => Ok(step),
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn stream_inner(&mut self) -> Result<StreamStep, UploadError> {
        let (index, encrypted) = {
            let Some(reader) = self.reader.as_mut() else {
                return Err(UploadError::InvalidState {
                    expected: "Begun or Streaming",
                    actual: self.state.name(),
                });
            };
            let Some(chunk) = reader.next_chunk()? else {
                return Ok(StreamStep::Finished);
            };
            let Some(key) = self.key.as_ref() else {
                return Err(UploadError::NotReady);
            };
            (chunk.index, encrypt_chunk(&chunk.data, key)?)
        };

        let req = UploadChunkRequest {
            data: encrypted.into_bytes(),
            chunk_index: index,
        };
        invoke_checked(
            self.channel,
            MessageType::UploadChunk,
            Some(serde_json::to_value(&req)?),
        )
        .await?;

        self.state = SessionState::Streaming;
        self.sent_chunks += 1;
        trace!(
            file = %self.descriptor.name,
            chunk = index,
            sent = self.sent_chunks,
            total = self.total_chunks,
            "chunk sent"
        );
        Ok(StreamStep::Sent {
            index,
            sent: self.sent_chunks,
            total: self.total_chunks,
        })
    }

    /// End phase: signals that all chunks were sent.
    pub async fn end(&mut self) -> Result<(), UploadError> {
        if self.state != SessionState::Begun && self.state != SessionState::Streaming {
            return Err(self.invalid_state("Begun or Streaming"));
        }
        if self.sent_chunks != self.total_chunks {
            return Err(UploadError::IncompleteTransfer {
                sent: self.sent_chunks,
                total: self.total_chunks,
            });
        }

        match invoke_checked(self.channel, MessageType::EndUpload, None).await {
            Ok(_) => {
                self.state = SessionState::Ended;
                self.reader = None;
                self.key = None;
                debug!(file = %self.descriptor.name, "upload ended");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    /// Runs the whole protocol for this file, emitting progress events.
    pub async fn run(&mut self, events_tx: &mpsc::Sender<UploadEvent>) -> Result<(), UploadError> {
        let name = self.descriptor.name.clone();
        let _ = events_tx
            .send(UploadEvent::FileStarted { name: name.clone() })
            .await;

        self.begin().await?;
        loop {
            match self.stream_next().await? {
                StreamStep::Sent { sent, total, .. } => {
                    let _ = events_tx
                        .send(UploadEvent::FileProgress {
                            name: name.clone(),
                            sent_chunks: sent,
                            total_chunks: total,
                            fraction: sent as f64 / total as f64,
                        })
                        .await;
                }
                StreamStep::Finished => break,
            }
        }
        self.end().await?;

        let _ = events_tx
            .send(UploadEvent::FileCompleted { name })
            .await;
        Ok(())
    }

    /// Fraction of this file's chunks sent, exact. An empty file counts as
    /// complete once its session has begun.
    pub fn progress(&self) -> f64 {
        if self.total_chunks == 0 {
            if self.state == SessionState::Idle { 0.0 } else { 1.0 }
        } else {
            self.sent_chunks as f64 / self.total_chunks as f64
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn descriptor(&self) -> &TransferDescriptor {
        &self.descriptor
    }

    pub fn sent_chunks(&self) -> u64 {
        self.sent_chunks
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    fn invalid_state(&self, expected: &'static str) -> UploadError {
        UploadError::InvalidState {
            expected,
            actual: self.state.name(),
        }
    }
}
