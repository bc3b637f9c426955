//! Sequential upload campaign: one file end-to-end at a time.

use bundlehub_transfer::KeySlot;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::channel::HubChannel;
use crate::error::{QueueError, UploadError};
use crate::session::{StreamStep, TransferSession};
use crate::types::{TransferDescriptor, UploadEvent};

/// Ordered list of files for one upload campaign.
///
/// Exactly one session runs at a time, in list order. Session *i+1* does
/// not start until session *i* ends; on a failure the remaining files are
/// not attempted and the failing file's identity is surfaced.
#[derive(Default)]
pub struct TransferQueue {
    files: Vec<TransferDescriptor>,
}

impl TransferQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file. Rejects a descriptor whose name+size identity is
    /// already queued; duplicates are an error, not a silent skip.
    pub fn enqueue(&mut self, descriptor: TransferDescriptor) -> Result<(), UploadError> {
        let dup = self
            .files
            .iter()
            .any(|d| d.identity() == descriptor.identity());
        if dup {
            return Err(UploadError::Duplicate(descriptor.name));
        }
        self.files.push(descriptor);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[TransferDescriptor] {
        &self.files
    }

    /// Runs the whole campaign. Consumes the queue: a retry builds a new
    /// one, which also re-validates the selection.
    pub async fn run(
        self,
        channel: &dyn HubChannel,
        key_slot: &KeySlot,
        events_tx: &mpsc::Sender<UploadEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError> {
        let total_files = self.files.len();
        info!(files = total_files, "upload campaign started");

        for (completed, descriptor) in self.files.into_iter().enumerate() {
            let name = descriptor.name.clone();
            let result = Self::run_one(
                channel,
                key_slot,
                descriptor,
                completed,
                total_files,
                events_tx,
                cancel,
            )
            .await;

            if let Err(source) = result {
                error!(file = %name, error = %source, "upload failed, aborting campaign");
                let _ = events_tx
                    .send(UploadEvent::QueueFailed {
                        name: name.clone(),
                        error: source.to_string(),
                    })
                    .await;
                return Err(QueueError { file: name, source });
            }

            let _ = events_tx
                .send(UploadEvent::OverallProgress {
                    completed_files: completed + 1,
                    total_files,
                    fraction: (completed + 1) as f64 / total_files as f64,
                })
                .await;
        }

        info!(files = total_files, "upload campaign completed");
        let _ = events_tx
            .send(UploadEvent::QueueCompleted { files: total_files })
            .await;
        Ok(())
    }

    async fn run_one(
        channel: &dyn HubChannel,
        key_slot: &KeySlot,
        descriptor: TransferDescriptor,
        completed: usize,
        total_files: usize,
        events_tx: &mpsc::Sender<UploadEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let name = descriptor.name.clone();
        let mut session = TransferSession::new(channel, descriptor, key_slot.clone());

        let _ = events_tx
            .send(UploadEvent::FileStarted { name: name.clone() })
            .await;

        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        session.begin().await?;

        loop {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }
            match session.stream_next().await? {
                StreamStep::Sent { sent, total, .. } => {
                    let file_fraction = sent as f64 / total as f64;
                    let _ = events_tx
                        .send(UploadEvent::FileProgress {
                            name: name.clone(),
                            sent_chunks: sent,
                            total_chunks: total,
                            fraction: file_fraction,
                        })
                        .await;
                    let _ = events_tx
                        .send(UploadEvent::OverallProgress {
                            completed_files: completed,
                            total_files,
                            fraction: (completed as f64 + file_fraction) / total_files as f64,
                        })
                        .await;
                }
                StreamStep::Finished => break,
            }
        }

        session.end().await?;
        let _ = events_tx
            .send(UploadEvent::FileCompleted { name })
            .await;
        Ok(())
    }
}
