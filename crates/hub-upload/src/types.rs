use std::path::{Path, PathBuf};

use bundlehub_transfer::{ChunkPlan, DEFAULT_CHUNK_SIZE};

use crate::error::UploadError;

/// Identity and parameters of one outbound bundle file.
///
/// Immutable once created; owned by exactly one [`crate::TransferSession`]
/// during a run.
#[derive(Debug, Clone)]
pub struct TransferDescriptor {
    pub name: String,
    pub size: u64,
    pub chunk_size: u64,
    /// SHA-256 hex digest of the whole file. Computed at begin time when
    /// absent.
    pub expected_digest: Option<String>,
    pub path: PathBuf,
}

impl TransferDescriptor {
    /// Builds a descriptor from an on-disk file, validating the chunk size.
    pub fn from_file(path: &Path, chunk_size: u64) -> Result<Self, UploadError> {
        let size = std::fs::metadata(path)?.len();
        // Validate early so a bad chunk size fails at selection, not mid-run.
        ChunkPlan::new(size, chunk_size)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            size,
            chunk_size,
            expected_digest: None,
            path: path.to_path_buf(),
        })
    }

    /// Descriptor with the hub web client's default 100 KiB chunks.
    pub fn from_file_default(path: &Path) -> Result<Self, UploadError> {
        Self::from_file(path, DEFAULT_CHUNK_SIZE)
    }

    /// Selection identity used for duplicate detection: name plus size.
    pub fn identity(&self) -> (&str, u64) {
        (&self.name, self.size)
    }
}

/// Progress and lifecycle events emitted during an upload campaign.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    FileStarted {
        name: String,
    },
    FileProgress {
        name: String,
        sent_chunks: u64,
        total_chunks: u64,
        /// Exact `sent/total` fraction for this file.
        fraction: f64,
    },
    FileCompleted {
        name: String,
    },
    /// Exact `(completed + in-flight fraction) / total_files`; rounding is
    /// the display layer's job.
    OverallProgress {
        completed_files: usize,
        total_files: usize,
        fraction: f64,
    },
    QueueCompleted {
        files: usize,
    },
    QueueFailed {
        name: String,
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn descriptor_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.bundle");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"0123456789")
            .unwrap();

        let desc = TransferDescriptor::from_file(&path, 4).unwrap();
        assert_eq!(desc.name, "app.bundle");
        assert_eq!(desc.size, 10);
        assert_eq!(desc.identity(), ("app.bundle", 10));
        assert!(desc.expected_digest.is_none());
    }

    #[test]
    fn descriptor_rejects_zero_chunk_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.bundle");
        std::fs::write(&path, b"x").unwrap();

        let result = TransferDescriptor::from_file(&path, 0);
        assert!(matches!(result, Err(UploadError::Transfer(_))));
    }

    #[test]
    fn descriptor_missing_file() {
        let result = TransferDescriptor::from_file(Path::new("/nonexistent.bundle"), 1024);
        assert!(matches!(result, Err(UploadError::Io(_))));
    }
}
