use std::io::Read;
use std::path::Path;

use crate::TransferError;

/// Deterministic partition of `total_size` bytes into fixed-size chunks.
///
/// The plan is pure arithmetic: it never touches the file, so it can be
/// consulted (and restarted) as often as needed. The last chunk may be
/// short; every other chunk is exactly `chunk_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: u64,
}

/// Index/offset/length of one chunk within the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSlot {
    pub index: u64,
    pub offset: u64,
    pub len: u64,
}

impl ChunkPlan {
    /// Builds a plan. Fails if `chunk_size` is zero.
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize);
        }
        Ok(Self {
            total_size,
            chunk_size,
        })
    }

    /// Number of chunks: `ceil(total_size / chunk_size)`.
    pub fn chunk_count(&self) -> u64 {
        self.total_size.div_ceil(self.chunk_size)
    }

    /// Returns the slot for `index`, or `None` past the end.
    pub fn slot(&self, index: u64) -> Option<ChunkSlot> {
        let offset = index.checked_mul(self.chunk_size)?;
        if offset >= self.total_size && self.total_size > 0 {
            return None;
        }
        if self.total_size == 0 {
            return None;
        }
        Some(ChunkSlot {
            index,
            offset,
            len: self.chunk_size.min(self.total_size - offset),
        })
    }

    /// Iterates all slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = ChunkSlot> + '_ {
        (0..self.chunk_count()).filter_map(|i| self.slot(i))
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }
}

/// One chunk's plaintext bytes, addressed by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: u64,
    pub data: Vec<u8>,
}

/// Reads a bundle file chunk by chunk, on demand.
///
/// Only one chunk buffer is resident at a time; nothing is cached between
/// calls. `rewind` restarts the sequence for a retried transfer.
pub struct BundleReader {
    file: std::fs::File,
    plan: ChunkPlan,
    next_index: u64,
}

impl BundleReader {
    /// Opens `path` with the given chunk size, sizing the plan from file
    /// metadata.
    pub fn open(path: &Path, chunk_size: u64) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path)?;
        let total_size = file.metadata()?.len();
        Ok(Self {
            file,
            plan: ChunkPlan::new(total_size, chunk_size)?,
            next_index: 0,
        })
    }

    /// Reads the next chunk in index order. Returns `None` when the plan is
    /// exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        let Some(slot) = self.plan.slot(self.next_index) else {
            return Ok(None);
        };

        let mut buf = vec![0u8; slot.len as usize];
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => {
                    // The file shrank under us; report how far we got.
                    return Err(TransferError::ShortRead {
                        index: slot.index,
                        expected: slot.len,
                        actual: filled as u64,
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransferError::Io(e)),
            }
        }

        self.next_index += 1;
        Ok(Some(Chunk {
            index: slot.index,
            data: buf,
        }))
    }

    /// Restarts the sequence from chunk 0.
    pub fn rewind(&mut self) -> Result<(), TransferError> {
        use std::io::Seek;
        self.file.seek(std::io::SeekFrom::Start(0))?;
        self.next_index = 0;
        Ok(())
    }

    /// The plan this reader follows.
    pub fn plan(&self) -> ChunkPlan {
        self.plan
    }

    /// Index of the chunk the next `next_chunk` call will produce.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }
}
