//! Bundle upload flow for the BundleHub client.
//!
//! A [`TransferSession`] drives one file through the begin/stream/end
//! protocol: whole-file digest up front, then encrypted chunks in strict
//! index order with a single chunk in flight, then the end signal. The
//! [`TransferQueue`] runs sessions one at a time in list order and
//! aggregates overall progress.
//!
//! Transport is abstracted behind [`HubChannel`] so the flow is testable
//! with mocks; the real implementation lives in `bundlehub-client`.

mod channel;
mod error;
mod queue;
mod session;
#[cfg(test)]
mod testing;
mod types;

pub use channel::HubChannel;
pub use error::{QueueError, UploadError};
pub use queue::TransferQueue;
pub use session::{SessionState, StreamStep, TransferSession};
pub use types::{TransferDescriptor, UploadEvent};
