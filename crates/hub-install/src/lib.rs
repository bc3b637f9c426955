//! Installation session mirroring for the BundleHub client.
//!
//! The hub owns install state; the client keeps a read-only mirror.
//! [`InstallationModel`] is that mirror, rebuilt wholesale from every
//! `ReportSessionStatus` push, never patched incrementally, because partial
//! merges drift under reordered pushes. [`SessionController`] issues the
//! session commands and reacts to pushes, including a debounced snapshot
//! refresh after progress hints.

mod controller;
mod error;
mod model;

pub use controller::{ControlChannel, DEFAULT_SNAPSHOT_DEBOUNCE, SessionController};
pub use error::InstallError;
pub use model::{InstallationModel, ItemCounts};
