//! The three tasks behind a live connection: read, write, ping.

pub(crate) mod ping;
pub(crate) mod read;
pub(crate) mod write;
