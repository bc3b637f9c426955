//! Wire protocol for BundleHub client-hub communication.
//!
//! The hub speaks an RPC-style protocol: every frame is a JSON
//! [`envelope::Message`] carrying a method name ([`constants::MessageType`])
//! and an opaque payload. Requests flow client-to-hub; status pushes flow
//! hub-to-client.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod session;
