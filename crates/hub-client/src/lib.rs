//! WebSocket connection to the BundleHub server.
//!
//! [`WsClient`] is one live connection: request/response correlation by
//! UUID, keepalive pings, and a callback for server pushes. [`HubContext`]
//! is everything that outlives a connection: the session key slot, the
//! installation mirror, and the reconnect policy. The context routes the
//! four server pushes and hands [`HubHandle`]s to the upload and install
//! layers so they never see the socket directly.

mod context;
mod pumps;
mod reconnection;
mod types;
mod ws_client;

pub use context::{HubContext, HubHandle};
pub use types::{ConnectionEvent, ConnectionState, ReconnectConfig};
pub use ws_client::{PushCallback, WsClient, WsError};
