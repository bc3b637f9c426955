//! Transport seam for the upload flow.

use std::future::Future;
use std::pin::Pin;

use bundlehub_protocol::constants::MessageType;
use bundlehub_protocol::envelope::Message;

use crate::error::UploadError;

/// Abstract RPC channel to the hub.
///
/// The client app implements this on top of the WebSocket connection in
/// `bundlehub-client`. A trait keeps the upload flow decoupled from the
/// transport and testable with mocks.
pub trait HubChannel: Send + Sync {
    /// Invokes a hub method and waits for its acknowledgment frame.
    ///
    /// An `Ok` return means the transport delivered the request and the hub
    /// answered; the answer may still be an error frame, which callers
    /// surface via [`Message::into_result`].
    fn invoke(
        &self,
        msg_type: MessageType,
        payload: Option<serde_json::Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Message, UploadError>> + Send + '_>>;
}

/// Invokes a method and converts hub error frames into [`UploadError`].
pub(crate) async fn invoke_checked(
    channel: &dyn HubChannel,
    msg_type: MessageType,
    payload: Option<serde_json::Value>,
) -> Result<Message, UploadError> {
    let resp = channel.invoke(msg_type, payload).await?;
    resp.into_result().map_err(UploadError::from_hub)
}
