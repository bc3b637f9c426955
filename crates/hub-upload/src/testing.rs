//! Scripted in-memory hub for tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use bundlehub_protocol::constants::MessageType;
use bundlehub_protocol::envelope::Message;

use crate::channel::HubChannel;
use crate::error::UploadError;

/// Records every invocation and answers with acks unless scripted to fail
/// or reject.
pub(crate) struct MockHub {
    invocations: Mutex<Vec<(MessageType, Option<serde_json::Value>)>>,
    fail_on: Mutex<Option<MessageType>>,
    reject_on: Mutex<Option<(MessageType, i32, String)>>,
}

impl MockHub {
    pub(crate) fn new() -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
            reject_on: Mutex::new(None),
        }
    }

    /// Every invocation of `msg_type` fails at the transport level.
    pub(crate) fn fail_on(&self, msg_type: MessageType) {
        *self.fail_on.lock().unwrap() = Some(msg_type);
    }

    /// Every invocation of `msg_type` is answered with a hub error frame.
    pub(crate) fn reject_on(&self, msg_type: MessageType, code: i32, message: &str) {
        *self.reject_on.lock().unwrap() = Some((msg_type, code, message.to_string()));
    }

    pub(crate) fn invocations(&self) -> Vec<(MessageType, Option<serde_json::Value>)> {
        self.invocations.lock().unwrap().clone()
    }
}

impl HubChannel for MockHub {
    fn invoke(
        &self,
        msg_type: MessageType,
        payload: Option<serde_json::Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Message, UploadError>> + Send + '_>> {
        self.invocations.lock().unwrap().push((msg_type, payload));
        let fail = *self.fail_on.lock().unwrap() == Some(msg_type);
        let reject = self
            .reject_on
            .lock()
            .unwrap()
            .clone()
            .filter(|(t, _, _)| *t == msg_type);

        Box::pin(async move {
            if fail {
                return Err(UploadError::Transport("mock transport down".into()));
            }
            if let Some((_, code, message)) = reject {
                return Ok(Message::error("ack", code, message));
            }
            Message::new::<()>("ack", MessageType::Ack, None).map_err(Into::into)
        })
    }
}
