use serde::{Deserialize, Serialize};

use crate::constants::MessageType;

/// Error details attached to a rejected request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubError {
    pub code: i32,
    pub message: String,
}

/// Envelope for every frame on the wire.
///
/// `payload` is kept as `serde_json::value::RawValue` so routing can happen
/// on `msg_type` alone without committing to a payload shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Box<serde_json::value::RawValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<HubError>,
}

impl Message {
    /// Builds a message with a serialized payload.
    pub fn new<T: Serialize>(
        id: impl Into<String>,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Self, serde_json::Error> {
        let raw = match payload {
            Some(p) => {
                let json = serde_json::to_string(p)?;
                Some(serde_json::value::RawValue::from_string(json)?)
            }
            None => None,
        };
        Ok(Self {
            id: id.into(),
            msg_type,
            payload: raw,
            error: None,
        })
    }

    /// Deserializes the payload into `T`. Returns `None` if no payload.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(
        &self,
    ) -> Result<Option<T>, serde_json::Error> {
        match &self.payload {
            Some(raw) => Ok(Some(serde_json::from_str(raw.get())?)),
            None => Ok(None),
        }
    }

    /// Builds an error frame.
    pub fn error(id: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            msg_type: MessageType::Error,
            payload: None,
            error: Some(HubError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Builds an acknowledgment for this request (same id, no payload).
    pub fn ack(&self) -> Self {
        Self {
            id: self.id.clone(),
            msg_type: MessageType::Ack,
            payload: None,
            error: None,
        }
    }

    /// Returns the error as a `Result`, for callers that treat an error
    /// frame as a failed invocation.
    pub fn into_result(self) -> Result<Self, HubError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}
