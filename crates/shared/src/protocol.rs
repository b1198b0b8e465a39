//! Room subscription protocol.
//!
//! The server pushes one JSON object per frame on `/subscribe/{roomId}`:
//!
//! ```text
//! { "kind": "message_created", "value": { "id": "m1", "message": "hi" } }
//! { "kind": "message_answered", "value": { "id": "m1" } }
//! { "kind": "message_reaction_increased", "value": { "id": "m1", "count": 3 } }
//! { "kind": "message_reaction_decreased", "value": { "id": "m1", "count": 2 } }
//! ```
//!
//! Reaction events carry the absolute count, never a delta.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;

pub const KIND_MESSAGE_CREATED: &str = "message_created";
pub const KIND_MESSAGE_ANSWERED: &str = "message_answered";
pub const KIND_REACTION_INCREASED: &str = "message_reaction_increased";
pub const KIND_REACTION_DECREASED: &str = "message_reaction_decreased";

/// An event pushed by the server for a single room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RoomEvent {
    MessageCreated { id: String, message: String },
    MessageAnswered { id: String },
    MessageReactionIncreased { id: String, count: u32 },
    MessageReactionDecreased { id: String, count: u32 },
}

#[derive(Deserialize)]
struct CreatedPayload {
    id: String,
    message: String,
}

#[derive(Deserialize)]
struct AnsweredPayload {
    id: String,
}

#[derive(Deserialize)]
struct CountPayload {
    id: String,
    count: u32,
}

impl RoomEvent {
    /// Decode one raw frame.
    ///
    /// Binary and text frames share this path; the bytes must be UTF-8 JSON.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8)?;
        Self::decode_str(text)
    }

    pub fn decode_str(raw: &str) -> Result<Self, DecodeError> {
        let frame: Value =
            serde_json::from_str(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let Value::Object(mut envelope) = frame else {
            return Err(DecodeError::Malformed("frame is not a JSON object".into()));
        };
        let kind = match envelope.remove("kind") {
            Some(Value::String(kind)) => kind,
            Some(_) => return Err(DecodeError::Malformed("`kind` is not a string".into())),
            None => return Err(DecodeError::Malformed("missing field `kind`".into())),
        };
        let value = envelope.remove("value").unwrap_or(Value::Null);

        match kind.as_str() {
            KIND_MESSAGE_CREATED => {
                let p: CreatedPayload = payload(KIND_MESSAGE_CREATED, value)?;
                Ok(RoomEvent::MessageCreated {
                    id: p.id,
                    message: p.message,
                })
            }
            KIND_MESSAGE_ANSWERED => {
                let p: AnsweredPayload = payload(KIND_MESSAGE_ANSWERED, value)?;
                Ok(RoomEvent::MessageAnswered { id: p.id })
            }
            KIND_REACTION_INCREASED => {
                let p: CountPayload = payload(KIND_REACTION_INCREASED, value)?;
                Ok(RoomEvent::MessageReactionIncreased {
                    id: p.id,
                    count: p.count,
                })
            }
            KIND_REACTION_DECREASED => {
                let p: CountPayload = payload(KIND_REACTION_DECREASED, value)?;
                Ok(RoomEvent::MessageReactionDecreased {
                    id: p.id,
                    count: p.count,
                })
            }
            _ => Err(DecodeError::UnknownKind(kind)),
        }
    }

    /// The wire `kind` literal of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            RoomEvent::MessageCreated { .. } => KIND_MESSAGE_CREATED,
            RoomEvent::MessageAnswered { .. } => KIND_MESSAGE_ANSWERED,
            RoomEvent::MessageReactionIncreased { .. } => KIND_REACTION_INCREASED,
            RoomEvent::MessageReactionDecreased { .. } => KIND_REACTION_DECREASED,
        }
    }

    /// The id of the message this event refers to.
    pub fn message_id(&self) -> &str {
        match self {
            RoomEvent::MessageCreated { id, .. }
            | RoomEvent::MessageAnswered { id }
            | RoomEvent::MessageReactionIncreased { id, .. }
            | RoomEvent::MessageReactionDecreased { id, .. } => id,
        }
    }
}

/// Payloads must be JSON objects, never positional arrays.
fn payload<T: DeserializeOwned>(kind: &'static str, value: Value) -> Result<T, DecodeError> {
    if !value.is_object() {
        return Err(DecodeError::InvalidPayload {
            kind,
            reason: "expected an object".into(),
        });
    }
    serde_json::from_value(value).map_err(|e| DecodeError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

/// Path of the subscription endpoint for a room.
pub fn subscribe_path(room_id: &str) -> String {
    format!("/subscribe/{}", urlencoding::encode(room_id))
}
