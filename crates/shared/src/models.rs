//! Wire models for the room REST endpoints.

use serde::{Deserialize, Serialize};

/// A message as returned by `GET /rooms/{roomId}/messages`.
///
/// Field names follow the server, not the client cache record: `message` is
/// the text and `reaction_count` the current count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMessage {
    pub id: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub message: String,
    pub reaction_count: u32,
    #[serde(default)]
    pub answered: bool,
}

/// Path of the message collection for a room.
pub fn room_messages_path(room_id: &str) -> String {
    format!("/rooms/{}/messages", urlencoding::encode(room_id))
}

/// Path of the reaction command endpoint for one message.
///
/// `PATCH` adds a reaction, `DELETE` removes it.
pub fn reaction_path(room_id: &str, message_id: &str) -> String {
    format!(
        "/rooms/{}/messages/{}/react",
        urlencoding::encode(room_id),
        urlencoding::encode(message_id)
    )
}
