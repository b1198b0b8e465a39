//! Optimistic reaction toggle for a single message.
//!
//! The commands are fire-and-forget: a failure is logged and the local flag
//! flips anyway. The reaction count shown to the user only ever comes from
//! reaction events applied to the message store.

use std::sync::Arc;

use async_trait::async_trait;
use roomfeed_shared::ApiError;

#[async_trait]
pub trait ReactionCommands: Send + Sync {
    async fn create_reaction(&self, room_id: &str, message_id: &str) -> Result<(), ApiError>;
    async fn remove_reaction(&self, room_id: &str, message_id: &str) -> Result<(), ApiError>;
}

pub struct ReactionToggle<R: ReactionCommands> {
    commands: Arc<R>,
    room_id: String,
    message_id: String,
    has_reacted: bool,
}

impl<R: ReactionCommands> ReactionToggle<R> {
    pub fn new(commands: Arc<R>, room_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            commands,
            room_id: room_id.into(),
            message_id: message_id.into(),
            has_reacted: false,
        }
    }

    pub fn has_reacted(&self) -> bool {
        self.has_reacted
    }

    pub async fn react(&mut self) {
        if let Err(e) = self
            .commands
            .create_reaction(&self.room_id, &self.message_id)
            .await
        {
            tracing::warn!("Failed to react to message {}: {}", self.message_id, e);
        }
        self.has_reacted = true;
    }

    pub async fn unreact(&mut self) {
        if let Err(e) = self
            .commands
            .remove_reaction(&self.room_id, &self.message_id)
            .await
        {
            tracing::warn!(
                "Failed to remove reaction from message {}: {}",
                self.message_id,
                e
            );
        }
        self.has_reacted = false;
    }

    pub async fn toggle(&mut self) {
        if self.has_reacted {
            self.unreact().await;
        } else {
            self.react().await;
        }
    }
}
