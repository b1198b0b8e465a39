//! Active-room lifecycle: one subscription and one cache entry per open view.

use std::sync::Arc;

use async_trait::async_trait;
use roomfeed_shared::{ApiError, TransportError};
use tokio::task::JoinHandle;

use super::connection::SyncConnection;
use super::transport::Connector;
use crate::stores::{Message, MessageStore};

/// Source of the initial full message collection for a room.
#[async_trait]
pub trait SeedSource: Send + Sync + 'static {
    async fn fetch_room_messages(&self, room_id: &str) -> Result<Vec<Message>, ApiError>;
}

struct ActiveRoom {
    room_id: String,
    connection: SyncConnection,
    seed_task: JoinHandle<()>,
}

/// Keeps the store and the subscription in step with the room the user is
/// looking at.
///
/// Switching rooms tears down the previous subscription and discards its
/// cache before the new room is opened. Dropping the manager tears down the
/// active room without waiting.
pub struct RoomSync<C: Connector, S: SeedSource> {
    store: MessageStore,
    connector: Arc<C>,
    seeds: Arc<S>,
    active: Option<ActiveRoom>,
}

impl<C: Connector, S: SeedSource> RoomSync<C, S> {
    pub fn new(store: MessageStore, connector: Arc<C>, seeds: Arc<S>) -> Self {
        Self {
            store,
            connector,
            seeds,
            active: None,
        }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn active_room(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.room_id.as_str())
    }

    pub fn connection(&self) -> Option<&SyncConnection> {
        self.active.as_ref().map(|a| &a.connection)
    }

    pub fn connection_mut(&mut self) -> Option<&mut SyncConnection> {
        self.active.as_mut().map(|a| &mut a.connection)
    }

    /// Make `room_id` the active room.
    ///
    /// Re-selecting the active room is a no-op.
    pub async fn switch_to(&mut self, room_id: &str) {
        if self.active_room() == Some(room_id) {
            return;
        }
        self.close_active().await;

        tracing::info!("Opening room {}", room_id);
        self.store.open(room_id);
        let connection =
            SyncConnection::open(room_id, Arc::clone(&self.connector), self.store.clone());
        let seed_task = self.spawn_seed(room_id);

        self.active = Some(ActiveRoom {
            room_id: room_id.to_string(),
            connection,
            seed_task,
        });
    }

    /// Replace the active room's subscription with a fresh one.
    ///
    /// The cache is kept; replayed creates are idempotent and reaction
    /// counts are absolute, so catching up over it is safe.
    pub async fn reconnect(&mut self) -> Option<Result<(), TransportError>> {
        let active = self.active.as_mut()?;
        tracing::info!("Reconnecting room {}", active.room_id);
        let fresh = SyncConnection::open(
            active.room_id.clone(),
            Arc::clone(&self.connector),
            self.store.clone(),
        );
        let previous = std::mem::replace(&mut active.connection, fresh);
        Some(previous.shutdown().await)
    }

    /// Tear down the active room and discard its cache.
    ///
    /// Returns the outcome of its connection, or `None` if no room was active.
    pub async fn close_active(&mut self) -> Option<Result<(), TransportError>> {
        let active = self.active.take()?;
        active.seed_task.abort();
        let outcome = active.connection.shutdown().await;
        if let Err(e) = &outcome {
            tracing::warn!("Room {} had ended with an error: {}", active.room_id, e);
        }
        self.store.discard(&active.room_id);
        tracing::info!("Closed room {}", active.room_id);
        Some(outcome)
    }

    /// Permanently stop syncing.
    pub async fn dispose(mut self) {
        self.close_active().await;
    }

    fn spawn_seed(&self, room_id: &str) -> JoinHandle<()> {
        let store = self.store.clone();
        let seeds = Arc::clone(&self.seeds);
        let room_id = room_id.to_string();
        tokio::spawn(async move {
            match seeds.fetch_room_messages(&room_id).await {
                Ok(messages) => {
                    let count = messages.len();
                    if store.seed(&room_id, messages) {
                        tracing::info!("Seeded room {} with {} messages", room_id, count);
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch messages for room {}: {}", room_id, e);
                }
            }
        })
    }
}

impl<C: Connector, S: SeedSource> Drop for RoomSync<C, S> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.seed_task.abort();
            active.connection.close();
            self.store.discard(&active.room_id);
        }
    }
}
