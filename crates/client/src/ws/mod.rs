//! WebSocket subscription layer.
//!
//! This module provides:
//! - a transport seam ([`Transport`], [`Connector`]) with a tokio-tungstenite
//!   implementation
//! - one [`SyncConnection`] per room that applies decoded events to the
//!   [`MessageStore`](crate::stores::MessageStore)
//! - [`RoomSync`], which restarts the subscription whenever the active room
//!   changes
//!
//! # Architecture
//!
//! ```text
//!   Connector ──connect(room)──▶ Transport
//!                                   │ frames, in arrival order
//!                                   ▼
//!                           SyncConnection task
//!                                   │ RoomEvent::decode → reducer
//!                                   ▼
//!                             MessageStore (room)
//!                                   │ watch
//!                                   ▼
//!                              presentation
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = MessageStore::default();
//! let connector = Arc::new(TungsteniteConnector::new(config.ws_url.clone()));
//! let api = Arc::new(ApiClient::new().with_base_url(config.api_url.as_str()));
//! let mut sync = RoomSync::new(store.clone(), connector, api);
//!
//! sync.switch_to("room-1").await;
//! let mut snapshots = store.subscribe("room-1").unwrap();
//! while snapshots.changed().await.is_ok() {
//!     render(snapshots.borrow_and_update().as_deref());
//! }
//! ```

mod connection;
mod manager;
#[cfg(test)]
pub(crate) mod mock;
mod transport;

pub use connection::{ConnectionState, SyncConnection};
pub use manager::{RoomSync, SeedSource};
pub use transport::{Connector, Frame, Transport, TungsteniteConnector, TungsteniteTransport};
