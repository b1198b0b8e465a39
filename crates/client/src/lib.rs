//! Roomfeed Client - live message feed for a single room
//!
//! This crate keeps a local, ordered copy of a room's messages in sync with
//! the server: an HTTP fetch seeds the room and a WebSocket subscription
//! streams incremental events into the [`MessageStore`].

pub mod api_client;
pub mod config;
pub mod reactions;
pub mod reducer;
pub mod stores;
pub mod ws;

pub use api_client::ApiClient;
pub use config::{ClientConfig, ConfigError};
pub use reactions::{ReactionCommands, ReactionToggle};
pub use stores::{Message, MessageStore, Snapshot, StoreConfig, UnseededPolicy};
pub use ws::{ConnectionState, RoomSync, SeedSource, SyncConnection, TungsteniteConnector};
