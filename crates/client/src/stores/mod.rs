//! Client-side caches fed by the room subscription.

pub mod messages;

pub use messages::{
    ApplyOutcome, Message, MessageStore, Snapshot, StoreConfig, UnseededPolicy,
    DEFAULT_MAX_BUFFERED_EVENTS,
};
