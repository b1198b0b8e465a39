//! Pure snapshot transitions, one per event kind.
//!
//! Every function returns the input `Arc` itself when nothing changes, so
//! callers can detect a no-op with `Arc::ptr_eq` and skip notifying observers.
//! An event that targets a message the client has not loaded is not an error.

use std::sync::Arc;

use roomfeed_shared::RoomEvent;

use crate::stores::{Message, Snapshot};

pub fn reduce(snapshot: &Arc<Snapshot>, event: &RoomEvent) -> Arc<Snapshot> {
    match event {
        RoomEvent::MessageCreated { id, message } => message_created(snapshot, id, message),
        RoomEvent::MessageAnswered { id } => message_answered(snapshot, id),
        RoomEvent::MessageReactionIncreased { id, count }
        | RoomEvent::MessageReactionDecreased { id, count } => {
            reaction_count_changed(snapshot, id, *count)
        }
    }
}

/// Like [`reduce`], for a room that may not have been seeded yet.
///
/// There is nothing to mutate without a snapshot, so the result stays `None`.
pub fn reduce_optional(snapshot: Option<&Arc<Snapshot>>, event: &RoomEvent) -> Option<Arc<Snapshot>> {
    snapshot.map(|s| reduce(s, event))
}

/// Append a new message. Duplicate deliveries leave the snapshot as is.
pub fn message_created(snapshot: &Arc<Snapshot>, id: &str, text: &str) -> Arc<Snapshot> {
    if snapshot.position(id).is_some() {
        tracing::trace!("Message {} already present, ignoring duplicate create", id);
        return Arc::clone(snapshot);
    }
    let mut messages = snapshot.messages().to_vec();
    messages.push(Arc::new(Message::new(id, text)));
    Arc::new(Snapshot::from_shared(messages))
}

pub fn message_answered(snapshot: &Arc<Snapshot>, id: &str) -> Arc<Snapshot> {
    update_message(snapshot, id, |message| {
        if message.answered {
            None
        } else {
            Some(Message {
                answered: true,
                ..message.clone()
            })
        }
    })
}

/// Set the reaction count to the server's absolute value.
pub fn reaction_count_changed(snapshot: &Arc<Snapshot>, id: &str, count: u32) -> Arc<Snapshot> {
    update_message(snapshot, id, |message| {
        if message.reaction_count == count {
            None
        } else {
            Some(Message {
                reaction_count: count,
                ..message.clone()
            })
        }
    })
}

/// Replace the record with `id` by whatever `f` returns, keeping every other
/// record shared with the input. `f` returning `None` means "no change".
fn update_message(
    snapshot: &Arc<Snapshot>,
    id: &str,
    f: impl FnOnce(&Message) -> Option<Message>,
) -> Arc<Snapshot> {
    let Some(index) = snapshot.position(id) else {
        tracing::trace!("Message {} not loaded, nothing to update", id);
        return Arc::clone(snapshot);
    };
    let Some(updated) = f(&snapshot.messages()[index]) else {
        return Arc::clone(snapshot);
    };
    let mut messages = snapshot.messages().to_vec();
    messages[index] = Arc::new(updated);
    Arc::new(Snapshot::from_shared(messages))
}
