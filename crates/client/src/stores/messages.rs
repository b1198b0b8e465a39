//! Per-room message store.
//!
//! This store is the single source of truth for the messages of every open
//! room. Each room holds one immutable [`Snapshot`] inside a `watch` channel,
//! so readers always see a whole snapshot and observers are woken whenever a
//! new one is installed.
//!
//! Rooms are explicit: [`MessageStore::open`] creates an empty (unseeded)
//! entry, [`MessageStore::discard`] drops it. Writes against a room that is
//! not open are ignored, which is what keeps a detached room frozen once its
//! connection has been torn down.

use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use roomfeed_shared::{RoomEvent, RoomMessage};
use tokio::sync::watch;

use crate::reducer;

/// Default bound on events held for an unseeded room under [`UnseededPolicy::Buffer`].
pub const DEFAULT_MAX_BUFFERED_EVENTS: usize = 256;

/// A message record in the client cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub reaction_count: u32,
    pub answered: bool,
}

impl Message {
    /// A freshly created message: no reactions, not answered.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            reaction_count: 0,
            answered: false,
        }
    }
}

impl From<RoomMessage> for Message {
    fn from(msg: RoomMessage) -> Self {
        Self {
            id: msg.id,
            text: msg.message,
            reaction_count: msg.reaction_count,
            answered: msg.answered,
        }
    }
}

/// The full ordered state of one room's cache at one instant.
///
/// Records are shared, so a snapshot derived from another one only allocates
/// for the records it actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    messages: Vec<Arc<Message>>,
}

impl Snapshot {
    /// Build a snapshot from an ordered list of records.
    ///
    /// Later records with an id already seen are dropped so ids stay unique.
    pub fn new(messages: Vec<Message>) -> Self {
        let mut seen = HashSet::with_capacity(messages.len());
        let messages = messages
            .into_iter()
            .filter(|m| seen.insert(m.id.clone()))
            .map(Arc::new)
            .collect();
        Self { messages }
    }

    pub(crate) fn from_shared(messages: Vec<Arc<Message>>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Arc<Message>] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().map(|m| m.as_ref())
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Message>> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// What to do with events that arrive before a room has been seeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnseededPolicy {
    /// Drop them. The seed fetch supersedes them.
    #[default]
    Drop,
    /// Hold them and replay them on top of the seed, in arrival order.
    Buffer,
}

impl FromStr for UnseededPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(UnseededPolicy::Drop),
            "buffer" => Ok(UnseededPolicy::Buffer),
            other => Err(format!("unknown unseeded policy `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub unseeded_policy: UnseededPolicy,
    pub max_buffered_events: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            unseeded_policy: UnseededPolicy::Drop,
            max_buffered_events: DEFAULT_MAX_BUFFERED_EVENTS,
        }
    }
}

/// Result of feeding one event to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new snapshot was installed and observers notified.
    Applied,
    /// The reducer returned the snapshot unchanged (duplicate or absent target).
    Unchanged,
    /// The room is unseeded and the event was held for replay.
    Buffered,
    /// The room is unseeded and the event was dropped.
    Dropped,
    /// The room is not open.
    RoomClosed,
}

struct RoomEntry {
    snapshot: watch::Sender<Option<Arc<Snapshot>>>,
    pending: VecDeque<RoomEvent>,
}

impl RoomEntry {
    fn new() -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            snapshot,
            pending: VecDeque::new(),
        }
    }

    /// Install a snapshot, replaying any held events if the room was unseeded.
    fn install(&mut self, room_id: &str, mut next: Arc<Snapshot>) {
        let was_unseeded = self.snapshot.borrow().is_none();
        if was_unseeded && !self.pending.is_empty() {
            tracing::debug!(
                "Replaying {} buffered events for room {}",
                self.pending.len(),
                room_id
            );
            for event in self.pending.drain(..) {
                next = reducer::reduce(&next, &event);
            }
        }
        self.snapshot.send_replace(Some(next));
    }
}

struct StoreInner {
    config: StoreConfig,
    rooms: Mutex<HashMap<String, RoomEntry>>,
}

/// Cache of message snapshots keyed by room id.
///
/// Cloning is cheap and every clone refers to the same rooms.
#[derive(Clone)]
pub struct MessageStore {
    inner: Arc<StoreInner>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl MessageStore {
    pub fn new(config: StoreConfig) -> Self {
        let config = StoreConfig {
            max_buffered_events: config.max_buffered_events.max(1),
            ..config
        };
        Self {
            inner: Arc::new(StoreInner {
                config,
                rooms: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> StoreConfig {
        self.inner.config
    }

    /// Open an unseeded entry for a room. Returns false if it was already open.
    pub fn open(&self, room_id: &str) -> bool {
        let mut rooms = self.inner.rooms.lock();
        if rooms.contains_key(room_id) {
            return false;
        }
        rooms.insert(room_id.to_string(), RoomEntry::new());
        true
    }

    pub fn is_open(&self, room_id: &str) -> bool {
        self.inner.rooms.lock().contains_key(room_id)
    }

    /// Drop a room's snapshot and any held events.
    ///
    /// Observers see their channel close.
    pub fn discard(&self, room_id: &str) -> bool {
        self.inner.rooms.lock().remove(room_id).is_some()
    }

    /// Current snapshot, or `None` if the room is unseeded or not open.
    pub fn read(&self, room_id: &str) -> Option<Arc<Snapshot>> {
        let rooms = self.inner.rooms.lock();
        let entry = rooms.get(room_id)?;
        let snapshot = entry.snapshot.borrow().clone();
        snapshot
    }

    /// Observe a room's snapshot. `None` if the room is not open.
    pub fn subscribe(&self, room_id: &str) -> Option<watch::Receiver<Option<Arc<Snapshot>>>> {
        let rooms = self.inner.rooms.lock();
        rooms.get(room_id).map(|entry| entry.snapshot.subscribe())
    }

    /// Replace a room's snapshot and notify observers.
    ///
    /// Returns false if the room is not open.
    pub fn write(&self, room_id: &str, next: Arc<Snapshot>) -> bool {
        let mut rooms = self.inner.rooms.lock();
        let Some(entry) = rooms.get_mut(room_id) else {
            return false;
        };
        entry.install(room_id, next);
        true
    }

    /// Populate an unseeded room from the initial fetch.
    ///
    /// A no-op if the room already has a snapshot, so events that were
    /// applied before the fetch resolved are never clobbered.
    pub fn seed(&self, room_id: &str, messages: Vec<Message>) -> bool {
        let mut rooms = self.inner.rooms.lock();
        let Some(entry) = rooms.get_mut(room_id) else {
            tracing::debug!("Ignoring seed for closed room {}", room_id);
            return false;
        };
        if entry.snapshot.borrow().is_some() {
            tracing::debug!("Room {} already seeded, keeping current snapshot", room_id);
            return false;
        }
        entry.install(room_id, Arc::new(Snapshot::new(messages)));
        true
    }

    /// Run one event through the reducer and install the result.
    pub fn apply(&self, room_id: &str, event: &RoomEvent) -> ApplyOutcome {
        let mut rooms = self.inner.rooms.lock();
        let Some(entry) = rooms.get_mut(room_id) else {
            return ApplyOutcome::RoomClosed;
        };

        let unseeded = entry.snapshot.borrow().is_none();
        if unseeded {
            return match self.inner.config.unseeded_policy {
                UnseededPolicy::Drop => {
                    tracing::trace!(
                        "Dropping {} for unseeded room {}",
                        event.kind(),
                        room_id
                    );
                    ApplyOutcome::Dropped
                }
                UnseededPolicy::Buffer => {
                    if entry.pending.len() >= self.inner.config.max_buffered_events {
                        entry.pending.pop_front();
                        tracing::warn!(
                            "Buffer full for unseeded room {}, dropping oldest event",
                            room_id
                        );
                    }
                    entry.pending.push_back(event.clone());
                    ApplyOutcome::Buffered
                }
            };
        }

        let changed = entry.snapshot.send_if_modified(|current| {
            match reducer::reduce_optional(current.as_ref(), event) {
                Some(next) if !current.as_ref().is_some_and(|c| Arc::ptr_eq(c, &next)) => {
                    *current = Some(next);
                    true
                }
                _ => false,
            }
        });

        if changed {
            ApplyOutcome::Applied
        } else {
            ApplyOutcome::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(id: &str, text: &str) -> RoomEvent {
        RoomEvent::MessageCreated {
            id: id.into(),
            message: text.into(),
        }
    }

    fn ids(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn read_is_absent_until_seeded() {
        let store = MessageStore::default();
        assert_eq!(store.read("a"), None);
        assert!(store.open("a"));
        assert!(!store.open("a"));
        assert_eq!(store.read("a"), None);

        assert!(store.seed("a", vec![Message::new("m1", "hi")]));
        let snapshot = store.read("a").unwrap();
        assert_eq!(ids(&snapshot), vec!["m1"]);
    }

    #[test]
    fn seed_is_noop_when_snapshot_exists() {
        let store = MessageStore::default();
        store.open("a");
        store.seed("a", vec![Message::new("m1", "hi")]);
        store.apply("a", &created("m2", "later"));

        assert!(!store.seed("a", vec![Message::new("x", "stale")]));
        assert_eq!(ids(&store.read("a").unwrap()), vec!["m1", "m2"]);
    }

    #[test]
    fn seed_drops_duplicate_ids() {
        let snapshot = Snapshot::new(vec![
            Message::new("m1", "first"),
            Message::new("m1", "second"),
            Message::new("m2", "other"),
        ]);
        assert_eq!(ids(&snapshot), vec!["m1", "m2"]);
        assert_eq!(snapshot.get("m1").unwrap().text, "first");
    }

    #[test]
    fn seed_translates_wire_fields() {
        let wire = RoomMessage {
            id: "m1".into(),
            room_id: "a".into(),
            message: "question".into(),
            reaction_count: 4,
            answered: true,
        };
        let message = Message::from(wire);
        assert_eq!(message.text, "question");
        assert_eq!(message.reaction_count, 4);
        assert!(message.answered);
    }

    #[test]
    fn drop_policy_ignores_events_before_seed() {
        let store = MessageStore::default();
        store.open("a");
        assert_eq!(store.apply("a", &created("m0", "early")), ApplyOutcome::Dropped);

        store.seed("a", vec![Message::new("m1", "hi")]);
        assert_eq!(ids(&store.read("a").unwrap()), vec!["m1"]);
    }

    #[test]
    fn buffer_policy_replays_events_on_seed() {
        let store = MessageStore::new(StoreConfig {
            unseeded_policy: UnseededPolicy::Buffer,
            ..StoreConfig::default()
        });
        store.open("a");

        assert_eq!(store.apply("a", &created("m2", "new")), ApplyOutcome::Buffered);
        assert_eq!(
            store.apply(
                "a",
                &RoomEvent::MessageReactionIncreased {
                    id: "m1".into(),
                    count: 5
                }
            ),
            ApplyOutcome::Buffered
        );
        // Already part of the seed; replay must not duplicate it.
        store.apply("a", &created("m1", "hi"));

        store.seed("a", vec![Message::new("m1", "hi")]);
        let snapshot = store.read("a").unwrap();
        assert_eq!(ids(&snapshot), vec!["m1", "m2"]);
        assert_eq!(snapshot.get("m1").unwrap().reaction_count, 5);
    }

    #[test]
    fn buffer_policy_is_bounded() {
        let store = MessageStore::new(StoreConfig {
            unseeded_policy: UnseededPolicy::Buffer,
            max_buffered_events: 2,
        });
        store.open("a");
        store.apply("a", &created("m1", "one"));
        store.apply("a", &created("m2", "two"));
        store.apply("a", &created("m3", "three"));

        store.seed("a", Vec::new());
        assert_eq!(ids(&store.read("a").unwrap()), vec!["m2", "m3"]);
    }

    #[test]
    fn closed_rooms_reject_every_mutation() {
        let store = MessageStore::default();
        assert_eq!(store.apply("a", &created("m1", "hi")), ApplyOutcome::RoomClosed);
        assert!(!store.seed("a", Vec::new()));
        assert!(!store.write("a", Arc::new(Snapshot::default())));

        store.open("a");
        store.seed("a", Vec::new());
        assert!(store.discard("a"));
        assert_eq!(store.apply("a", &created("m1", "hi")), ApplyOutcome::RoomClosed);
        assert!(!store.is_open("a"));
        assert_eq!(store.read("a"), None);
    }

    #[test]
    fn rooms_are_independent() {
        let store = MessageStore::default();
        store.open("a");
        store.open("b");
        store.seed("a", Vec::new());
        store.seed("b", Vec::new());

        store.apply("a", &created("m1", "in a"));
        assert_eq!(store.read("a").unwrap().len(), 1);
        assert!(store.read("b").unwrap().is_empty());
    }

    #[tokio::test]
    async fn observers_are_notified_only_on_change() {
        let store = MessageStore::default();
        store.open("a");
        let mut rx = store.subscribe("a").unwrap();
        assert!(rx.borrow_and_update().is_none());

        store.seed("a", Vec::new());
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        store.apply("a", &created("m1", "hi"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().len(), 1);

        assert_eq!(store.apply("a", &created("m1", "hi")), ApplyOutcome::Unchanged);
        assert!(!rx.has_changed().unwrap());

        store.discard("a");
        assert!(rx.changed().await.is_err());
    }

    #[test]
    fn apply_installs_reducer_output() {
        let store = MessageStore::default();
        store.open("a");
        store.seed("a", vec![Message::new("m1", "one"), Message::new("m2", "two")]);
        let before = store.read("a").unwrap();

        let answered = RoomEvent::MessageAnswered { id: "m2".into() };
        assert_eq!(store.apply("a", &answered), ApplyOutcome::Applied);
        let after = store.read("a").unwrap();
        assert!(after.get("m2").unwrap().answered);
        assert!(Arc::ptr_eq(&before.messages()[0], &after.messages()[0]));

        let missing = RoomEvent::MessageAnswered { id: "m9".into() };
        assert_eq!(store.apply("a", &missing), ApplyOutcome::Unchanged);
        assert!(Arc::ptr_eq(&after, &store.read("a").unwrap()));
    }

    #[test]
    fn write_replaces_snapshot() {
        let store = MessageStore::default();
        store.open("a");
        let next = Arc::new(Snapshot::new(vec![Message::new("m9", "x")]));
        assert!(store.write("a", next.clone()));
        assert!(Arc::ptr_eq(&store.read("a").unwrap(), &next));
    }

    #[test]
    fn policy_parses_from_str() {
        assert_eq!("drop".parse::<UnseededPolicy>(), Ok(UnseededPolicy::Drop));
        assert_eq!(" Buffer ".parse::<UnseededPolicy>(), Ok(UnseededPolicy::Buffer));
        assert!("hold".parse::<UnseededPolicy>().is_err());
    }
}
