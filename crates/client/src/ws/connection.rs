//! Room subscription connection with state management.
//!
//! A [`SyncConnection`] owns one background task per room. The task connects
//! through a [`Connector`], decodes every frame and applies it to the
//! [`MessageStore`] in arrival order. There is no automatic reconnect: a
//! transport failure ends the connection and is reported through
//! [`ConnectionState::Error`] and [`SyncConnection::finished`].

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use roomfeed_shared::{RoomEvent, TransportError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::transport::{Connector, Frame, Transport};
use crate::stores::{ApplyOutcome, MessageStore};

/// Connection state for a room subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    /// The transport failed. Always followed by `Closed`.
    Error(TransportError),
    Closed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }

    pub fn error(&self) -> Option<&TransportError> {
        match self {
            ConnectionState::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// A live subscription to one room.
///
/// Dropping it begins teardown without waiting for it to finish.
pub struct SyncConnection {
    room_id: String,
    state: watch::Receiver<ConnectionState>,
    teardown: Teardown,
    failure: Arc<OnceLock<TransportError>>,
    task: Option<JoinHandle<Result<(), TransportError>>>,
    outcome: Option<Result<(), TransportError>>,
}

impl SyncConnection {
    /// Start connecting to `room_id` and feeding its frames into `store`.
    pub fn open<C: Connector>(
        room_id: impl Into<String>,
        connector: Arc<C>,
        store: MessageStore,
    ) -> Self {
        let room_id = room_id.into();
        let (state_tx, state) = watch::channel(ConnectionState::Idle);
        let teardown = Teardown::new();
        let failure = Arc::new(OnceLock::new());

        let task = tokio::spawn(run_connection(
            room_id.clone(),
            connector,
            store,
            Lifecycle {
                state: state_tx,
                failure: Arc::clone(&failure),
            },
            teardown.clone(),
        ));

        Self {
            room_id,
            state,
            teardown,
            failure,
            task: Some(task),
            outcome: None,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// The transport failure that ended this connection, if any.
    ///
    /// Set before `Error` is published, so it is available to anyone who
    /// observed `Closed` even if the two states were coalesced.
    pub fn failure(&self) -> Option<TransportError> {
        self.failure.get().cloned()
    }

    /// Whether teardown has begun.
    pub fn is_closing(&self) -> bool {
        self.teardown.token.is_cancelled()
    }

    /// Begin teardown. Safe to call any number of times.
    ///
    /// No frame is applied once this returns, even if it was already read
    /// off the wire.
    pub fn close(&self) {
        if self.teardown.begin() {
            tracing::info!("Closing subscription for room {}", self.room_id);
        }
    }

    /// Wait for the connection task to end.
    ///
    /// `Ok` after an explicit teardown, `Err` if the transport failed.
    pub async fn finished(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.task.take() {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(TransportError::Close(format!("connection task failed: {e}"))),
            };
            self.outcome = Some(outcome);
        }
        self.outcome.clone().unwrap_or(Ok(()))
    }

    /// Close and wait for the transport to be released.
    pub async fn shutdown(mut self) -> Result<(), TransportError> {
        self.close();
        self.finished().await
    }
}

impl Drop for SyncConnection {
    fn drop(&mut self) {
        self.teardown.begin();
    }
}

/// Cancellation shared by a [`SyncConnection`] and its task.
///
/// Beginning teardown and applying a frame both hold `gate`, so a frame is
/// either applied before [`Teardown::begin`] returns or not at all.
#[derive(Clone)]
struct Teardown {
    token: CancellationToken,
    gate: Arc<Mutex<()>>,
}

impl Teardown {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Returns true if this call is the one that began teardown.
    fn begin(&self) -> bool {
        let _gate = self.gate.lock();
        if self.token.is_cancelled() {
            return false;
        }
        self.token.cancel();
        true
    }

    /// Run `f` unless teardown has begun.
    fn unless_cancelled<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let _gate = self.gate.lock();
        if self.token.is_cancelled() {
            None
        } else {
            Some(f())
        }
    }
}

struct Lifecycle {
    state: watch::Sender<ConnectionState>,
    failure: Arc<OnceLock<TransportError>>,
}

impl Lifecycle {
    fn set(&self, next: ConnectionState) {
        self.state.send_replace(next);
    }

    fn fail(&self, error: TransportError) -> Result<(), TransportError> {
        let _ = self.failure.set(error.clone());
        self.set(ConnectionState::Error(error.clone()));
        self.set(ConnectionState::Closed);
        Err(error)
    }
}

async fn run_connection<C: Connector>(
    room_id: String,
    connector: Arc<C>,
    store: MessageStore,
    lifecycle: Lifecycle,
    teardown: Teardown,
) -> Result<(), TransportError> {
    lifecycle.set(ConnectionState::Connecting);

    let connected = tokio::select! {
        biased;
        _ = teardown.token.cancelled() => {
            tracing::debug!("Subscription for room {} cancelled while connecting", room_id);
            lifecycle.set(ConnectionState::Closed);
            return Ok(());
        }
        result = connector.connect(&room_id) => result,
    };

    let mut transport = match connected {
        Ok(transport) => transport,
        Err(e) => {
            tracing::error!("Subscription for room {} failed to connect: {}", room_id, e);
            return lifecycle.fail(e);
        }
    };

    lifecycle.set(ConnectionState::Open);
    tracing::info!("Subscribed to room {}", room_id);

    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = teardown.token.cancelled() => break Ok(()),
            next = transport.recv() => next,
        };

        if teardown.token.is_cancelled() {
            tracing::debug!("Discarding frame for room {} after teardown", room_id);
            break Ok(());
        }

        match next {
            Some(Ok(frame)) => {
                if !dispatch(&room_id, &store, &frame, &teardown) {
                    tracing::debug!("Discarding frame for room {} after teardown", room_id);
                    break Ok(());
                }
            }
            Some(Err(e)) => break Err(e),
            None => {
                break Err(TransportError::ClosedByRemote {
                    code: None,
                    reason: String::new(),
                })
            }
        }
    };

    let released = transport.close().await;

    match outcome {
        Ok(()) => {
            tracing::info!("Subscription for room {} closed", room_id);
            lifecycle.set(ConnectionState::Closed);
            released
        }
        Err(e) => {
            tracing::error!("Subscription for room {} failed: {}", room_id, e);
            if let Err(close_err) = released {
                tracing::warn!("Releasing transport for room {} failed: {}", room_id, close_err);
            }
            lifecycle.fail(e)
        }
    }
}

/// Decode one frame and apply it. Bad frames are logged and skipped.
///
/// Returns false if teardown began before the frame could be applied.
fn dispatch(room_id: &str, store: &MessageStore, frame: &Frame, teardown: &Teardown) -> bool {
    let event = match RoomEvent::decode(frame.as_bytes()) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Skipping frame for room {}: {}", room_id, e);
            return true;
        }
    };

    let Some(outcome) = teardown.unless_cancelled(|| store.apply(room_id, &event)) else {
        return false;
    };
    match outcome {
        ApplyOutcome::Applied => {
            tracing::debug!("Applied {} for message {}", event.kind(), event.message_id())
        }
        outcome => tracing::trace!(
            "{} for message {} in room {}: {:?}",
            event.kind(),
            event.message_id(),
            room_id,
            outcome
        ),
    }
    true
}
