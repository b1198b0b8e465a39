//! Scripted transport for connection and manager tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use roomfeed_shared::TransportError;
use tokio::sync::mpsc;

use super::transport::{Connector, Frame, Transport};

pub(crate) struct MockTransport {
    frames: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
    closes: Arc<AtomicUsize>,
    recv_calls: Arc<AtomicUsize>,
}

/// Test-side end of a [`MockTransport`]: feeds frames and observes the connection.
pub(crate) struct MockHandle {
    feed: Option<mpsc::UnboundedSender<Result<Frame, TransportError>>>,
    closes: Arc<AtomicUsize>,
    recv_calls: Arc<AtomicUsize>,
}

impl MockTransport {
    pub(crate) fn new() -> (Self, MockHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        let recv_calls = Arc::new(AtomicUsize::new(0));
        let transport = Self {
            frames: rx,
            closes: Arc::clone(&closes),
            recv_calls: Arc::clone(&recv_calls),
        };
        let handle = MockHandle {
            feed: Some(tx),
            closes,
            recv_calls,
        };
        (transport, handle)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        self.recv_calls.fetch_add(1, Ordering::SeqCst);
        self.frames.recv().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.frames.close();
        Ok(())
    }
}

impl MockHandle {
    pub(crate) fn push_json(&self, json: &str) {
        self.push(Frame::Text(json.to_string()));
    }

    pub(crate) fn push(&self, frame: Frame) {
        if let Some(feed) = &self.feed {
            let _ = feed.send(Ok(frame));
        }
    }

    pub(crate) fn fail(&self, error: TransportError) {
        if let Some(feed) = &self.feed {
            let _ = feed.send(Err(error));
        }
    }

    /// End the stream without a close handshake.
    pub(crate) fn hang_up(&mut self) {
        self.feed = None;
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Wait until the connection has asked for `calls` frames in total,
    /// which means every frame before the last request has been dispatched.
    pub(crate) async fn wait_for_recv_calls(&self, calls: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.recv_calls.load(Ordering::SeqCst) < calls {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("connection never asked for the next frame");
    }
}

pub(crate) struct MockConnector {
    scripted: Mutex<VecDeque<Result<MockTransport, TransportError>>>,
    rooms: Mutex<Vec<String>>,
}

impl MockConnector {
    /// Each `connect` takes the next scripted result. Once the script is
    /// exhausted `connect` never resolves.
    pub(crate) fn with_transports(
        scripted: Vec<Result<MockTransport, TransportError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            scripted: Mutex::new(scripted.into()),
            rooms: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn connected_rooms(&self) -> Vec<String> {
        self.rooms.lock().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, room_id: &str) -> Result<MockTransport, TransportError> {
        self.rooms.lock().push(room_id.to_string());
        let next = self.scripted.lock().pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}
