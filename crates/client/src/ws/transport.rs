//! Transport seam between the connection state machine and the WebSocket library.

use async_trait::async_trait;
use futures_util::StreamExt;
use roomfeed_shared::{subscribe_path, TransportError};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

/// One inbound data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Text(text) => text.as_bytes(),
            Frame::Binary(bytes) => bytes,
        }
    }
}

/// An established subscription connection.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Next data frame.
    ///
    /// `None` means the stream ended without a close handshake. Control
    /// frames are handled inside the transport and never surface here.
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;

    /// Release the connection. Called exactly once per transport.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens a [`Transport`] for a room.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    async fn connect(&self, room_id: &str) -> Result<Self::Transport, TransportError>;
}

/// Production connector over tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    base_url: Url,
}

impl TungsteniteConnector {
    /// `base_url` is the WebSocket origin, e.g. `ws://localhost:8080`.
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    pub fn subscribe_url(&self, room_id: &str) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            subscribe_path(room_id)
        )
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    type Transport = TungsteniteTransport;

    async fn connect(&self, room_id: &str) -> Result<Self::Transport, TransportError> {
        let url = self.subscribe_url(room_id);
        let (stream, _response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;
        tracing::debug!("WebSocket handshake complete for {}", url);
        Ok(TungsteniteTransport { stream })
    }
}

pub struct TungsteniteTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(TransportError::Read(e.to_string()))),
            };
            match msg {
                Message::Text(text) => return Some(Ok(Frame::Text(text.to_string()))),
                Message::Binary(bytes) => return Some(Ok(Frame::Binary(bytes.to_vec()))),
                Message::Close(frame) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                        None => (None, String::new()),
                    };
                    return Some(Err(TransportError::ClosedByRemote { code, reason }));
                }
                Message::Ping(data) => {
                    // Pong is handled automatically by tungstenite
                    tracing::trace!("Received ping: {} bytes", data.len());
                }
                Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Close(e.to_string())),
        }
    }
}
