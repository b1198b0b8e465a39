//! HTTP API client for the room endpoints.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use roomfeed_shared::{reaction_path, room_messages_path, ApiError, RoomMessage};
use serde::de::DeserializeOwned;

use crate::reactions::ReactionCommands;
use crate::stores::Message;
use crate::ws::SeedSource;

/// HTTP client for a room API server.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, rb: RequestBuilder) -> Result<String, ApiError> {
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }
        Ok(text)
    }

    /// Make a GET request and decode the JSON body
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let text = self.send(self.client.get(self.url(path))).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    /// Make a bodyless request whose response body is ignored
    pub async fn command(&self, method: Method, path: &str) -> Result<(), ApiError> {
        self.send(self.client.request(method, self.url(path))).await?;
        Ok(())
    }

    /// Fetch the full ordered message collection for a room.
    pub async fn get_room_messages(&self, room_id: &str) -> Result<Vec<Message>, ApiError> {
        let messages: Vec<RoomMessage> = self.get_json(&room_messages_path(room_id)).await?;
        Ok(messages.into_iter().map(Message::from).collect())
    }

    pub async fn create_message_reaction(
        &self,
        room_id: &str,
        message_id: &str,
    ) -> Result<(), ApiError> {
        self.command(Method::PATCH, &reaction_path(room_id, message_id))
            .await
    }

    pub async fn remove_message_reaction(
        &self,
        room_id: &str,
        message_id: &str,
    ) -> Result<(), ApiError> {
        self.command(Method::DELETE, &reaction_path(room_id, message_id))
            .await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeedSource for ApiClient {
    async fn fetch_room_messages(&self, room_id: &str) -> Result<Vec<Message>, ApiError> {
        self.get_room_messages(room_id).await
    }
}

#[async_trait]
impl ReactionCommands for ApiClient {
    async fn create_reaction(&self, room_id: &str, message_id: &str) -> Result<(), ApiError> {
        self.create_message_reaction(room_id, message_id).await
    }

    async fn remove_reaction(&self, room_id: &str, message_id: &str) -> Result<(), ApiError> {
        self.remove_message_reaction(room_id, message_id).await
    }
}
