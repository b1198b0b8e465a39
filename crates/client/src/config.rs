//! Client configuration from environment variables.

use thiserror::Error;
use url::Url;

use crate::stores::{StoreConfig, UnseededPolicy, DEFAULT_MAX_BUFFERED_EVENTS};

pub const API_URL_VAR: &str = "ROOMFEED_API_URL";
pub const WS_URL_VAR: &str = "ROOMFEED_WS_URL";
pub const UNSEEDED_POLICY_VAR: &str = "ROOMFEED_UNSEEDED_POLICY";
pub const MAX_BUFFERED_EVENTS_VAR: &str = "ROOMFEED_MAX_BUFFERED_EVENTS";

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_WS_URL: &str = "ws://localhost:8080";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}: invalid URL `{value}`: {reason}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("ROOMFEED_UNSEEDED_POLICY: {0}")]
    InvalidPolicy(String),
    #[error("{var}: expected a positive integer, got `{value}`")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Origin of the room REST API.
    pub api_url: Url,
    /// Origin of the subscription endpoint.
    pub ws_url: Url,
    pub store: StoreConfig,
}

impl ClientConfig {
    /// Parse configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ROOMFEED_API_URL`: http(s) origin of the API (default: "http://localhost:8080")
    /// - `ROOMFEED_WS_URL`: ws(s) origin of the subscription endpoint (default: "ws://localhost:8080")
    /// - `ROOMFEED_UNSEEDED_POLICY`: "drop" | "buffer" (default: "drop")
    /// - `ROOMFEED_MAX_BUFFERED_EVENTS`: bound for the "buffer" policy (default: 256)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Parse configuration from any key lookup, e.g. CLI flags layered over the environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = parse_url(
            API_URL_VAR,
            lookup(API_URL_VAR).as_deref().unwrap_or(DEFAULT_API_URL),
            &["http", "https"],
        )?;
        let ws_url = parse_url(
            WS_URL_VAR,
            lookup(WS_URL_VAR).as_deref().unwrap_or(DEFAULT_WS_URL),
            &["ws", "wss"],
        )?;

        let unseeded_policy = match lookup(UNSEEDED_POLICY_VAR) {
            Some(value) => value.parse().map_err(ConfigError::InvalidPolicy)?,
            None => UnseededPolicy::default(),
        };

        let max_buffered_events = match lookup(MAX_BUFFERED_EVENTS_VAR) {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        var: MAX_BUFFERED_EVENTS_VAR,
                        value,
                    })
                }
            },
            None => DEFAULT_MAX_BUFFERED_EVENTS,
        };

        Ok(Self {
            api_url,
            ws_url,
            store: StoreConfig {
                unseeded_policy,
                max_buffered_events,
            },
        })
    }
}

fn parse_url(var: &'static str, value: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        var,
        value: value.to_string(),
        reason,
    };
    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    if !schemes.contains(&url.scheme()) {
        return Err(invalid(format!(
            "scheme must be one of {}",
            schemes.join(", ")
        )));
    }
    Ok(url)
}
