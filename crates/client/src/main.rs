//! Roomfeed Client - Main entry point
//!
//! Follows one room and prints its messages every time the feed changes.

use std::sync::Arc;

use clap::Parser;
use roomfeed_client::config::{API_URL_VAR, UNSEEDED_POLICY_VAR, WS_URL_VAR};
use roomfeed_client::{
    ApiClient, ClientConfig, ConnectionState, MessageStore, RoomSync, Snapshot,
    TungsteniteConnector,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "roomfeed", about = "Follow the live message feed of a room")]
struct Args {
    /// Room to follow
    room_id: String,

    /// HTTP origin of the room API (overrides ROOMFEED_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// WebSocket origin of the subscription endpoint (overrides ROOMFEED_WS_URL)
    #[arg(long)]
    ws_url: Option<String>,

    /// Buffer events that arrive before the room is seeded
    #[arg(long)]
    buffer: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("roomfeed_client=debug")),
        )
        .init();

    let args = Args::parse();
    let config = ClientConfig::from_lookup(|var| match var {
        API_URL_VAR if args.api_url.is_some() => args.api_url.clone(),
        WS_URL_VAR if args.ws_url.is_some() => args.ws_url.clone(),
        UNSEEDED_POLICY_VAR if args.buffer => Some("buffer".to_string()),
        _ => std::env::var(var).ok(),
    })?;
    tracing::info!(
        "Following room {} (api {}, ws {})",
        args.room_id,
        config.api_url,
        config.ws_url
    );

    let store = MessageStore::new(config.store);
    let api = Arc::new(ApiClient::new().with_base_url(config.api_url.as_str()));
    let connector = Arc::new(TungsteniteConnector::new(config.ws_url.clone()));
    let mut sync = RoomSync::new(store.clone(), connector, api);

    sync.switch_to(&args.room_id).await;

    let mut snapshots = store
        .subscribe(&args.room_id)
        .ok_or_else(|| anyhow::anyhow!("room {} is not open", args.room_id))?;
    let mut state = sync
        .connection()
        .map(|conn| conn.watch_state())
        .ok_or_else(|| anyhow::anyhow!("no connection for room {}", args.room_id))?;

    if let Some(snapshot) = snapshots.borrow_and_update().clone() {
        print_snapshot(&snapshot);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(snapshot) = snapshots.borrow_and_update().clone() {
                    print_snapshot(&snapshot);
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().clone();
                match current {
                    ConnectionState::Open => tracing::info!("Subscribed to room {}", args.room_id),
                    ConnectionState::Error(_) | ConnectionState::Closed => {
                        let failure = sync.connection().and_then(|conn| conn.failure());
                        match failure {
                            Some(e) => tracing::error!("Subscription for room {} failed: {}", args.room_id, e),
                            None => tracing::info!("Subscription for room {} closed", args.room_id),
                        }
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    sync.dispose().await;
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("--- {} messages", snapshot.len());
    for message in snapshot.iter() {
        let marker = if message.answered { "x" } else { " " };
        println!("[{marker}] {:>4}  {}", message.reaction_count, message.text);
    }
}
