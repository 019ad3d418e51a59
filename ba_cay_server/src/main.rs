mod config;
mod directory;
mod dispatch;
mod ledger;
mod registry;
mod room;
mod state;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use ba_cay_core::{ClientMessage, ServerMessage};
use clap::Parser;
use futures_util::{stream::StreamExt, SinkExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = match &config.log_level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state = AppState::new(config.ledger(), config.settings());
    match &config.ledger_url {
        Some(url) => info!("using balance service at {}", url),
        None => info!("using in-memory balances, opening balance {}", config.opening_balance),
    }

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("cannot bind {}", config.bind))?;
    info!("listening on {}", config.bind);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Lifetime of one WebSocket connection.
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();

    // Everything bound for this client goes through one channel so room
    // actors never touch the socket directly.
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(64);

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("failed to encode outbound message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let connection = state.directory.connect(tx);
    info!("connection {} opened", connection);

    let rooms = state.registry.list(state.settings.room_grace);
    state.directory.send_to_connection(connection, ServerMessage::ListRoom { rooms });

    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => dispatch::handle_client_message(&state, connection, client_msg).await,
                Err(e) => warn!("unreadable message from {}: {}", connection, e),
            }
        }
    }

    dispatch::handle_disconnect(&state, connection).await;
    info!("connection {} closed", connection);
}
