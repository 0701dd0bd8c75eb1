use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use common::Snapshot;

use crate::AppState;

pub fn ws_router() -> Router<AppState> {
    Router::new().route("/ws/snapshots", get(ws_snapshots_handler))
}

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// Streams every published snapshot as JSON. Auth via `?token=` since
/// browsers cannot set headers on WebSocket requests.
async fn ws_snapshots_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(q): Query<WsQuery>,
) -> Response {
    let authed = q
        .token
        .as_deref()
        .map(|t| state.token_matches(t))
        .unwrap_or(false);

    if !authed {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    // Subscribe before reading the latest map so nothing published in between is lost.
    let rx = state.snapshot_tx.subscribe();
    let latest: Vec<Snapshot> = state.snapshots.read().await.values().cloned().collect();
    ws.on_upgrade(move |socket| handle_ws(socket, rx, latest))
}

async fn handle_ws(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<Snapshot>,
    latest: Vec<Snapshot>,
) {
    for snapshot in &latest {
        if !send_snapshot(&mut socket, snapshot).await {
            return;
        }
    }

    loop {
        match rx.recv().await {
            Ok(snapshot) => {
                if !send_snapshot(&mut socket, &snapshot).await {
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => {
                warn!(dropped = n, "WebSocket snapshot client lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// False once the client is gone.
async fn send_snapshot(socket: &mut WebSocket, snapshot: &Snapshot) -> bool {
    match serde_json::to_string(snapshot) {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            warn!(symbol = %snapshot.symbol, error = %e, "Failed to encode snapshot");
            true
        }
    }
}
