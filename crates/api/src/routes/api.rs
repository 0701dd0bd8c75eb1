use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use common::Snapshot;

use crate::{auth::require_auth, AppState};

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/snapshots", get(list_snapshots))
        .route("/api/snapshots/:symbol", get(get_snapshot))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// Latest snapshot of every symbol, ordered by symbol.
async fn list_snapshots(State(state): State<AppState>) -> Json<Vec<Snapshot>> {
    let snapshots = state.snapshots.read().await;
    Json(snapshots.values().cloned().collect())
}

async fn get_snapshot(State(state): State<AppState>, Path(symbol): Path<String>) -> Response {
    let symbol = symbol.to_uppercase();
    match state.snapshots.read().await.get(&symbol) {
        Some(snapshot) => Json(snapshot.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("no snapshot for {symbol}")})),
        )
            .into_response(),
    }
}
