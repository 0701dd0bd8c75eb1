mod auth;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::sync::{broadcast, RwLock};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{EngineState, Result, Snapshot, SnapshotStore};

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub engine_state: Arc<RwLock<EngineState>>,
    pub dashboard_token: String,
    /// Latest snapshot per symbol.
    pub snapshots: SnapshotStore,
    /// Every snapshot the engine publishes, for WebSocket clients.
    pub snapshot_tx: broadcast::Sender<Snapshot>,
}

impl AppState {
    fn token_matches(&self, candidate: &str) -> bool {
        !self.dashboard_token.is_empty() && candidate == self.dashboard_token
    }
}

/// All routes with their middleware, ready to serve.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::api_router(state.clone()))
        .merge(routes::ws_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(cors)
}

/// Build and run the Axum API server.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    info!(%addr, "Dashboard API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use common::Alignment;
    use serde_json::Value;
    use tower::ServiceExt;

    const TOKEN: &str = "s3cret";

    async fn state_with(symbols: &[&str]) -> AppState {
        let state = AppState {
            engine_state: Arc::new(RwLock::new(EngineState::Running)),
            dashboard_token: TOKEN.to_string(),
            snapshots: SnapshotStore::default(),
            snapshot_tx: broadcast::channel(4).0,
        };
        {
            let mut map = state.snapshots.write().await;
            for &symbol in symbols {
                map.insert(
                    symbol.to_string(),
                    Snapshot {
                        symbol: symbol.to_string(),
                        evaluated_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
                        frames: Vec::new(),
                        pairings: Vec::new(),
                        alignment: Alignment::Mixed,
                    },
                );
            }
        }
        state
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().uri(uri);
        if let Some(t) = token {
            req = req.header("Authorization", format!("Bearer {t}"));
        }
        req.body(Body::empty()).unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_needs_no_token() {
        let app = router(state_with(&["BTCUSDT"]).await);
        let resp = app.oneshot(get("/healthz", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["engine"], "running");
        assert_eq!(body["symbols_evaluated"], 1);
    }

    #[tokio::test]
    async fn snapshots_require_bearer_token() {
        let app = router(state_with(&["BTCUSDT"]).await);
        let resp = app
            .clone()
            .oneshot(get("/api/snapshots", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .oneshot(get("/api/snapshots", Some("wrong")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn lists_snapshots_in_symbol_order() {
        let app = router(state_with(&["ETHUSDT", "BTCUSDT"]).await);
        let resp = app
            .oneshot(get("/api/snapshots", Some(TOKEN)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        let symbols: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["symbol"].as_str().unwrap())
            .collect();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(body[0]["alignment"]["state"], "mixed");
    }

    #[tokio::test]
    async fn single_snapshot_lookup_is_case_insensitive() {
        let app = router(state_with(&["BTCUSDT"]).await);
        let resp = app
            .clone()
            .oneshot(get("/api/snapshots/btcusdt", Some(TOKEN)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(get("/api/snapshots/DOGEUSDT", Some(TOKEN)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_token_never_authorizes() {
        let mut state = state_with(&["BTCUSDT"]).await;
        state.dashboard_token = String::new();
        let resp = router(state)
            .oneshot(get("/api/snapshots", Some("")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
