use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use common::{Bar, BarSeries, Error, MarketDataProvider, Result, Timeframe};

const BASE_URL: &str = "https://api.binance.com";
const MAX_KLINES_PER_REQUEST: usize = 1000;
/// Upper bound on requests per fetch. 5 days of 5m klines is two pages.
/// Paging runs newest first, so hitting the cap only loses the oldest bars.
const MAX_PAGES: usize = 16;

/// Public market-data client for Binance spot klines. No credentials needed.
pub struct BinanceClient {
    http: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the client at another host, e.g. a regional mirror or a test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn public_get(&self, path: &str, query: &str) -> Result<String> {
        let url = format!("{}{path}?{query}", self.base_url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    /// Newest `MAX_KLINES_PER_REQUEST` klines opening at or before `end_ms`.
    async fn klines_page(&self, symbol: &str, interval: Timeframe, end_ms: i64) -> Result<Vec<Bar>> {
        let query = format!(
            "symbol={symbol}&interval={}&endTime={end_ms}&limit={MAX_KLINES_PER_REQUEST}",
            interval.interval_code()
        );
        let body = self.public_get("/api/v3/klines", &query).await?;
        parse_klines(&body)
    }
}

#[async_trait]
impl MarketDataProvider for BinanceClient {
    async fn fetch_bars(
        &self,
        symbol: &str,
        interval: Timeframe,
        window: chrono::Duration,
    ) -> Result<BarSeries> {
        let end_ms = Utc::now().timestamp_millis();
        let start_ms = end_ms - window.num_milliseconds();
        let mut cursor = end_ms;
        let mut reached_start = false;
        let mut bars: Vec<Bar> = Vec::new();

        for _ in 0..MAX_PAGES {
            let page = self.klines_page(symbol, interval, cursor).await?;
            let Some(oldest) = page.iter().map(|b| b.timestamp.timestamp_millis()).min() else {
                reached_start = true;
                break;
            };
            let full = page.len() >= MAX_KLINES_PER_REQUEST;
            bars.extend(page);
            if !full || oldest <= start_ms {
                reached_start = true;
                break;
            }
            cursor = oldest - 1;
        }

        if !reached_start {
            warn!(
                symbol,
                interval = %interval,
                pages = MAX_PAGES,
                "Kline page cap reached, oldest history truncated"
            );
        }

        bars.retain(|b| b.timestamp.timestamp_millis() >= start_ms);
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        debug!(symbol, interval = %interval, bars = bars.len(), "Fetched klines");

        if bars.is_empty() {
            return Err(Error::DataUnavailable(format!(
                "no {interval} klines returned for {symbol}"
            )));
        }
        BarSeries::new(bars)
    }
}

// ─── Binance kline JSON parsing ──────────────────────────────────────────────

/// Parse a `/api/v3/klines` body. Each row is
/// `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
fn parse_klines(body: &str) -> Result<Vec<Bar>> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)?;
    let total = rows.len();
    let bars: Vec<Bar> = rows.iter().filter_map(|row| parse_kline_row(row)).collect();
    if bars.len() < total {
        warn!(dropped = total - bars.len(), "Skipped malformed kline rows");
    }
    Ok(bars)
}

fn parse_kline_row(row: &[Value]) -> Option<Bar> {
    let price = |idx: usize| -> Option<f64> {
        match row.get(idx)? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    };

    let open_ms = row.first()?.as_i64()?;
    let timestamp: DateTime<Utc> = Utc.timestamp_millis_opt(open_ms).single()?;

    Some(Bar {
        timestamp,
        open: price(1)?,
        high: price(2)?,
        low: price(3)?,
        close: price(4)?,
        volume: price(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    #[test]
    fn parses_kline_rows() {
        let body = r#"[
            [1717200000000, "67500.10", "67600.00", "67450.00", "67580.50", "12.5", 1717200299999, "0", 100, "0", "0", "0"],
            [1717200300000, "67580.50", "67700.00", "67550.00", "67690.00", "8.25", 1717200599999, "0", 80, "0", "0", "0"]
        ]"#;
        let bars = parse_klines(body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp.timestamp_millis(), 1717200000000);
        assert_eq!(bars[0].high, 67600.0);
        assert_eq!(bars[1].close, 67690.0);
        assert_eq!(bars[1].volume, 8.25);
    }

    #[test]
    fn malformed_rows_are_dropped() {
        let body = r#"[
            [1717200000000, "1.0", "2.0", "0.5", "1.5", "3.0"],
            [1717200300000, "oops", "2.0", "0.5", "1.5", "3.0"],
            ["not-a-time", "1.0", "2.0", "0.5", "1.5", "3.0"],
            [1717200600000, "1.5"]
        ]"#;
        let bars = parse_klines(body).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].low, 0.5);
    }

    #[test]
    fn non_array_body_is_an_error() {
        let err = parse_klines(r#"{"code":-1121,"msg":"Invalid symbol."}"#).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    // ─── fetch_bars against a local kline server ─────────────────────────────

    const M5_MS: i64 = 5 * 60 * 1000;

    /// Answers like `/api/v3/klines` given `endTime` + `limit`: the newest
    /// `limit` rows opening at or before `endTime + overlap_ms`.
    struct KlineServer {
        opens: Vec<i64>,
        overlap_ms: i64,
        requests: AtomicUsize,
    }

    impl KlineServer {
        fn new(opens: Vec<i64>, overlap_ms: i64) -> Arc<Self> {
            Arc::new(Self {
                opens,
                overlap_ms,
                requests: AtomicUsize::new(0),
            })
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    async fn klines(
        State(server): State<Arc<KlineServer>>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        server.requests.fetch_add(1, Ordering::SeqCst);
        let end: i64 = query
            .get("endTime")
            .and_then(|v| v.parse().ok())
            .unwrap_or(i64::MAX);
        let limit: usize = query
            .get("limit")
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);
        let upto = server
            .opens
            .partition_point(|&t| t <= end.saturating_add(server.overlap_ms));
        let rows = server.opens[upto.saturating_sub(limit)..upto]
            .iter()
            .map(|&t| json!([t, "100.0", "101.0", "99.5", "100.5", "3.0", t + M5_MS - 1]))
            .collect();
        Json(Value::Array(rows))
    }

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn client_for(server: Arc<KlineServer>) -> BinanceClient {
        let app = Router::new()
            .route("/api/v3/klines", get(klines))
            .with_state(server);
        let base = spawn_server(app).await;
        BinanceClient::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(base)
    }

    /// `count` consecutive 5m open times ending at the current bucket.
    fn m5_opens(count: i64) -> Vec<i64> {
        let now = Utc::now().timestamp_millis();
        let newest = now - now % M5_MS;
        (0..count).rev().map(|i| newest - i * M5_MS).collect()
    }

    fn assert_strictly_ascending(series: &BarSeries) {
        assert!(series
            .bars()
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test]
    async fn pages_backwards_until_the_window_start() {
        let opens = m5_opens(2_500);
        let newest = *opens.last().unwrap();
        let server = KlineServer::new(opens, 0);
        let client = client_for(server.clone()).await;

        let series = client
            .fetch_bars("BTCUSDT", Timeframe::M5, chrono::Duration::days(10))
            .await
            .unwrap();

        assert_eq!(series.len(), 2_500);
        assert_eq!(server.requests(), 3);
        assert_eq!(series.last().unwrap().timestamp.timestamp_millis(), newest);
        assert_strictly_ascending(&series);
    }

    #[tokio::test]
    async fn page_cap_keeps_the_newest_bars() {
        // 60 days of 5m klines needs 18 pages.
        let opens = m5_opens(60 * 288);
        let newest = *opens.last().unwrap();
        let server = KlineServer::new(opens, 0);
        let client = client_for(server.clone()).await;

        let series = client
            .fetch_bars("BTCUSDT", Timeframe::M5, chrono::Duration::days(60))
            .await
            .unwrap();

        assert_eq!(server.requests(), MAX_PAGES);
        assert_eq!(series.len(), MAX_PAGES * MAX_KLINES_PER_REQUEST);
        let last = series.last().unwrap().timestamp;
        assert_eq!(last.timestamp_millis(), newest);
        assert!(Utc::now() - last < chrono::Duration::minutes(10));
    }

    #[tokio::test]
    async fn overlapping_pages_are_deduplicated() {
        let opens = m5_opens(2_500);
        let server = KlineServer::new(opens, 5 * M5_MS);
        let client = client_for(server).await;

        let series = client
            .fetch_bars("ETHUSDT", Timeframe::M5, chrono::Duration::days(10))
            .await
            .unwrap();

        assert_eq!(series.len(), 2_500);
        assert_strictly_ascending(&series);
    }

    #[tokio::test]
    async fn bars_older_than_the_window_are_discarded() {
        let opens = m5_opens(600);
        let server = KlineServer::new(opens, 0);
        let client = client_for(server.clone()).await;

        let series = client
            .fetch_bars("BTCUSDT", Timeframe::M5, chrono::Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(server.requests(), 1);
        assert!(series.len() <= 13);
        let cutoff = Utc::now() - chrono::Duration::hours(1) - chrono::Duration::seconds(5);
        assert!(series.bars().iter().all(|b| b.timestamp >= cutoff));
    }

    #[tokio::test]
    async fn empty_response_is_data_unavailable() {
        let client = client_for(KlineServer::new(Vec::new(), 0)).await;

        let err = client
            .fetch_bars("BTCUSDT", Timeframe::M5, chrono::Duration::days(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn error_status_maps_to_exchange_error() {
        let app = Router::new().route(
            "/api/v3/klines",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    r#"{"code":-1121,"msg":"Invalid symbol."}"#,
                )
            }),
        );
        let base = spawn_server(app).await;
        let client = BinanceClient::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(base);

        let err = client
            .fetch_bars("NOPEUSDT", Timeframe::M5, chrono::Duration::days(5))
            .await
            .unwrap_err();
        match err {
            Error::Exchange(msg) => assert!(msg.contains("Invalid symbol")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
