use async_trait::async_trait;
use chrono::Duration;

use crate::{BarSeries, Result, Timeframe};

/// Source of OHLCV bars.
///
/// `BinanceClient` in `crates/engine` implements this against the public
/// kline endpoint. Tests implement it with canned series.
///
/// An empty or failed fetch is recoverable: the poll loop skips the cycle.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch native bars for `symbol` at `interval`, covering at least
    /// `window` back from now, oldest first.
    async fn fetch_bars(
        &self,
        symbol: &str,
        interval: Timeframe,
        window: Duration,
    ) -> Result<BarSeries>;
}
