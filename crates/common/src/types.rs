use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One OHLCV price bar. `timestamp` is the bar's open time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered bars with strictly increasing, unique timestamps. Gaps are allowed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Rejects out-of-order or duplicate timestamps.
    pub fn new(bars: Vec<Bar>) -> Result<Self> {
        if let Some(pos) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(Error::Contract(format!(
                "bar timestamps must strictly increase: {} followed by {}",
                bars[pos].timestamp,
                bars[pos + 1].timestamp
            )));
        }
        Ok(Self { bars })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }
}

/// Structure lookback window N. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lookback(usize);

impl Lookback {
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::Contract("structure lookback must be >= 1".into()));
        }
        Ok(Self(n))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for Lookback {
    fn default() -> Self {
        Self(3)
    }
}

/// Delay between polling cycles. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollInterval(std::time::Duration);

impl PollInterval {
    pub fn new(interval: std::time::Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::Contract("poll interval must be > 0".into()));
        }
        Ok(Self(interval))
    }

    pub fn get(self) -> std::time::Duration {
        self.0
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self(std::time::Duration::from_secs(10))
    }
}

/// Bar interval. Intraday frames are derived from M5, W1 from D1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "5m", alias = "M5", alias = "m5")]
    M5,
    #[serde(rename = "15m", alias = "M15", alias = "m15")]
    M15,
    #[serde(rename = "30m", alias = "M30", alias = "m30")]
    M30,
    #[serde(rename = "1h", alias = "H1", alias = "h1")]
    H1,
    #[serde(rename = "4h", alias = "H4", alias = "h4")]
    H4,
    #[serde(rename = "1d", alias = "D1", alias = "d1")]
    D1,
    #[serde(rename = "1w", alias = "W1", alias = "w1")]
    W1,
}

impl Timeframe {
    pub fn duration(self) -> Duration {
        match self {
            Timeframe::M5 => Duration::minutes(5),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::M30 => Duration::minutes(30),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::D1 => Duration::days(1),
            Timeframe::W1 => Duration::weeks(1),
        }
    }

    /// Interval code used by the kline REST endpoint.
    pub fn interval_code(self) -> &'static str {
        match self {
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    pub fn is_intraday(self) -> bool {
        self < Timeframe::D1
    }

    /// The natively fetched frame this one is resampled from.
    pub fn source(self) -> Timeframe {
        if self.is_intraday() {
            Timeframe::M5
        } else {
            Timeframe::D1
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
        };
        write!(f, "{label}")
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "5m" | "m5" => Ok(Timeframe::M5),
            "15m" | "m15" => Ok(Timeframe::M15),
            "30m" | "m30" => Ok(Timeframe::M30),
            "1h" | "h1" => Ok(Timeframe::H1),
            "4h" | "h4" => Ok(Timeframe::H4),
            "1d" | "d1" | "daily" => Ok(Timeframe::D1),
            "1w" | "w1" | "weekly" => Ok(Timeframe::W1),
            other => Err(Error::Config(format!("unknown timeframe '{other}'"))),
        }
    }
}

/// Directional state of a series at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regime {
    Bullish,
    Bearish,
}

impl Regime {
    pub fn opposite(self) -> Self {
        match self {
            Regime::Bullish => Regime::Bearish,
            Regime::Bearish => Regime::Bullish,
        }
    }

    /// Trade direction implied by this regime.
    pub fn direction(self) -> &'static str {
        match self {
            Regime::Bullish => "BUY",
            Regime::Bearish => "SELL",
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Regime::Bullish => write!(f, "BULLISH"),
            Regime::Bearish => write!(f, "BEARISH"),
        }
    }
}

/// A bar labelled with its regime and the trailing levels valid at its close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassifiedBar {
    #[serde(flatten)]
    pub bar: Bar,
    pub regime: Regime,
    pub active_resistance: f64,
    pub active_support: f64,
}

impl ClassifiedBar {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.bar.timestamp
    }
}

/// Regime-labelled bars sharing the timestamps of the series they came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassifiedSeries {
    bars: Vec<ClassifiedBar>,
}

impl ClassifiedSeries {
    /// Rejects out-of-order or duplicate timestamps.
    pub fn new(bars: Vec<ClassifiedBar>) -> Result<Self> {
        if bars.windows(2).any(|w| w[1].timestamp() <= w[0].timestamp()) {
            return Err(Error::Contract(
                "classified bar timestamps must strictly increase".into(),
            ));
        }
        Ok(Self { bars })
    }

    /// Zip an already ordered series with one label per bar.
    /// Extra labels are ignored; missing labels truncate the output.
    pub fn from_series<I>(series: &BarSeries, labels: I) -> Self
    where
        I: IntoIterator<Item = (Regime, f64, f64)>,
    {
        let bars = series
            .bars()
            .iter()
            .zip(labels)
            .map(|(bar, (regime, active_resistance, active_support))| ClassifiedBar {
                bar: *bar,
                regime,
                active_resistance,
                active_support,
            })
            .collect();
        Self { bars }
    }

    pub fn bars(&self) -> &[ClassifiedBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&ClassifiedBar> {
        self.bars.last()
    }

    /// Regime of the most recent bar.
    pub fn current_regime(&self) -> Option<Regime> {
        self.bars.last().map(|b| b.regime)
    }

    /// Bars with `timestamp >= from`.
    pub fn since(&self, from: DateTime<Utc>) -> &[ClassifiedBar] {
        let start = self.bars.partition_point(|b| b.timestamp() < from);
        &self.bars[start..]
    }
}

/// Discriminant of a [`SignalStatus`], used for control flow and alert keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusTag {
    NoData,
    WaitingVr,
    WaitingCf,
    ConfirmedOrigin,
    ConfirmedReentry,
    HighRiskConfirmed,
}

impl std::fmt::Display for StatusTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusTag::NoData => write!(f, "NO_DATA"),
            StatusTag::WaitingVr => write!(f, "WAITING_VR"),
            StatusTag::WaitingCf => write!(f, "WAITING_CF"),
            StatusTag::ConfirmedOrigin => write!(f, "CONFIRMED_ORIGIN"),
            StatusTag::ConfirmedReentry => write!(f, "CONFIRMED_REENTRY"),
            StatusTag::HighRiskConfirmed => write!(f, "HIGH_RISK_CONFIRMED"),
        }
    }
}

/// Retracement/confirmation progress of a setup/filter pairing.
/// The detail string is for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    NoData { detail: String },
    WaitingVr { detail: String },
    /// `failed` counts confirmations that already came and went in this cycle.
    WaitingCf { failed: usize, detail: String },
    ConfirmedOrigin { detail: String },
    ConfirmedReentry { count: usize, detail: String },
    HighRiskConfirmed { detail: String },
}

impl SignalStatus {
    pub fn no_data() -> Self {
        SignalStatus::NoData {
            detail: "no data".into(),
        }
    }

    pub fn waiting_for_data() -> Self {
        SignalStatus::NoData {
            detail: "waiting for data since origin".into(),
        }
    }

    pub fn waiting_vr() -> Self {
        SignalStatus::WaitingVr {
            detail: "momentum, no pullback yet".into(),
        }
    }

    pub fn waiting_cf(failed: usize) -> Self {
        let detail = if failed == 0 {
            "retracement active, waiting for origin".to_string()
        } else {
            format!("retracement active, origin failed ({failed}), next: re-entry")
        };
        SignalStatus::WaitingCf { failed, detail }
    }

    pub fn confirmed_origin() -> Self {
        SignalStatus::ConfirmedOrigin {
            detail: "entry: origin".into(),
        }
    }

    pub fn confirmed_reentry(count: usize) -> Self {
        SignalStatus::ConfirmedReentry {
            count,
            detail: format!("entry: continuation ({count})"),
        }
    }

    pub fn high_risk() -> Self {
        SignalStatus::HighRiskConfirmed {
            detail: "trigger frame turned before filter".into(),
        }
    }

    pub fn tag(&self) -> StatusTag {
        match self {
            SignalStatus::NoData { .. } => StatusTag::NoData,
            SignalStatus::WaitingVr { .. } => StatusTag::WaitingVr,
            SignalStatus::WaitingCf { .. } => StatusTag::WaitingCf,
            SignalStatus::ConfirmedOrigin { .. } => StatusTag::ConfirmedOrigin,
            SignalStatus::ConfirmedReentry { .. } => StatusTag::ConfirmedReentry,
            SignalStatus::HighRiskConfirmed { .. } => StatusTag::HighRiskConfirmed,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            SignalStatus::NoData { detail }
            | SignalStatus::WaitingVr { detail }
            | SignalStatus::WaitingCf { detail, .. }
            | SignalStatus::ConfirmedOrigin { detail }
            | SignalStatus::ConfirmedReentry { detail, .. }
            | SignalStatus::HighRiskConfirmed { detail } => detail,
        }
    }

    /// Confirmation count carried by the status, if any.
    pub fn count(&self) -> Option<usize> {
        match self {
            SignalStatus::WaitingCf { failed, .. } => Some(*failed),
            SignalStatus::ConfirmedReentry { count, .. } => Some(*count),
            _ => None,
        }
    }

    /// True for statuses that mark an entry (filter or trigger confirmed).
    pub fn is_entry(&self) -> bool {
        matches!(
            self.tag(),
            StatusTag::ConfirmedOrigin | StatusTag::ConfirmedReentry | StatusTag::HighRiskConfirmed
        )
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.tag(), self.detail())
    }
}

/// Output of one sequence analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceReport {
    /// Current regime of the setup frame.
    pub trend: Option<Regime>,
    /// First bar of the setup frame's current regime block.
    pub origin: Option<DateTime<Utc>>,
    pub status: SignalStatus,
    /// `HighRiskConfirmed` when the trigger frame turned while the filter
    /// still retraces. Never replaces `status`.
    pub early: Option<SignalStatus>,
}

impl SequenceReport {
    pub fn no_data() -> Self {
        Self {
            trend: None,
            origin: None,
            status: SignalStatus::no_data(),
            early: None,
        }
    }
}

/// Whether a stack of trend frames agrees, and whether the entry frame followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "regime", rename_all = "snake_case")]
pub enum Alignment {
    FullAlignment(Regime),
    AwaitingBreakout(Regime),
    Mixed,
}

impl std::fmt::Display for Alignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Alignment::FullAlignment(r) => write!(f, "{} (full alignment)", r.direction()),
            Alignment::AwaitingBreakout(r) => write!(f, "trend {r}, waiting for entry-frame breakout"),
            Alignment::Mixed => write!(f, "mixed"),
        }
    }
}

/// Per-timeframe view handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct FrameView {
    pub timeframe: Timeframe,
    pub regime: Option<Regime>,
    pub origin: Option<DateTime<Utc>>,
    pub series: ClassifiedSeries,
}

/// Result of one configured setup/filter(/trigger) pairing.
#[derive(Debug, Clone, Serialize)]
pub struct PairingView {
    pub name: String,
    pub setup: Timeframe,
    pub filter: Timeframe,
    pub trigger: Option<Timeframe>,
    #[serde(flatten)]
    pub report: SequenceReport,
}

/// Everything one evaluation cycle produced for one symbol.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub symbol: String,
    pub evaluated_at: DateTime<Utc>,
    pub frames: Vec<FrameView>,
    pub pairings: Vec<PairingView>,
    pub alignment: Alignment,
}

/// Latest snapshot per symbol, shared between the engine and its readers.
pub type SnapshotStore = Arc<tokio::sync::RwLock<BTreeMap<String, Snapshot>>>;

/// Current state of the polling engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
    /// Cycles keep running and publishing; notification dispatch is muted.
    Paused,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
            EngineState::Paused => write!(f, "paused"),
        }
    }
}

/// Commands sent to the engine via the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Start,
    Stop,
    Pause,
    Resume,
}
