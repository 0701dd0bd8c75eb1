use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use common::{
    BarSeries, ClassifiedSeries, Error, FrameView, MarketDataProvider, Result, Snapshot, Timeframe,
};
use structure::{trend_origin, PairingSet};

use crate::alerts::{
    alignment_channel, format_alignment, format_pairing, format_trigger, pairing_channel,
    trigger_channel, Alert, AlertDecision, AlertSignature, AlertState,
};

/// What one cycle produced for one symbol.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub snapshot: Snapshot,
    /// Alerts whose channel changed since the previous cycle.
    pub alerts: Vec<Alert>,
}

/// Per-symbol evaluation state: its own debouncer and classified-frame cache.
pub struct SymbolMonitor {
    symbol: String,
    alerts: AlertState,
    bases: HashMap<Timeframe, BarSeries>,
    frames: BTreeMap<Timeframe, ClassifiedSeries>,
}

impl SymbolMonitor {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            alerts: AlertState::new(),
            bases: HashMap::new(),
            frames: BTreeMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn alert_state(&self) -> &AlertState {
        &self.alerts
    }

    /// Fetch every native base the pairings need. Any failure or empty
    /// series aborts the fetch with `DataUnavailable`.
    pub async fn fetch(
        &self,
        provider: &dyn MarketDataProvider,
        pairings: &PairingSet,
        window: impl Fn(Timeframe) -> chrono::Duration,
    ) -> Result<HashMap<Timeframe, BarSeries>> {
        let mut bases = HashMap::new();
        for source in pairings.sources() {
            let series = provider
                .fetch_bars(&self.symbol, source, window(source))
                .await
                .map_err(|e| match e {
                    Error::DataUnavailable(_) => e,
                    other => Error::DataUnavailable(format!("{source} bars: {other}")),
                })?;
            if series.is_empty() {
                return Err(Error::DataUnavailable(format!(
                    "empty {source} series for {}",
                    self.symbol
                )));
            }
            bases.insert(source, series);
        }
        Ok(bases)
    }

    /// Classify, analyse and debounce. Unchanged bases reuse the cached frames.
    pub fn evaluate(
        &mut self,
        bases: HashMap<Timeframe, BarSeries>,
        pairings: &PairingSet,
        now: DateTime<Utc>,
    ) -> Result<CycleOutcome> {
        if bases != self.bases || self.frames.is_empty() {
            self.frames = pairings.classify(&bases)?;
            self.bases = bases;
        } else {
            debug!(symbol = %self.symbol, "Bars unchanged, reusing classified frames");
        }

        let (views, alignment) = pairings.evaluate(&self.frames);
        let mut alerts = Vec::new();

        for view in &views {
            let channel = pairing_channel(&self.symbol, &view.name);
            let signature = AlertSignature::for_status(channel.clone(), &view.report.status);
            if self.alerts.observe(signature) == AlertDecision::Emit {
                alerts.push(Alert {
                    channel,
                    message: format_pairing(&self.symbol, view),
                });
            }

            let channel = trigger_channel(&self.symbol, &view.name);
            match &view.report.early {
                Some(early) => {
                    let signature = AlertSignature::for_status(channel.clone(), early);
                    if self.alerts.observe(signature) == AlertDecision::Emit {
                        alerts.push(Alert {
                            channel,
                            message: format_trigger(&self.symbol, view),
                        });
                    }
                }
                None => self.alerts.forget(&channel),
            }
        }

        let channel = alignment_channel(&self.symbol);
        if self
            .alerts
            .observe(AlertSignature::for_alignment(channel.clone(), alignment))
            == AlertDecision::Emit
        {
            alerts.push(Alert {
                channel,
                message: format_alignment(&self.symbol, alignment),
            });
        }

        for alert in &alerts {
            info!(symbol = %self.symbol, channel = %alert.channel, message = %alert.message, "Status changed");
        }

        let frames = self
            .frames
            .iter()
            .map(|(&timeframe, series)| FrameView {
                timeframe,
                regime: series.current_regime(),
                origin: trend_origin(series),
                series: series.clone(),
            })
            .collect();

        Ok(CycleOutcome {
            snapshot: Snapshot {
                symbol: self.symbol.clone(),
                evaluated_at: now,
                frames,
                pairings: views,
                alignment,
            },
            alerts,
        })
    }
}
