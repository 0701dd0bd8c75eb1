use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info};

use common::{Alignment, BarSeries, ClassifiedSeries, Lookback, PairingView, Result, Timeframe};

use crate::alignment::alignment;
use crate::classifier::StructureClassifier;
use crate::config::PairingFileConfig;
use crate::resample::resample;
use crate::sequence::SequenceAnalyzer;

/// Resample each requested frame from its native base and classify it.
/// Frames whose base series is missing are left out.
pub fn classify_frames<I>(
    bases: &HashMap<Timeframe, BarSeries>,
    frames: I,
    lookback: Lookback,
) -> Result<BTreeMap<Timeframe, ClassifiedSeries>>
where
    I: IntoIterator<Item = Timeframe>,
{
    let classifier = StructureClassifier::new(lookback);
    let mut out = BTreeMap::new();
    for tf in frames {
        let Some(base) = bases.get(&tf.source()) else {
            continue;
        };
        let classified = if tf == tf.source() {
            classifier.classify(base)
        } else {
            classifier.classify(&resample(base, tf)?)
        };
        debug!(timeframe = %tf, bars = classified.len(), "Classified frame");
        out.insert(tf, classified);
    }
    Ok(out)
}

/// Holds the configured pairings and evaluates them against classified frames.
pub struct PairingSet {
    config: PairingFileConfig,
    lookback: Lookback,
}

impl PairingSet {
    pub fn new(config: PairingFileConfig, lookback: Lookback) -> Self {
        for p in &config.pairings {
            info!(
                name = %p.name,
                setup = %p.setup,
                filter = %p.filter,
                trigger = ?p.trigger,
                anchor = %p.anchor,
                "Registered pairing"
            );
        }
        Self { config, lookback }
    }

    /// Every frame that needs classifying.
    pub fn timeframes(&self) -> BTreeSet<Timeframe> {
        self.config.timeframes()
    }

    /// Native frames that must be fetched to derive every other frame.
    pub fn sources(&self) -> BTreeSet<Timeframe> {
        self.timeframes().into_iter().map(Timeframe::source).collect()
    }

    pub fn classify(
        &self,
        bases: &HashMap<Timeframe, BarSeries>,
    ) -> Result<BTreeMap<Timeframe, ClassifiedSeries>> {
        classify_frames(bases, self.timeframes(), self.lookback)
    }

    /// Run every pairing and the alignment check. A missing frame reads as
    /// an empty series.
    pub fn evaluate(
        &self,
        frames: &BTreeMap<Timeframe, ClassifiedSeries>,
    ) -> (Vec<PairingView>, Alignment) {
        let empty = ClassifiedSeries::default();
        let frame = |tf: Timeframe| frames.get(&tf).unwrap_or(&empty);

        let views = self
            .config
            .pairings
            .iter()
            .map(|p| {
                let report = SequenceAnalyzer::new(p.anchor).analyze(
                    frame(p.setup),
                    frame(p.filter),
                    p.trigger.map(frame),
                );
                PairingView {
                    name: p.name.clone(),
                    setup: p.setup,
                    filter: p.filter,
                    trigger: p.trigger,
                    report,
                }
            })
            .collect();

        let trend: Vec<_> = self
            .config
            .alignment
            .trend
            .iter()
            .map(|&tf| frame(tf).current_regime())
            .collect();
        let entry = frame(self.config.alignment.entry).current_regime();

        (views, alignment(&trend, entry))
    }
}
