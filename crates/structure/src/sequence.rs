use serde::{Deserialize, Serialize};

use common::{ClassifiedSeries, SequenceReport, SignalStatus};

use crate::blocks::regime_blocks;
use crate::origin::trend_origin;

/// Which retracement (VR) block since the trend origin opens the cycle window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPolicy {
    /// The first opposite-regime block since origin. Confirmations are
    /// numbered from the first pullback of the trend.
    #[default]
    #[serde(alias = "first")]
    FirstRetracement,
    /// The most recent opposite-regime block since origin. Every fresh
    /// pullback restarts the count.
    #[serde(alias = "latest")]
    LatestRetracement,
}

impl std::fmt::Display for AnchorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnchorPolicy::FirstRetracement => write!(f, "first"),
            AnchorPolicy::LatestRetracement => write!(f, "latest"),
        }
    }
}

/// Retracement/confirmation sequence analysis across a setup (trend) frame,
/// a filter frame and an optional trigger frame.
///
/// 1. The filter is sliced from the setup's trend origin onward.
/// 2. No opposite-regime block in the slice: `WaitingVr`.
/// 3. Otherwise the cycle window starts at the anchor VR block and counts the
///    trend-regime blocks inside it (`cf_count`).
/// 4. Filter currently opposite: `WaitingCf`. Filter with the trend:
///    `ConfirmedOrigin` for the first confirmation, `ConfirmedReentry(n)` after.
/// 5. While `WaitingCf`, a trigger already back with the trend adds an early
///    `HighRiskConfirmed` next to the main status.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceAnalyzer {
    pub policy: AnchorPolicy,
}

impl SequenceAnalyzer {
    pub fn new(policy: AnchorPolicy) -> Self {
        Self { policy }
    }

    pub fn analyze(
        &self,
        setup: &ClassifiedSeries,
        filter: &ClassifiedSeries,
        trigger: Option<&ClassifiedSeries>,
    ) -> SequenceReport {
        let (Some(trend), Some(origin)) = (setup.current_regime(), trend_origin(setup)) else {
            return SequenceReport::no_data();
        };
        let opposite = trend.opposite();

        let report = |status: SignalStatus, early: Option<SignalStatus>| SequenceReport {
            trend: Some(trend),
            origin: Some(origin),
            status,
            early,
        };

        let slice = filter.since(origin);
        if slice.is_empty() {
            return report(SignalStatus::waiting_for_data(), None);
        }

        let blocks = regime_blocks(slice);
        let mut retracements = blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.regime == opposite)
            .map(|(idx, _)| idx);
        let anchor = match self.policy {
            AnchorPolicy::FirstRetracement => retracements.next(),
            AnchorPolicy::LatestRetracement => retracements.last(),
        };
        let Some(anchor) = anchor else {
            return report(SignalStatus::waiting_vr(), None);
        };

        let cf_count = blocks[anchor..]
            .iter()
            .filter(|b| b.regime == trend)
            .count();

        // The slice is a suffix of the filter, so its last bar is the
        // filter's current bar.
        if filter.current_regime() == Some(opposite) {
            let early = trigger
                .filter(|t| t.current_regime() == Some(trend))
                .map(|_| SignalStatus::high_risk());
            return report(SignalStatus::waiting_cf(cf_count), early);
        }

        let status = match cf_count {
            1 => SignalStatus::confirmed_origin(),
            n => SignalStatus::confirmed_reentry(n),
        };
        report(status, None)
    }
}
