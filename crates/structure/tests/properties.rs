use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use common::{Bar, BarSeries, Lookback, Regime, Timeframe};
use structure::{regime_blocks, resample, trend_origin, StructureClassifier};

/// Random walk of 5-minute bars built from (close delta, upper wick, lower wick).
fn walk(steps: &[(f64, f64, f64)]) -> BarSeries {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut close = 100.0;
    let bars = steps
        .iter()
        .enumerate()
        .map(|(i, &(delta, up, down))| {
            let open = close;
            close = (close + delta).max(1.0);
            Bar {
                timestamp: t0 + Duration::minutes(5 * i as i64),
                open,
                high: open.max(close) + up,
                low: (open.min(close) - down).max(0.5),
                close,
                volume: 1.0 + up,
            }
        })
        .collect();
    BarSeries::new(bars).unwrap()
}

fn steps() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    prop::collection::vec((-3.0f64..3.0, 0.0f64..2.0, 0.0f64..2.0), 1..200)
}

proptest! {
    /// Consecutive regime blocks never share a regime and cover every bar.
    #[test]
    fn regime_blocks_are_maximal(steps in steps(), n in 1usize..12) {
        let classified = StructureClassifier::new(Lookback::new(n).unwrap()).classify(&walk(&steps));
        let blocks = regime_blocks(classified.bars());
        prop_assert_eq!(blocks.iter().map(|b| b.len()).sum::<usize>(), classified.len());
        for pair in blocks.windows(2) {
            prop_assert_ne!(pair[0].regime, pair[1].regime);
            prop_assert_eq!(pair[0].end, pair[1].start);
        }
    }

    /// Resistance never rises inside a bearish block; support never falls inside a bullish one.
    #[test]
    fn active_levels_ratchet_within_blocks(steps in steps(), n in 1usize..12) {
        let classified = StructureClassifier::new(Lookback::new(n).unwrap()).classify(&walk(&steps));
        for pair in classified.bars().windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if prev.regime != curr.regime {
                continue;
            }
            match curr.regime {
                Regime::Bearish => prop_assert!(curr.active_resistance <= prev.active_resistance),
                Regime::Bullish => prop_assert!(curr.active_support >= prev.active_support),
            }
        }
    }

    /// A flip only happens on a close beyond the level active at that bar.
    #[test]
    fn flips_happen_only_on_breach(steps in steps(), n in 1usize..12) {
        let classified = StructureClassifier::new(Lookback::new(n).unwrap()).classify(&walk(&steps));
        for pair in classified.bars().windows(2) {
            let curr = pair[1];
            if pair[0].regime == curr.regime {
                continue;
            }
            match curr.regime {
                Regime::Bullish => prop_assert!(curr.bar.close > curr.active_resistance),
                Regime::Bearish => prop_assert!(curr.bar.close < curr.active_support),
            }
        }
    }

    /// Classification is a pure function of its inputs.
    #[test]
    fn classification_is_deterministic(steps in steps(), n in 1usize..12) {
        let series = walk(&steps);
        let classifier = StructureClassifier::new(Lookback::new(n).unwrap());
        prop_assert_eq!(classifier.classify(&series), classifier.classify(&series));
    }

    /// Every bar from the origin on carries the final regime; the bar before it does not.
    #[test]
    fn origin_starts_the_final_block(steps in steps(), n in 1usize..12) {
        let classified = StructureClassifier::new(Lookback::new(n).unwrap()).classify(&walk(&steps));
        let origin = trend_origin(&classified).unwrap();
        let current = classified.current_regime().unwrap();
        let idx = classified.bars().iter().position(|b| b.timestamp() == origin).unwrap();
        prop_assert!(classified.bars()[idx..].iter().all(|b| b.regime == current));
        if idx > 0 {
            prop_assert_ne!(classified.bars()[idx - 1].regime, current);
        }
    }

    /// Resampling keeps total volume and never adds buckets.
    #[test]
    fn resample_preserves_volume(steps in steps()) {
        let series = walk(&steps);
        let coarse = resample(&series, Timeframe::M30).unwrap();
        prop_assert!(coarse.len() <= series.len());
        let before: f64 = series.bars().iter().map(|b| b.volume).sum();
        let after: f64 = coarse.bars().iter().map(|b| b.volume).sum();
        prop_assert!((before - after).abs() < 1e-6);
    }
}
