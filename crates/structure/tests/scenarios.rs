use chrono::{DateTime, Duration, TimeZone, Utc};

use common::{
    Bar, BarSeries, ClassifiedBar, ClassifiedSeries, Lookback, Regime, SignalStatus, StatusTag,
};
use structure::{trend_origin, SequenceAnalyzer, StructureClassifier};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap()
}

fn five_min(i: usize) -> DateTime<Utc> {
    t0() + Duration::minutes(5 * i as i64)
}

/// Ten falling bars, a breakout on bar 11, then nine rising bars.
fn breakout_series() -> BarSeries {
    let mut bars = Vec::new();
    for i in 0..10 {
        let f = i as f64;
        bars.push(Bar {
            timestamp: five_min(i),
            open: 109.5 - f,
            high: 110.0 - f,
            low: 108.0 - f,
            close: 109.0 - f,
            volume: 10.0,
        });
    }
    bars.push(Bar {
        timestamp: five_min(10),
        open: 100.0,
        high: 106.0,
        low: 101.0,
        close: 105.0,
        volume: 40.0,
    });
    for k in 0..9 {
        let f = k as f64;
        bars.push(Bar {
            timestamp: five_min(11 + k),
            open: 105.5 + f,
            high: 107.0 + f,
            low: 103.0 + f,
            close: 106.0 + f,
            volume: 12.0,
        });
    }
    BarSeries::new(bars).unwrap()
}

fn truncated(series: &ClassifiedSeries, len: usize) -> ClassifiedSeries {
    ClassifiedSeries::new(series.bars()[..len].to_vec()).unwrap()
}

/// Filter frame on the same clock: bullish, dips bearish on bars 12-13, bullish again from 14.
fn filter_series() -> ClassifiedSeries {
    let bars = (0..20)
        .map(|i| ClassifiedBar {
            bar: Bar {
                timestamp: five_min(i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1.0,
            },
            regime: if i == 11 || i == 12 {
                Regime::Bearish
            } else {
                Regime::Bullish
            },
            active_resistance: 101.0,
            active_support: 99.0,
        })
        .collect();
    ClassifiedSeries::new(bars).unwrap()
}

#[test]
fn breakout_flips_regime_on_bar_eleven() {
    let classified =
        StructureClassifier::new(Lookback::new(3).unwrap()).classify(&breakout_series());

    assert!(classified.bars()[..10]
        .iter()
        .all(|b| b.regime == Regime::Bearish));
    assert!(classified.bars()[10..]
        .iter()
        .all(|b| b.regime == Regime::Bullish));
    assert_eq!(classified.bars()[9].active_resistance, 103.0);
    assert_eq!(trend_origin(&classified), Some(five_min(10)));
}

#[test]
fn filter_dip_and_recovery_confirms_origin() {
    let setup = StructureClassifier::new(Lookback::new(3).unwrap()).classify(&breakout_series());
    let filter = filter_series();
    let analyzer = SequenceAnalyzer::default();

    // Bar 11: trend just started, filter has not pulled back.
    let at_11 = analyzer.analyze(&truncated(&setup, 11), &truncated(&filter, 11), None);
    assert_eq!(at_11.status.tag(), StatusTag::WaitingVr);
    assert_eq!(at_11.origin, Some(five_min(10)));

    // Bar 13: retracement in progress.
    let at_13 = analyzer.analyze(&truncated(&setup, 13), &truncated(&filter, 13), None);
    assert_eq!(at_13.status, SignalStatus::waiting_cf(0));

    // Bar 14: filter back with the trend.
    let at_14 = analyzer.analyze(&truncated(&setup, 14), &truncated(&filter, 14), None);
    assert_eq!(at_14.trend, Some(Regime::Bullish));
    assert_eq!(at_14.status, SignalStatus::confirmed_origin());
    assert!(at_14.status.is_entry());
}

#[test]
fn filter_dip_before_breakout_does_not_count() {
    let setup = StructureClassifier::new(Lookback::new(3).unwrap()).classify(&breakout_series());
    let bars = filter_series()
        .bars()
        .iter()
        .enumerate()
        .map(|(i, b)| ClassifiedBar {
            regime: if i < 5 { Regime::Bearish } else { Regime::Bullish },
            ..*b
        })
        .collect();
    let filter = ClassifiedSeries::new(bars).unwrap();

    let report = SequenceAnalyzer::default().analyze(&setup, &filter, None);
    assert_eq!(report.status.tag(), StatusTag::WaitingVr);
}
