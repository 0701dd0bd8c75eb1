use std::collections::VecDeque;

use common::{BarSeries, ClassifiedSeries, Lookback, Regime};

/// Swing-structure regime classifier.
///
/// A ratcheting breakout / trailing-stop model. While BEARISH the active
/// resistance only contracts toward price (min with the rolling high); a close
/// above it flips to BULLISH and seeds support from the rolling low. BULLISH
/// mirrors this with support. Starts BEARISH at the first bar's high/low.
///
/// Rolling extremes span the trailing `lookback` bars (N). Bars at index
/// `0..=N` use their own high/low; the rolling window applies from index
/// `N + 1` (`i > N`), one bar later than a full window first exists.
#[derive(Debug, Clone, Copy)]
pub struct StructureClassifier {
    pub lookback: Lookback,
}

impl StructureClassifier {
    pub fn new(lookback: Lookback) -> Self {
        Self { lookback }
    }

    /// Classify `series` in one pass. Empty input gives an empty output.
    pub fn classify(&self, series: &BarSeries) -> ClassifiedSeries {
        let Some(first) = series.first() else {
            return ClassifiedSeries::default();
        };

        let n = self.lookback.get();
        let mut highs = RollingExtreme::new(n, |new, old| new >= old);
        let mut lows = RollingExtreme::new(n, |new, old| new <= old);

        let mut regime = Regime::Bearish;
        let mut resistance = first.high;
        let mut support = first.low;
        let mut labels = Vec::with_capacity(series.len());

        for (i, bar) in series.bars().iter().enumerate() {
            let rolling_max = highs.push(i, bar.high);
            let rolling_min = lows.push(i, bar.low);
            let (local_max, local_min) = if i > n {
                (rolling_max, rolling_min)
            } else {
                (bar.high, bar.low)
            };

            match regime {
                Regime::Bearish => {
                    if local_max < resistance {
                        resistance = local_max;
                    }
                    if bar.close > resistance {
                        regime = Regime::Bullish;
                        support = local_min;
                    }
                }
                Regime::Bullish => {
                    if local_min > support {
                        support = local_min;
                    }
                    if bar.close < support {
                        regime = Regime::Bearish;
                        resistance = local_max;
                    }
                }
            }

            labels.push((regime, resistance, support));
        }

        ClassifiedSeries::from_series(series, labels)
    }
}

/// Monotonic deque tracking the extreme of the last `window` values.
struct RollingExtreme<F> {
    window: usize,
    dominates: F,
    queue: VecDeque<(usize, f64)>,
}

impl<F> RollingExtreme<F>
where
    F: Fn(f64, f64) -> bool,
{
    fn new(window: usize, dominates: F) -> Self {
        Self {
            window,
            dominates,
            queue: VecDeque::with_capacity(window + 1),
        }
    }

    /// Push value `i` and return the extreme over `[i + 1 - window, i]`.
    fn push(&mut self, i: usize, value: f64) -> f64 {
        while self
            .queue
            .back()
            .is_some_and(|&(_, old)| (self.dominates)(value, old))
        {
            self.queue.pop_back();
        }
        self.queue.push_back((i, value));
        while self
            .queue
            .front()
            .is_some_and(|&(idx, _)| idx + self.window <= i)
        {
            self.queue.pop_front();
        }
        self.queue.front().map_or(value, |&(_, v)| v)
    }
}
