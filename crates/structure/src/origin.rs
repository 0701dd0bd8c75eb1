use chrono::{DateTime, Utc};

use common::ClassifiedSeries;

/// Timestamp of the first bar of the final regime block.
///
/// Scans back from the last bar to the first bar whose regime differs and
/// returns the bar right after it, or the first timestamp when the whole
/// series shares one regime. `None` for an empty series.
pub fn trend_origin(series: &ClassifiedSeries) -> Option<DateTime<Utc>> {
    let bars = series.bars();
    let current = bars.last()?.regime;
    let start = bars
        .iter()
        .rposition(|b| b.regime != current)
        .map_or(0, |i| i + 1);
    Some(bars[start].timestamp())
}
