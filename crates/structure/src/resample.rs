use chrono::{DateTime, Utc};

use common::{Bar, BarSeries, Result, Timeframe};

/// 1970-01-01 was a Thursday; weekly buckets open on Monday 00:00 UTC.
const WEEK_ANCHOR_OFFSET_SECS: i64 = 4 * 86_400;

/// Start of the calendar bucket of `tf` containing `ts`.
///
/// Every intraday interval divides a day, so epoch-floored buckets are also
/// midnight-aligned. Weekly buckets are anchored on Monday.
pub fn bucket_start(ts: DateTime<Utc>, tf: Timeframe) -> DateTime<Utc> {
    let width = tf.duration().num_seconds();
    let secs = ts.timestamp();
    let floored = match tf {
        Timeframe::W1 => {
            (secs - WEEK_ANCHOR_OFFSET_SECS).div_euclid(width) * width + WEEK_ANCHOR_OFFSET_SECS
        }
        _ => secs.div_euclid(width) * width,
    };
    DateTime::from_timestamp(floored, 0).unwrap_or(ts)
}

/// Aggregate `series` into `target` buckets.
///
/// Per bucket: first open, max high, min low, last close, summed volume,
/// stamped with the bucket start. Empty buckets are skipped. The newest
/// bucket may still be forming.
pub fn resample(series: &BarSeries, target: Timeframe) -> Result<BarSeries> {
    let mut buckets: Vec<Bar> = Vec::new();

    for bar in series.bars() {
        let start = bucket_start(bar.timestamp, target);
        match buckets.last_mut() {
            Some(agg) if agg.timestamp == start => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
            }
            _ => buckets.push(Bar {
                timestamp: start,
                ..*bar
            }),
        }
    }

    BarSeries::new(buckets)
}
