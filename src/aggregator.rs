//! Calendar resampling of a fine-grained series into weekly or monthly bars.

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone};

use crate::candles::{Candle, Series};

/// Coarse calendar period a series can be resampled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    /// ISO week, Monday through Sunday.
    Week,
    /// Calendar month.
    Month,
}

impl Period {
    /// First calendar day of the period containing `date`.
    fn start_of(self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Week => {
                let back = u64::from(date.weekday().num_days_from_monday());
                date - Days::new(back)
            }
            Period::Month => date.with_day(1).unwrap_or(date),
        }
    }

    fn bucket_time(self, time: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        let start = self.start_of(time.date_naive());
        let midnight = start.and_time(NaiveTime::MIN);
        time.offset()
            .from_local_datetime(&midnight)
            .single()
            .unwrap_or(*time)
    }
}

/// Resample `series` into one bar per `period`.
///
/// Each bar opens at the first open and closes at the last close of its
/// bucket, spans the extreme high and low, and carries the summed volume.
/// Periods without any underlying candle produce no bar. An empty input
/// yields an empty series.
pub fn aggregate(series: &Series, period: Period) -> Series {
    if series.is_empty() {
        return Series::empty();
    }

    let mut aggregated: Vec<Candle> = Vec::new();
    let mut current: Option<Candle> = None;

    for candle in series {
        let bucket = period.bucket_time(&candle.time);

        match current.as_mut() {
            Some(agg) if agg.time == bucket => {
                agg.high = agg.high.max(candle.high);
                agg.low = agg.low.min(candle.low);
                agg.close = candle.close;
                agg.volume += candle.volume;
            }
            _ => {
                if let Some(done) = current.take() {
                    aggregated.push(done);
                }
                current = Some(Candle::new(
                    bucket,
                    candle.open,
                    candle.high,
                    candle.low,
                    candle.close,
                    candle.volume,
                ));
            }
        }
    }

    if let Some(done) = current {
        aggregated.push(done);
    }

    Series::from_sorted(aggregated)
}
