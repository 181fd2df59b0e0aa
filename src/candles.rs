use chrono::{DateTime, FixedOffset};

/// One OHLCV bar. `time` carries the exchange's UTC offset so calendar
/// bucketing works on the local trading date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub time: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        time: DateTime<FixedOffset>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// An immutable, strictly time-ascending sequence of candles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    candles: Vec<Candle>,
}

impl Series {
    /// Builds a series from candles in any order. Candles sharing a timestamp
    /// collapse to the last one given.
    pub fn new(mut candles: Vec<Candle>) -> Self {
        // Stable sort keeps input order among equal timestamps, so the
        // reverse-dedup below retains the last occurrence.
        candles.sort_by_key(|c| c.time);
        candles.reverse();
        candles.dedup_by_key(|c| c.time);
        candles.reverse();
        Self { candles }
    }

    /// Wraps candles the caller already guarantees to be strictly ascending.
    pub(crate) fn from_sorted(candles: Vec<Candle>) -> Self {
        debug_assert!(candles.windows(2).all(|w| w[0].time < w[1].time));
        Self { candles }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}
