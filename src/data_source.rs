//! Market data source seam and the raw tables it produces.

use std::future::Future;

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use crate::candles::{Candle, Series};

/// Errors raised while acquiring or validating price history.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no price data found for '{symbol}', please check the symbol")]
    Empty { symbol: String },

    #[error("price data for '{symbol}' is missing required columns: {}", .missing.join(", "))]
    MissingColumns {
        symbol: String,
        missing: Vec<&'static str>,
    },

    #[error("request for '{symbol}' failed: {source}")]
    Request {
        symbol: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response for '{symbol}': {reason}")]
    Malformed { symbol: String, reason: String },
}

/// A fetched, column-oriented OHLCV table. Columns may be absent and
/// individual cells may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    pub symbol: String,
    pub time: Vec<DateTime<FixedOffset>>,
    pub open: Option<Vec<Option<f64>>>,
    pub high: Option<Vec<Option<f64>>>,
    pub low: Option<Vec<Option<f64>>>,
    pub close: Option<Vec<Option<f64>>>,
    pub volume: Option<Vec<Option<f64>>>,
}

impl PriceTable {
    /// The "not found" table.
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Validate the table and turn it into a [`Series`].
    ///
    /// Rows with any missing cell are dropped. Fails if the table has no rows,
    /// lacks any of the five OHLCV columns, or nothing survives the row filter.
    pub fn into_series(self) -> Result<Series, DataError> {
        if self.is_empty() {
            return Err(DataError::Empty {
                symbol: self.symbol,
            });
        }

        let missing: Vec<&'static str> = [
            ("Open", self.open.is_none()),
            ("High", self.high.is_none()),
            ("Low", self.low.is_none()),
            ("Close", self.close.is_none()),
            ("Volume", self.volume.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) =
            (self.open, self.high, self.low, self.close, self.volume)
        else {
            return Err(DataError::MissingColumns {
                symbol: self.symbol,
                missing,
            });
        };

        let cell = |column: &[Option<f64>], i: usize| column.get(i).copied().flatten();

        let candles: Vec<Candle> = self
            .time
            .iter()
            .enumerate()
            .filter_map(|(i, &time)| {
                Some(Candle::new(
                    time,
                    cell(&open, i)?,
                    cell(&high, i)?,
                    cell(&low, i)?,
                    cell(&close, i)?,
                    cell(&volume, i)?,
                ))
            })
            .collect();

        if candles.is_empty() {
            return Err(DataError::Empty {
                symbol: self.symbol,
            });
        }

        Ok(Series::new(candles))
    }
}

/// Anything that can return historical OHLCV for a symbol.
///
/// `period` is a lookback window such as `"2y"` and `interval` a bar width
/// such as `"1d"`. An empty table means the symbol has no data.
pub trait MarketDataSource {
    fn fetch(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> impl Future<Output = Result<PriceTable, DataError>> + Send;
}
