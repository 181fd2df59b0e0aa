use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::aggregator::aggregate;
use crate::candles::Series;
use crate::data_source::{DataError, MarketDataSource};
use crate::storage_utils::HistoryConfig;
use crate::timeframe::{Timeframe, TimeframeSelector};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("could not fetch daily data for {ticker}: {source}")]
    DataUnavailable {
        ticker: String,
        #[source]
        source: DataError,
    },
}

/// Discrete state changes produced by the input listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Advance,
    Retreat,
    Exit,
}

/// Everything the render loop and input listener share.
///
/// The per-timeframe series are built once in [`AppState::from_daily`] and
/// never change. Only the selector position and the exit flag move after
/// construction.
#[derive(Debug)]
pub struct AppState {
    ticker: String,
    series: HashMap<Timeframe, Series>,
    selector: TimeframeSelector,
    exit: AtomicBool,
    changed: Notify,
}

impl AppState {
    /// Fetch the base daily history once and derive every other timeframe.
    pub async fn initialize<S: MarketDataSource>(
        ticker: &str,
        source: &S,
        history: &HistoryConfig,
    ) -> Result<Self, AppError> {
        let unavailable = |source| AppError::DataUnavailable {
            ticker: ticker.to_uppercase(),
            source,
        };

        let table = source
            .fetch(ticker, &history.period, &history.interval)
            .await
            .map_err(unavailable)?;
        let daily = table.into_series().map_err(unavailable)?;

        info!(ticker, bars = daily.len(), "daily history loaded");
        Ok(Self::from_daily(ticker, daily))
    }

    pub fn from_daily(ticker: &str, daily: Series) -> Self {
        let series = Timeframe::ALL
            .into_iter()
            .map(|tf| {
                let derived = match tf.period() {
                    Some(period) => aggregate(&daily, period),
                    None => daily.clone(),
                };
                debug!(timeframe = tf.id(), bars = derived.len(), "series ready");
                (tf, derived)
            })
            .collect();

        Self {
            ticker: ticker.to_string(),
            series,
            selector: TimeframeSelector::new(),
            exit: AtomicBool::new(false),
            changed: Notify::new(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn current_timeframe(&self) -> Timeframe {
        self.selector.current()
    }

    pub fn series(&self, timeframe: Timeframe) -> &Series {
        // Every timeframe is inserted in from_daily.
        &self.series[&timeframe]
    }

    /// Series for the selected timeframe. May be empty when the history is
    /// too short to fill a single bucket.
    pub fn current_series(&self) -> &Series {
        self.series(self.current_timeframe())
    }

    pub fn current_title(&self) -> String {
        format!(
            "{} - {} Chart",
            self.ticker.to_uppercase(),
            self.current_timeframe().label()
        )
    }

    pub fn apply(&self, command: Command) {
        match command {
            Command::Advance => {
                let tf = self.selector.advance();
                debug!(timeframe = tf.id(), "advanced");
            }
            Command::Retreat => {
                let tf = self.selector.retreat();
                debug!(timeframe = tf.id(), "retreated");
            }
            Command::Exit => self.exit.store(true, Ordering::Relaxed),
        }
        self.changed.notify_one();
    }

    pub fn request_exit(&self) {
        self.apply(Command::Exit);
    }

    pub fn should_exit(&self) -> bool {
        self.exit.load(Ordering::Relaxed)
    }

    /// Resolves after the next [`AppState::apply`], or immediately if one
    /// happened since the last wait.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }
}
