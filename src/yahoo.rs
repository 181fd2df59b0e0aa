use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::data_source::{DataError, MarketDataSource, PriceTable};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

// Yahoo rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

// --- Wire format ---

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize, Debug)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Deserialize, Debug)]
struct ChartMeta {
    #[serde(rename = "gmtoffset", default)]
    gmt_offset: i32,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug, Default)]
struct Quote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

// --- Client ---

/// Yahoo Finance v8 chart endpoint.
pub struct YahooSource {
    client: Client,
    base_url: String,
}

impl YahooSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl MarketDataSource for YahooSource {
    async fn fetch(&self, symbol: &str, period: &str, interval: &str) -> Result<PriceTable, DataError> {
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            symbol
        );
        let query = [
            ("range", period),
            ("interval", interval),
            ("includePrePost", "false"),
        ];

        debug!(%url, period, interval, "requesting chart");

        let request_failed = |source| DataError::Request {
            symbol: symbol.to_string(),
            source,
        };

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        let body = response.text().await.map_err(request_failed)?;

        if status == StatusCode::NOT_FOUND {
            warn!(symbol, "symbol not found");
            return Ok(PriceTable::empty(symbol));
        }

        if !status.is_success() {
            return Err(DataError::Malformed {
                symbol: symbol.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        parse_chart(symbol, &body)
    }
}

/// Decode a chart payload into a [`PriceTable`].
///
/// A "Not Found" error object or a result without timestamps yields an
/// empty table. Only the first result and its first quote block are used.
fn parse_chart(symbol: &str, body: &str) -> Result<PriceTable, DataError> {
    let malformed = |reason: String| DataError::Malformed {
        symbol: symbol.to_string(),
        reason,
    };

    let response: ChartResponse = serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;

    if let Some(error) = response.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            return Ok(PriceTable::empty(symbol));
        }
        return Err(malformed(format!(
            "{}: {}",
            error.code,
            error.description.unwrap_or_default()
        )));
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(PriceTable::empty(symbol));
    };

    if result.timestamp.is_empty() {
        return Ok(PriceTable::empty(symbol));
    }

    let offset = FixedOffset::east_opt(result.meta.gmt_offset)
        .ok_or_else(|| malformed(format!("invalid gmtoffset {}", result.meta.gmt_offset)))?;

    let time = result
        .timestamp
        .iter()
        .map(|&ts| {
            DateTime::from_timestamp(ts, 0)
                .map(|utc| utc.with_timezone(&offset))
                .ok_or_else(|| malformed(format!("invalid timestamp {ts}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    Ok(PriceTable {
        symbol: symbol.to_string(),
        time,
        open: quote.open,
        high: quote.high,
        low: quote.low,
        close: quote.close,
        volume: quote.volume,
    })
}
