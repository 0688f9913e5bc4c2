//! Primary quote adapter: the yfinance bridge.
//!
//! The bridge sidecar wraps yfinance and exposes three endpoints:
//! - `/quote/{symbol}` - live quote
//! - `/history/{symbol}?days=N` - short daily price history with actions
//! - `/fundamentals/{symbol}` - the flat info map
//!
//! The three sub-fetches are independently recoverable: one failing degrades
//! only its section. The current price prefers the live quote and falls back
//! to the most recent history close; only when no price can be derived from
//! any sub-fetch does the adapter report incomplete data.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::errors::SourceError;
use crate::models::{DividendRow, HistoricalBlock, HistoryRow, NormalizedPayload, QuoteBlock};
use crate::source::{classify_transport, FetchOptions, MarketDataSource, RetryPolicy, SourceKind};

const PROVIDER_ID: &str = "YFINANCE";

// ============================================================================
// Bridge Response Structures
// ============================================================================

/// Response from `/quote/{symbol}`.
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    price: Option<f64>,
    currency: Option<String>,
    change: Option<f64>,
    change_percent: Option<f64>,
    previous_close: Option<f64>,
    market_cap: Option<f64>,
    volume: Option<f64>,
    observed_at: Option<DateTime<Utc>>,
}

/// Response from `/history/{symbol}`.
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    rows: Vec<HistoryRowResponse>,
}

/// One daily bar; the key spelling is what the bridge emits.
#[derive(Debug, Deserialize)]
struct HistoryRowResponse {
    date: NaiveDate,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    adjusted_close: Option<f64>,
    volume: Option<f64>,
    #[serde(default)]
    dividends: Option<f64>,
    #[serde(default)]
    stock_splits: Option<f64>,
}

// ============================================================================
// YFinanceSource
// ============================================================================

/// Configuration for the yfinance bridge adapter.
#[derive(Clone, Debug)]
pub struct YFinanceConfig {
    /// Base URL of the bridge sidecar
    pub base_url: String,
    /// Request timeout applied to every sub-fetch
    pub timeout: Duration,
    /// Default history window when the caller does not override it
    pub history_days: u32,
    pub retry: RetryPolicy,
}

impl Default for YFinanceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8643".to_string(),
            timeout: Duration::from_secs(30),
            history_days: 30,
            retry: RetryPolicy::default(),
        }
    }
}

/// Primary quote adapter for equities, ETFs and funds.
pub struct YFinanceSource {
    client: Client,
    config: YFinanceConfig,
}

impl YFinanceSource {
    pub fn new(config: YFinanceConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &FetchOptions,
    ) -> Result<T, SourceError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        let mut request = self.client.get(&url);
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER_ID, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::BadStatus {
                source_id: PROVIDER_ID.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Unreachable {
                source_id: PROVIDER_ID.to_string(),
                message: format!("invalid response body: {}", e),
            })
    }

    async fn fetch_quote(&self, symbol: &str, options: &FetchOptions) -> Result<QuoteResponse, SourceError> {
        let path = format!("/quote/{}", symbol);
        self.config
            .retry
            .run(|| self.get_json::<QuoteResponse>(&path, options))
            .await
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        options: &FetchOptions,
    ) -> Result<HistoryResponse, SourceError> {
        let days = options.history_days.unwrap_or(self.config.history_days).max(1);
        let path = format!("/history/{}?days={}", symbol, days);
        self.config
            .retry
            .run(|| self.get_json::<HistoryResponse>(&path, options))
            .await
    }

    async fn fetch_fundamentals(
        &self,
        symbol: &str,
        options: &FetchOptions,
    ) -> Result<Map<String, Value>, SourceError> {
        let path = format!("/fundamentals/{}", symbol);
        self.config
            .retry
            .run(|| self.get_json::<Map<String, Value>>(&path, options))
            .await
    }
}

#[async_trait]
impl MarketDataSource for YFinanceSource {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn kind(&self) -> SourceKind {
        SourceKind::StructuredFeed
    }

    async fn fetch(
        &self,
        symbol: &str,
        options: &FetchOptions,
    ) -> Result<NormalizedPayload, SourceError> {
        debug!("Fetching {} from the yfinance bridge", symbol);

        let quote = self.fetch_quote(symbol, options).await;
        let history = self.fetch_history(symbol, options).await;
        let fundamentals = self.fetch_fundamentals(symbol, options).await;

        for (section, error) in [
            ("quote", quote.as_ref().err()),
            ("history", history.as_ref().err()),
            ("fundamentals", fundamentals.as_ref().err()),
        ] {
            if let Some(error) = error {
                warn!("yfinance {} sub-fetch failed for {}: {}", section, symbol, error);
            }
        }

        build_payload(quote, history, fundamentals)
    }
}

/// Assemble the normalized payload from the three sub-fetch results.
///
/// Pure so the derivation rules are testable without a bridge.
fn build_payload(
    quote: Result<QuoteResponse, SourceError>,
    history: Result<HistoryResponse, SourceError>,
    fundamentals: Result<Map<String, Value>, SourceError>,
) -> Result<NormalizedPayload, SourceError> {
    if let (Err(quote_err), Err(history_err), Err(fundamentals_err)) =
        (&quote, &history, &fundamentals)
    {
        return Err(SourceError::Unreachable {
            source_id: PROVIDER_ID.to_string(),
            message: format!(
                "all sub-fetches failed: quote: {}; history: {}; fundamentals: {}",
                quote_err, history_err, fundamentals_err
            ),
        });
    }

    let mut sections = Map::new();
    let mut quote_block = QuoteBlock::default();
    let mut historical = HistoricalBlock::default();
    let mut fundamentals_map = Map::new();

    match quote {
        Ok(response) => {
            quote_block = QuoteBlock {
                current_price: decimal(response.price),
                currency: response.currency,
                change: decimal(response.change),
                change_percent: decimal(response.change_percent),
                previous_close: decimal(response.previous_close),
                market_cap: decimal(response.market_cap),
                volume: decimal(response.volume),
                observed_at: response.observed_at,
            };
            sections.insert("quote".to_string(), json!("ok"));
        }
        Err(error) => {
            sections.insert("quote".to_string(), json!(error.to_string()));
        }
    }

    let mut history_currency = None;
    match history {
        Ok(response) => {
            history_currency = response.currency;
            for row in response.rows {
                if let Some(value) = decimal(row.dividends).filter(|d| *d > Decimal::ZERO) {
                    historical.dividends.push(DividendRow {
                        date: row.date,
                        value,
                        kind: None,
                    });
                }
                historical.history.push(HistoryRow {
                    date: row.date,
                    open: decimal(row.open),
                    high: decimal(row.high),
                    low: decimal(row.low),
                    close: decimal(row.close),
                    adjusted_close: decimal(row.adjusted_close),
                    volume: decimal(row.volume),
                    dividend: decimal(row.dividends),
                    split_ratio: decimal(row.stock_splits),
                });
            }
            historical.history.sort_by_key(|row| row.date);
            sections.insert("history".to_string(), json!("ok"));
        }
        Err(error) => {
            sections.insert("history".to_string(), json!(error.to_string()));
        }
    }

    match fundamentals {
        Ok(map) => {
            fundamentals_map = map;
            sections.insert("fundamentals".to_string(), json!("ok"));
        }
        Err(error) => {
            sections.insert("fundamentals".to_string(), json!(error.to_string()));
        }
    }

    // Quote price wins; otherwise the most recent history close.
    if quote_block.valid_price().is_none() {
        quote_block.current_price = historical
            .history
            .iter()
            .rev()
            .find_map(|row| row.close.filter(|c| *c > Decimal::ZERO));
    }

    if quote_block.current_price.is_none() {
        return Err(SourceError::Incomplete {
            source_id: PROVIDER_ID.to_string(),
            missing: "currentPrice".to_string(),
        });
    }

    if quote_block.currency.is_none() {
        quote_block.currency = history_currency.or_else(|| {
            fundamentals_map
                .get("currency")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });
    }

    Ok(NormalizedPayload {
        data_source: PROVIDER_ID.to_string(),
        is_scraped: false,
        quote: quote_block,
        fundamentals: fundamentals_map,
        historical,
        raw: Value::Object(sections),
        fetched_at: Utc::now(),
    })
}

fn decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(Decimal::from_f64_retain)
}

// ============================================================================
// Tests
// ============================================================================
