use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Quote section of a normalized source payload.
///
/// `current_price` is optional: a source may answer with enrichment only.
/// A payload counts as priced when the price is present and positive.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBlock {
    /// Current price, when the source supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<Decimal>,

    /// Quote currency (ISO 4217)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Absolute change since previous close
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Decimal>,

    /// Percentage change since previous close
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<Decimal>,

    /// Previous session close
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<Decimal>,

    /// Market capitalization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,

    /// Trading volume
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,

    /// When the quote itself was observed upstream, if the source embeds one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl QuoteBlock {
    /// The price, filtered to usable values (present and strictly positive).
    pub fn valid_price(&self) -> Option<Decimal> {
        self.current_price.filter(|p| *p > Decimal::ZERO)
    }

    /// Count of populated secondary fields (everything except the price and
    /// the observation timestamp).
    pub fn secondary_field_count(&self) -> usize {
        [
            self.currency.is_some(),
            self.change.is_some(),
            self.change_percent.is_some(),
            self.previous_close.is_some(),
            self.market_cap.is_some(),
            self.volume.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

/// One daily row of price history.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_close: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
    /// Dividend paid on this date, when the feed carries actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dividend: Option<Decimal>,
    /// Split ratio applied on this date, when the feed carries actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_ratio: Option<Decimal>,
}

/// One dividend payment.
///
/// `kind` distinguishes payment types (e.g. dividends vs. JCP) for sources
/// that report it; it participates in dedup but is omitted from output when
/// absent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DividendRow {
    pub date: NaiveDate,
    pub value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Historical section of a payload: price history plus dividend events.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalBlock {
    pub history: Vec<HistoryRow>,
    pub dividends: Vec<DividendRow>,
}

impl HistoricalBlock {
    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.dividends.is_empty()
    }
}

/// Normalized payload produced by one source call.
///
/// Every source, structured feed or scraper, returns this shape. It lives
/// only for the duration of one reconciliation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPayload {
    /// Identifier the source reported for itself (canonicalized later)
    pub data_source: String,

    /// True when the data was extracted from HTML rather than a feed
    pub is_scraped: bool,

    pub quote: QuoteBlock,

    /// Flat map of fundamentals; values are source-shaped JSON
    pub fundamentals: Map<String, Value>,

    pub historical: HistoricalBlock,

    /// Raw diagnostic material from the source, passed through untouched
    pub raw: Value,

    /// When this engine collected the payload
    pub fetched_at: DateTime<Utc>,
}

impl NormalizedPayload {
    /// An empty payload shell for the given source.
    pub fn empty(data_source: impl Into<String>, is_scraped: bool) -> Self {
        Self {
            data_source: data_source.into(),
            is_scraped,
            quote: QuoteBlock::default(),
            fundamentals: Map::new(),
            historical: HistoricalBlock::default(),
            raw: Value::Null,
            fetched_at: Utc::now(),
        }
    }

    /// Usable price, if any.
    pub fn valid_price(&self) -> Option<Decimal> {
        self.quote.valid_price()
    }

    /// True when the payload carries fundamentals or historical data.
    pub fn has_enrichment(&self) -> bool {
        !self.fundamentals.is_empty() || !self.historical.is_empty()
    }

    /// Best available observation timestamp: the quote-embedded one when
    /// present, otherwise the collection time.
    pub fn observation_time(&self) -> DateTime<Utc> {
        self.quote.observed_at.unwrap_or(self.fetched_at)
    }
}
