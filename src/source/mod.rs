//! Source contract and concrete adapters.
//!
//! Every data source - the primary quote bridge, the government-bond feed,
//! and the injected cascade of alternative feeds and scrapers - implements
//! [`MarketDataSource`]. Hard failures surface as [`SourceError`], never as
//! an empty payload.

mod backoff;
pub mod treasury;
pub mod yfinance;

pub use backoff::RetryPolicy;
pub use treasury::{TreasuryEndpoints, TreasurySource};
pub use yfinance::{YFinanceConfig, YFinanceSource};

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SourceError;
use crate::models::NormalizedPayload;

/// How a source obtains its data.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Official or structured endpoint (API, JSON, CSV)
    StructuredFeed,
    /// HTML extraction from pages not intended as a feed
    Scraper,
}

/// Per-request fetch options.
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    /// Overrides the adapter's configured request timeout
    pub timeout: Option<Duration>,
    /// How many days of price history to request, when the source supports it
    pub history_days: Option<u32>,
}

/// Result of a scraper health probe.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub ok: bool,
    pub checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            ok: true,
            checked_at: Utc::now(),
            details: None,
        }
    }

    pub fn degraded(details: impl Into<String>) -> Self {
        Self {
            ok: false,
            checked_at: Utc::now(),
            details: Some(details.into()),
        }
    }
}

/// Map a reqwest transport failure to the source error taxonomy.
pub(crate) fn classify_transport(source: &str, error: reqwest::Error) -> SourceError {
    if error.is_timeout() {
        SourceError::Timeout {
            source_id: source.to_string(),
        }
    } else {
        SourceError::Unreachable {
            source_id: source.to_string(),
            message: error.to_string(),
        }
    }
}

/// Contract every market data source implements.
///
/// The cascade and the service depend only on this trait; concrete cascade
/// sources are injected at construction so tests stay deterministic.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Identifier this source reports for itself. Canonicalized through the
    /// alias table before scoring.
    fn id(&self) -> &'static str;

    fn kind(&self) -> SourceKind;

    /// Fetch a normalized payload for the symbol.
    ///
    /// Must return `Err` for hard failures (unreachable, bad status, timeout,
    /// missing mandatory field) - never a silently empty payload.
    async fn fetch(
        &self,
        symbol: &str,
        options: &FetchOptions,
    ) -> Result<NormalizedPayload, SourceError>;

    /// Health probe. Meaningful for scrapers, which can silently break when
    /// page markup changes; feeds inherit this benign default.
    async fn health_check(&self) -> HealthStatus {
        HealthStatus::ok()
    }
}
