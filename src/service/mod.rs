//! Top-level orchestration: primary-vs-fallback selection, persistence, and
//! portfolio-wide batch refreshes.
//!
//! [`AssetMarketDataService`] decides which primary adapter serves a market,
//! falls back to the cascade when the primary cannot price an instrument,
//! persists every outcome (including explicit unavailability), and drives
//! batch refreshes through the [`ThrottledScheduler`]. A single asset's
//! failure is always contained: `refresh_one` never propagates an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::cache::{CacheConfig, PayloadCache};
use crate::fallback::{CascadeHealth, FallbackManager};
use crate::models::{Asset, HistoricalBlock, NormalizedPayload, QuoteBlock};
use crate::resolver::{provider_symbol, resolve_market, Market};
use crate::scheduler::{SchedulerConfig, ThrottledScheduler};
use crate::source::{FetchOptions, MarketDataSource};
use crate::store::{AssetPriceUpdate, LatestPrice, MarketDataStore, PriceSnapshot};

/// The payload shape downstream consumers rely on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetQuotePayload {
    pub ticker: String,
    pub market: Market,
    pub data_source: String,
    pub is_scraped: bool,
    pub fetched_at: DateTime<Utc>,
    pub quote: QuoteBlock,
    pub fundamentals: Map<String, Value>,
    pub historical: HistoricalBlock,
    /// Diagnostic trail: primary error, sub-fetch sections, fallback attempts
    pub raw: Value,
}

/// Outcome of refreshing one asset.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    Updated,
    Failed,
}

/// Per-asset refresh result descriptor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    pub asset_id: String,
    pub ticker: String,
    pub status: RefreshStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate of a batch refresh.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
    pub results: Vec<RefreshOutcome>,
}

/// Batch refresh targeting.
#[derive(Clone, Debug, Default)]
pub struct RefreshOptions {
    /// Refresh only this asset instead of the whole portfolio
    pub asset_id: Option<String>,
}

/// Service tuning.
#[derive(Clone, Debug, Default)]
pub struct ServiceConfig {
    pub fetch: FetchOptions,
    pub scheduler: SchedulerConfig,
    pub cache: CacheConfig,
}

struct ServiceInner {
    primary: Arc<dyn MarketDataSource>,
    treasury: Arc<dyn MarketDataSource>,
    fallback: FallbackManager,
    scheduler: ThrottledScheduler,
    store: Arc<dyn MarketDataStore>,
    cache: PayloadCache,
    fetch_options: FetchOptions,
}

/// Orchestrates market data acquisition and persistence per asset.
#[derive(Clone)]
pub struct AssetMarketDataService {
    inner: Arc<ServiceInner>,
}

impl AssetMarketDataService {
    pub fn new(
        primary: Arc<dyn MarketDataSource>,
        treasury: Arc<dyn MarketDataSource>,
        fallback: FallbackManager,
        store: Arc<dyn MarketDataStore>,
    ) -> Self {
        Self::with_config(primary, treasury, fallback, store, ServiceConfig::default())
    }

    pub fn with_config(
        primary: Arc<dyn MarketDataSource>,
        treasury: Arc<dyn MarketDataSource>,
        fallback: FallbackManager,
        store: Arc<dyn MarketDataStore>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                primary,
                treasury,
                fallback,
                scheduler: ThrottledScheduler::new(config.scheduler),
                store,
                cache: PayloadCache::new(config.cache),
                fetch_options: config.fetch,
            }),
        }
    }

    /// Fetch a reconciled payload for one instrument.
    ///
    /// Tries the market's primary adapter first; when it fails or cannot
    /// price the instrument, runs the fallback cascade. Never returns an
    /// error: the worst case is an explicit unavailable payload.
    pub async fn fetch_one(
        &self,
        ticker: &str,
        market: Market,
        options: &FetchOptions,
    ) -> AssetQuotePayload {
        if let Some(cached) = self.inner.cache.get(ticker, market).await {
            debug!("Cache hit for {}@{}", ticker, market);
            return (*cached).clone();
        }

        let symbol = provider_symbol(ticker, market);
        let primary = match market {
            Market::Tesouro => &self.inner.treasury,
            _ => &self.inner.primary,
        };

        let mut primary_error: Option<String> = None;
        let primary_payload: Option<NormalizedPayload> =
            match primary.fetch(&symbol, options).await {
                Ok(payload) => Some(payload),
                Err(fetch_error) => {
                    warn!(
                        "Primary source {} failed for {}: {}",
                        primary.id(),
                        symbol,
                        fetch_error
                    );
                    primary_error = Some(fetch_error.to_string());
                    None
                }
            };

        let payload = match primary_payload {
            Some(primary_result) if primary_result.valid_price().is_some() => {
                info!(
                    "market data refresh: status=ok ticker={} market={} source={} fallback=false",
                    ticker, market, primary_result.data_source
                );
                let mut raw = Map::new();
                raw.insert("primary".to_string(), primary_result.raw.clone());
                AssetQuotePayload {
                    ticker: ticker.trim().to_uppercase(),
                    market,
                    data_source: primary_result.data_source,
                    is_scraped: primary_result.is_scraped,
                    fetched_at: primary_result.fetched_at,
                    quote: primary_result.quote,
                    fundamentals: primary_result.fundamentals,
                    historical: primary_result.historical,
                    raw: Value::Object(raw),
                }
            }
            primary_result => {
                let reconciled = self.inner.fallback.reconcile(&symbol, options).await;

                if reconciled.is_priced() {
                    info!(
                        "market data refresh: status=ok ticker={} market={} source={} fallback=true",
                        ticker, market, reconciled.data_source
                    );
                } else {
                    warn!(
                        "market data refresh: status=degraded ticker={} market={} attempts={}",
                        ticker,
                        market,
                        reconciled.attempts.len()
                    );
                }

                let mut raw = Map::new();
                if let Some(message) = &primary_error {
                    raw.insert("primaryError".to_string(), json!(message));
                }
                if let Some(unpriced) = &primary_result {
                    raw.insert(
                        "primary".to_string(),
                        json!({
                            "dataSource": unpriced.data_source,
                            "sections": unpriced.raw,
                        }),
                    );
                }
                raw.insert(
                    "fallbackAttempts".to_string(),
                    serde_json::to_value(&reconciled.attempts).unwrap_or(Value::Null),
                );

                AssetQuotePayload {
                    ticker: ticker.trim().to_uppercase(),
                    market,
                    data_source: reconciled.data_source,
                    is_scraped: reconciled.is_scraped,
                    fetched_at: reconciled.fetched_at,
                    quote: reconciled.quote,
                    fundamentals: reconciled.fundamentals,
                    historical: reconciled.historical,
                    raw: Value::Object(raw),
                }
            }
        };

        self.inner
            .cache
            .insert(ticker, market, Arc::new(payload.clone()))
            .await;

        payload
    }

    /// Refresh one asset and persist the outcome.
    ///
    /// Never propagates: every failure converts into a `Failed` outcome, and
    /// an unpriceable asset persists an explicit unavailable record rather
    /// than going stale.
    pub async fn refresh_one(&self, asset: &Asset) -> RefreshOutcome {
        let market = resolve_market(asset);
        let payload = self
            .fetch_one(&asset.ticker, market, &self.inner.fetch_options)
            .await;

        let price = payload.quote.valid_price();
        let data_source = payload.data_source.clone();

        match self.persist(asset, payload).await {
            Ok(persisted_snapshot) => {
                if let Some(price) = price {
                    RefreshOutcome {
                        asset_id: asset.asset_id.clone(),
                        ticker: asset.ticker.clone(),
                        status: RefreshStatus::Updated,
                        price: Some(price),
                        data_source: Some(data_source),
                        snapshot_id: Some(persisted_snapshot),
                        error: None,
                    }
                } else {
                    RefreshOutcome {
                        asset_id: asset.asset_id.clone(),
                        ticker: asset.ticker.clone(),
                        status: RefreshStatus::Failed,
                        price: None,
                        data_source: Some(data_source),
                        snapshot_id: Some(persisted_snapshot),
                        error: Some("no source could price the asset".to_string()),
                    }
                }
            }
            Err(store_error) => {
                error!(
                    "Failed to persist refresh for asset {}: {}",
                    asset.asset_id, store_error
                );
                RefreshOutcome {
                    asset_id: asset.asset_id.clone(),
                    ticker: asset.ticker.clone(),
                    status: RefreshStatus::Failed,
                    price,
                    data_source: Some(data_source),
                    snapshot_id: None,
                    error: Some(store_error.to_string()),
                }
            }
        }
    }

    /// Refresh a portfolio (or one asset of it) through the scheduler.
    ///
    /// Fails only if the target assets cannot be listed; individual refresh
    /// failures are aggregated, never propagated.
    pub async fn refresh_many(
        &self,
        portfolio_id: &str,
        options: &RefreshOptions,
    ) -> Result<RefreshSummary, crate::errors::StoreError> {
        let assets: Vec<Asset> = match &options.asset_id {
            Some(asset_id) => self
                .inner
                .store
                .get_asset(portfolio_id, asset_id)
                .await?
                .into_iter()
                .collect(),
            None => self.inner.store.list_portfolio_assets(portfolio_id).await?,
        };

        info!(
            "Refreshing {} asset(s) in portfolio {}",
            assets.len(),
            portfolio_id
        );

        let mut scheduled = Vec::with_capacity(assets.len());
        for asset in assets {
            let identity = (asset.asset_id.clone(), asset.ticker.clone());
            let service = self.clone();
            let handle = self
                .inner
                .scheduler
                .submit(async move { service.refresh_one(&asset).await });
            scheduled.push((identity, handle));
        }

        let results: Vec<RefreshOutcome> = join_all(scheduled.into_iter().map(
            |((asset_id, ticker), handle)| async move {
                match handle.join().await {
                    Some(outcome) => outcome,
                    None => RefreshOutcome {
                        asset_id,
                        ticker,
                        status: RefreshStatus::Failed,
                        price: None,
                        data_source: None,
                        snapshot_id: None,
                        error: Some("refresh task aborted".to_string()),
                    },
                }
            },
        ))
        .await;

        let updated = results
            .iter()
            .filter(|r| r.status == RefreshStatus::Updated)
            .count();
        let failed = results.len() - updated;

        Ok(RefreshSummary {
            processed: results.len(),
            updated,
            failed,
            results,
        })
    }

    /// Persist one refresh outcome: asset price fields, an immutable
    /// snapshot, and the latest pointer. The writes are independent; there is
    /// no cross-write transaction.
    pub async fn persist(
        &self,
        asset: &Asset,
        payload: AssetQuotePayload,
    ) -> Result<String, crate::errors::StoreError> {
        let price = payload.quote.valid_price();
        let current_value = price.map(|p| (p * asset.quantity).round_dp(2));

        let update = AssetPriceUpdate {
            portfolio_id: asset.portfolio_id.clone(),
            asset_id: asset.asset_id.clone(),
            current_price: price,
            current_value,
            last_price_source: payload.data_source.clone(),
            last_price_at: payload.fetched_at,
            updated_at: Utc::now(),
        };
        self.inner.store.update_asset_price(update).await?;

        let snapshot = PriceSnapshot::new(asset, payload);
        self.inner.store.put_snapshot(&snapshot).await?;

        let latest = LatestPrice {
            portfolio_id: asset.portfolio_id.clone(),
            asset_id: asset.asset_id.clone(),
            ticker: asset.ticker.clone(),
            snapshot_id: snapshot.snapshot_id.clone(),
            payload: snapshot.payload.clone(),
            updated_at: Utc::now(),
        };
        self.inner.store.put_latest(&latest).await?;

        debug!(
            "Persisted snapshot {} for asset {}",
            snapshot.snapshot_id, asset.asset_id
        );

        Ok(snapshot.snapshot_id)
    }

    /// Aggregate health of the cascade's scrapers.
    pub async fn health_check(&self) -> CascadeHealth {
        self.inner.fallback.health_check().await
    }
}
