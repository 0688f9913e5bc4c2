//! Ephemeral in-memory payload cache with TTL using moka.
//!
//! Short-lived reuse of fetched payloads so bursts of lookups for the same
//! instrument do not re-run the cascade. Entries are keyed `ticker@market`.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::resolver::Market;
use crate::service::AssetQuotePayload;

/// Cache tuning.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_capacity: 1_000,
        }
    }
}

/// TTL cache of reconciled payloads.
pub struct PayloadCache {
    cache: Cache<String, Arc<AssetQuotePayload>>,
}

impl PayloadCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: Cache::builder()
                .time_to_live(config.ttl)
                .max_capacity(config.max_capacity)
                .build(),
        }
    }

    fn key(ticker: &str, market: Market) -> String {
        format!("{}@{}", ticker.trim().to_uppercase(), market)
    }

    pub async fn get(&self, ticker: &str, market: Market) -> Option<Arc<AssetQuotePayload>> {
        self.cache.get(&Self::key(ticker, market)).await
    }

    pub async fn insert(&self, ticker: &str, market: Market, payload: Arc<AssetQuotePayload>) {
        self.cache.insert(Self::key(ticker, market), payload).await;
    }

    pub async fn invalidate(&self, ticker: &str, market: Market) {
        self.cache.invalidate(&Self::key(ticker, market)).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for PayloadCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
