//! DashMap-backed store for tests and single-process embedding.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::StoreError;
use crate::models::Asset;

use super::{AssetPriceUpdate, LatestPrice, MarketDataStore, PriceSnapshot};

type AssetKey = (String, String);

/// In-memory implementation of the persistence contract.
///
/// Snapshot append-only semantics are enforced: writing a snapshot id twice
/// is a conflict.
#[derive(Default)]
pub struct MemoryStore {
    assets: DashMap<AssetKey, Asset>,
    price_updates: DashMap<AssetKey, AssetPriceUpdate>,
    snapshots: DashMap<String, PriceSnapshot>,
    latest: DashMap<AssetKey, LatestPrice>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an asset record, as the CRUD layer would.
    pub fn insert_asset(&self, asset: Asset) {
        self.assets.insert(
            (asset.portfolio_id.clone(), asset.asset_id.clone()),
            asset,
        );
    }

    /// All snapshots recorded for an asset, oldest first.
    pub fn snapshots_for(&self, portfolio_id: &str, asset_id: &str) -> Vec<PriceSnapshot> {
        let mut snapshots: Vec<PriceSnapshot> = self
            .snapshots
            .iter()
            .filter(|entry| {
                entry.portfolio_id == portfolio_id && entry.asset_id == asset_id
            })
            .map(|entry| entry.clone())
            .collect();
        snapshots.sort_by(|a, b| a.snapshot_id.cmp(&b.snapshot_id));
        snapshots
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn latest_for(&self, portfolio_id: &str, asset_id: &str) -> Option<LatestPrice> {
        self.latest
            .get(&(portfolio_id.to_string(), asset_id.to_string()))
            .map(|entry| entry.clone())
    }

    pub fn price_update_for(
        &self,
        portfolio_id: &str,
        asset_id: &str,
    ) -> Option<AssetPriceUpdate> {
        self.price_updates
            .get(&(portfolio_id.to_string(), asset_id.to_string()))
            .map(|entry| entry.clone())
    }
}

#[async_trait]
impl MarketDataStore for MemoryStore {
    async fn update_asset_price(&self, update: AssetPriceUpdate) -> Result<(), StoreError> {
        self.price_updates.insert(
            (update.portfolio_id.clone(), update.asset_id.clone()),
            update,
        );
        Ok(())
    }

    async fn put_snapshot(&self, snapshot: &PriceSnapshot) -> Result<(), StoreError> {
        if self.snapshots.contains_key(&snapshot.snapshot_id) {
            return Err(StoreError::Conflict(format!(
                "snapshot {} already exists",
                snapshot.snapshot_id
            )));
        }
        self.snapshots
            .insert(snapshot.snapshot_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn put_latest(&self, latest: &LatestPrice) -> Result<(), StoreError> {
        self.latest.insert(
            (latest.portfolio_id.clone(), latest.asset_id.clone()),
            latest.clone(),
        );
        Ok(())
    }

    async fn list_portfolio_assets(&self, portfolio_id: &str) -> Result<Vec<Asset>, StoreError> {
        let mut assets: Vec<Asset> = self
            .assets
            .iter()
            .filter(|entry| entry.portfolio_id == portfolio_id)
            .map(|entry| entry.clone())
            .collect();
        assets.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
        Ok(assets)
    }

    async fn get_asset(
        &self,
        portfolio_id: &str,
        asset_id: &str,
    ) -> Result<Option<Asset>, StoreError> {
        Ok(self
            .assets
            .get(&(portfolio_id.to_string(), asset_id.to_string()))
            .map(|entry| entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::UNAVAILABLE_SOURCE;
    use crate::models::{HistoricalBlock, QuoteBlock};
    use crate::resolver::Market;
    use crate::service::AssetQuotePayload;
    use crate::store::snapshot_id;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::{Map, Value};

    fn payload() -> AssetQuotePayload {
        AssetQuotePayload {
            ticker: "PETR4".to_string(),
            market: Market::Br,
            data_source: UNAVAILABLE_SOURCE.to_string(),
            is_scraped: false,
            fetched_at: Utc::now(),
            quote: QuoteBlock::default(),
            fundamentals: Map::new(),
            historical: HistoricalBlock::default(),
            raw: Value::Null,
        }
    }

    fn snapshot(id: &str) -> PriceSnapshot {
        PriceSnapshot {
            snapshot_id: id.to_string(),
            portfolio_id: "p1".to_string(),
            asset_id: "a1".to_string(),
            ticker: "PETR4".to_string(),
            payload: payload(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_snapshots_are_append_only() {
        let store = MemoryStore::new();
        let id = snapshot_id();

        store.put_snapshot(&snapshot(&id)).await.unwrap();
        let second = store.put_snapshot(&snapshot(&id)).await;

        assert!(matches!(second, Err(StoreError::Conflict(_))));
        assert_eq!(store.snapshot_count(), 1);
    }

    #[tokio::test]
    async fn test_list_portfolio_assets_filters_by_portfolio() {
        let store = MemoryStore::new();
        store.insert_asset(Asset::new("p1", "a1", "PETR4", dec!(100)));
        store.insert_asset(Asset::new("p1", "a2", "VALE3", dec!(50)));
        store.insert_asset(Asset::new("p2", "a3", "AAPL", dec!(10)));

        let assets = store.list_portfolio_assets("p1").await.unwrap();
        assert_eq!(assets.len(), 2);
        assert!(assets.iter().all(|a| a.portfolio_id == "p1"));
    }

    #[tokio::test]
    async fn test_latest_pointer_is_overwritten() {
        let store = MemoryStore::new();

        for i in 0..2 {
            let latest = LatestPrice {
                portfolio_id: "p1".to_string(),
                asset_id: "a1".to_string(),
                ticker: "PETR4".to_string(),
                snapshot_id: format!("snap-{}", i),
                payload: payload(),
                updated_at: Utc::now(),
            };
            store.put_latest(&latest).await.unwrap();
        }

        let latest = store.latest_for("p1", "a1").unwrap();
        assert_eq!(latest.snapshot_id, "snap-1");
    }

    #[tokio::test]
    async fn test_get_asset() {
        let store = MemoryStore::new();
        store.insert_asset(Asset::new("p1", "a1", "PETR4", dec!(100)));

        assert!(store.get_asset("p1", "a1").await.unwrap().is_some());
        assert!(store.get_asset("p1", "missing").await.unwrap().is_none());
    }
}
