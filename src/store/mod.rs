//! Persistence contract for refresh results.
//!
//! The engine issues three kinds of writes against an external key-value
//! store: the asset record's price fields, an append-only snapshot, and a
//! mutable "latest" pointer. Table design is owned elsewhere; this module
//! defines only the records and the trait, plus an in-memory implementation
//! for tests and embedding.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::Asset;
use crate::service::AssetQuotePayload;

/// Update to the asset record's mutable price fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPriceUpdate {
    pub portfolio_id: String,
    pub asset_id: String,
    pub current_price: Option<Decimal>,
    /// `current_price * quantity`, rounded to cents
    pub current_value: Option<Decimal>,
    pub last_price_source: String,
    pub last_price_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable record of one reconciled payload. Append-only: the engine never
/// mutates or deletes a snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    pub snapshot_id: String,
    pub portfolio_id: String,
    pub asset_id: String,
    pub ticker: String,
    pub payload: AssetQuotePayload,
    pub created_at: DateTime<Utc>,
}

impl PriceSnapshot {
    pub fn new(asset: &Asset, payload: AssetQuotePayload) -> Self {
        Self {
            snapshot_id: snapshot_id(),
            portfolio_id: asset.portfolio_id.clone(),
            asset_id: asset.asset_id.clone(),
            ticker: asset.ticker.clone(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// The most recent payload per asset, overwritten on every refresh. Not
/// written transactionally with the snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestPrice {
    pub portfolio_id: String,
    pub asset_id: String,
    pub ticker: String,
    pub snapshot_id: String,
    pub payload: AssetQuotePayload,
    pub updated_at: DateTime<Utc>,
}

/// Collision-resistant snapshot id: sortable UTC-time prefix plus a random
/// suffix.
pub fn snapshot_id() -> String {
    format!(
        "{}-{}",
        Utc::now().format("%Y%m%dT%H%M%S%3fZ"),
        Uuid::new_v4().simple()
    )
}

/// Write and query operations this engine needs from the persistence layer.
#[async_trait]
pub trait MarketDataStore: Send + Sync {
    /// Overwrite the asset record's price fields.
    async fn update_asset_price(&self, update: AssetPriceUpdate) -> Result<(), StoreError>;

    /// Append one immutable snapshot.
    async fn put_snapshot(&self, snapshot: &PriceSnapshot) -> Result<(), StoreError>;

    /// Overwrite the latest pointer for the snapshot's asset.
    async fn put_latest(&self, latest: &LatestPrice) -> Result<(), StoreError>;

    /// All asset records in a portfolio.
    async fn list_portfolio_assets(&self, portfolio_id: &str) -> Result<Vec<Asset>, StoreError>;

    /// One asset record, when it exists.
    async fn get_asset(
        &self,
        portfolio_id: &str,
        asset_id: &str,
    ) -> Result<Option<Asset>, StoreError>;
}
