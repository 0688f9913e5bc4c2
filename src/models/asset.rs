use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Asset record as owned by the CRUD layer.
///
/// Read-only input to this engine; the engine updates the record's price
/// fields only through the store contract, never through this struct.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub asset_id: String,
    pub portfolio_id: String,
    pub ticker: String,
    pub quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl Asset {
    /// Convenience constructor for the common equity case.
    pub fn new(
        portfolio_id: impl Into<String>,
        asset_id: impl Into<String>,
        ticker: impl Into<String>,
        quantity: Decimal,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            portfolio_id: portfolio_id.into(),
            ticker: ticker.into(),
            quantity,
            asset_class: None,
            country: None,
            currency: None,
        }
    }

    pub fn with_class(mut self, asset_class: impl Into<String>) -> Self {
        self.asset_class = Some(asset_class.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }
}
