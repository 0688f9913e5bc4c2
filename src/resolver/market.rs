use serde::{Deserialize, Serialize};

use crate::models::Asset;

/// Market segment an asset trades in.
///
/// Drives primary-adapter selection and provider symbol spelling.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    /// Brazilian government bonds (Tesouro Direto)
    Tesouro,
    /// Brazilian exchange (B3)
    Br,
    /// Canadian exchange (TSX)
    Ca,
    /// United States exchanges
    Us,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Tesouro => "TESOURO",
            Market::Br => "BR",
            Market::Ca => "CA",
            Market::Us => "US",
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the market segment for an asset.
///
/// Treasury heuristics take precedence over country mapping: a `TESOURO`
/// ticker prefix, or a bond asset class with a blank or Brazilian country,
/// is a government bond regardless of country code. Everything else maps by
/// country, defaulting to the US.
pub fn resolve_market(asset: &Asset) -> Market {
    let ticker = asset.ticker.trim().to_uppercase();
    if ticker.starts_with("TESOURO") {
        return Market::Tesouro;
    }

    let country = asset
        .country
        .as_deref()
        .map(|c| c.trim().to_uppercase())
        .unwrap_or_default();

    let is_bond = asset
        .asset_class
        .as_deref()
        .map(|c| c.trim().eq_ignore_ascii_case("bond"))
        .unwrap_or(false);
    if is_bond && (country.is_empty() || country == "BR") {
        return Market::Tesouro;
    }

    match country.as_str() {
        "BR" => Market::Br,
        "CA" => Market::Ca,
        _ => Market::Us,
    }
}

/// Spell a ticker the way the quote provider expects for a market.
///
/// Appends the exchange suffix (`.SA` for B3, `.TO` for TSX) idempotently:
/// re-applying never double-appends. Treasury tickers pass through with only
/// case normalization.
pub fn provider_symbol(ticker: &str, market: Market) -> String {
    let symbol = ticker.trim().to_uppercase();

    let suffix = match market {
        Market::Br => ".SA",
        Market::Ca => ".TO",
        Market::Tesouro | Market::Us => return symbol,
    };

    if symbol.ends_with(suffix) {
        symbol
    } else {
        format!("{}{}", symbol, suffix)
    }
}
