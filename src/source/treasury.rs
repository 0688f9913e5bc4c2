//! Government-bond adapter for Tesouro Direto data.
//!
//! Bond prices come from a small set of JSON endpoints. The adapter resolves
//! the bond kind and maturity from the ticker, walks the kind-specific
//! endpoint list before the general one, retries each endpoint with bounded
//! backoff, and picks the best row from whichever endpoint answers first:
//! exact ticker text, then kind + maturity year, then the first row.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use crate::errors::SourceError;
use crate::models::{HistoricalBlock, NormalizedPayload, QuoteBlock};
use crate::resolver::{parse_bond, BondKind, BondProfile};
use crate::source::{classify_transport, FetchOptions, MarketDataSource, RetryPolicy, SourceKind};

const PROVIDER_ID: &str = "TESOURO_DIRETO";
const REQUEST_TIMEOUT_SECS: u64 = 30;

const GENERAL_ENDPOINT: &str =
    "https://www.tesourodireto.com.br/json/br/com/b3/tesourodireto/service/api/treasurybondsinfo.json";

// ============================================================================
// Endpoint configuration
// ============================================================================

/// Ordered endpoint lists, kind-specific lists tried before the general one.
#[derive(Clone, Debug)]
pub struct TreasuryEndpoints {
    pub by_kind: HashMap<BondKind, Vec<String>>,
    pub general: Vec<String>,
}

impl Default for TreasuryEndpoints {
    fn default() -> Self {
        let mut by_kind = HashMap::new();
        for (kind, segment) in [
            (BondKind::IndexLinked, "ipca"),
            (BondKind::Floating, "selic"),
            (BondKind::FixedRate, "prefixado"),
        ] {
            by_kind.insert(kind, vec![format!("{}?bondType={}", GENERAL_ENDPOINT, segment)]);
        }

        Self {
            by_kind,
            general: vec![GENERAL_ENDPOINT.to_string()],
        }
    }
}

// ============================================================================
// Feed response structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct BondListResponse {
    #[serde(default)]
    bonds: Vec<BondRow>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct BondRow {
    name: String,
    #[serde(default)]
    bond_type: Option<String>,
    #[serde(default)]
    maturity: Option<NaiveDate>,
    unit_price: Option<f64>,
    #[serde(default)]
    annual_yield: Option<f64>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl BondRow {
    fn kind(&self) -> Option<BondKind> {
        self.bond_type
            .as_deref()
            .and_then(BondKind::from_text)
            .or_else(|| BondKind::from_text(&self.name))
    }
}

// ============================================================================
// TreasurySource
// ============================================================================

/// Government-bond adapter.
pub struct TreasurySource {
    client: Client,
    endpoints: TreasuryEndpoints,
    retry: RetryPolicy,
}

impl TreasurySource {
    pub fn new() -> Self {
        Self::with_endpoints(TreasuryEndpoints::default())
    }

    pub fn with_endpoints(endpoints: TreasuryEndpoints) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoints,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The endpoints to try for a bond profile, kind-specific first.
    fn ordered_endpoints(&self, profile: &BondProfile) -> Vec<&str> {
        let mut endpoints: Vec<&str> = Vec::new();
        if let Some(kind) = profile.kind {
            if let Some(list) = self.endpoints.by_kind.get(&kind) {
                endpoints.extend(list.iter().map(String::as_str));
            }
        }
        endpoints.extend(self.endpoints.general.iter().map(String::as_str));
        endpoints
    }

    async fn get_bonds(
        &self,
        endpoint: &str,
        options: &FetchOptions,
    ) -> Result<BondListResponse, SourceError> {
        let mut request = self.client.get(endpoint);
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
            .json::<BondListResponse>()
            .await
            .map_err(|e| SourceError::Unreachable {
                source_id: PROVIDER_ID.to_string(),
                message: format!("invalid response body: {}", e),
            })
    }
}

impl Default for TreasurySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataSource for TreasurySource {
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
        let profile = parse_bond(symbol);
        let endpoints = self.ordered_endpoints(&profile);

        if endpoints.is_empty() {
            return Err(SourceError::NotConfigured(
                "no treasury endpoints configured".to_string(),
            ));
        }

        debug!(
            "Fetching bond {} (kind: {:?}, maturity: {:?}) across {} endpoint(s)",
            symbol,
            profile.kind,
            profile.maturity,
            endpoints.len()
        );

        let mut attempts: Vec<String> = Vec::new();

        for endpoint in endpoints {
            let result = self.retry.run(|| self.get_bonds(endpoint, options)).await;

            match result {
                Ok(response) => {
                    if response.bonds.is_empty() {
                        attempts.push(format!("{}: empty bond list", endpoint));
                        continue;
                    }
                    match select_row(&response.bonds, symbol, &profile) {
                        Some(row) if row.unit_price.map_or(false, |p| p > 0.0) => {
                            return Ok(row_to_payload(row, endpoint));
                        }
                        Some(row) => {
                            attempts
                                .push(format!("{}: row '{}' missing unit price", endpoint, row.name));
                        }
                        None => attempts.push(format!("{}: no matching row", endpoint)),
                    }
                }
                Err(error) => {
                    warn!("Treasury endpoint {} failed for {}: {}", endpoint, symbol, error);
                    attempts.push(format!("{}: {}", endpoint, error));
                }
            }
        }

        Err(SourceError::Exhausted {
            source_id: PROVIDER_ID.to_string(),
            attempts,
        })
    }
}

/// Pick the best row for a ticker: exact normalized name, then containment,
/// then kind + maturity year, then the first row.
fn select_row<'a>(rows: &'a [BondRow], ticker: &str, profile: &BondProfile) -> Option<&'a BondRow> {
    let wanted = normalize(ticker);

    if let Some(row) = rows.iter().find(|row| normalize(&row.name) == wanted) {
        return Some(row);
    }
    if let Some(row) = rows.iter().find(|row| {
        let name = normalize(&row.name);
        name.contains(&wanted) || wanted.contains(&name)
    }) {
        return Some(row);
    }

    if let Some(kind) = profile.kind {
        if let Some(row) = rows.iter().find(|row| {
            row.kind() == Some(kind)
                && match profile.maturity {
                    Some(maturity) => row.maturity.map_or(false, |m| m.year() == maturity.year()),
                    None => true,
                }
        }) {
            return Some(row);
        }
    }

    rows.first()
}

fn row_to_payload(row: &BondRow, endpoint: &str) -> NormalizedPayload {
    let mut fundamentals = Map::new();
    if let Some(bond_type) = &row.bond_type {
        fundamentals.insert("bondType".to_string(), json!(bond_type));
    } else if let Some(kind) = row.kind() {
        fundamentals.insert("bondType".to_string(), json!(kind.as_str()));
    }
    if let Some(maturity) = row.maturity {
        fundamentals.insert("maturity".to_string(), json!(maturity));
    }
    if let Some(annual_yield) = row.annual_yield {
        fundamentals.insert("annualYield".to_string(), json!(annual_yield));
    }

    NormalizedPayload {
        data_source: PROVIDER_ID.to_string(),
        is_scraped: false,
        quote: QuoteBlock {
            current_price: row.unit_price.and_then(Decimal::from_f64_retain),
            currency: Some("BRL".to_string()),
            observed_at: row.updated_at,
            ..Default::default()
        },
        fundamentals,
        historical: HistoricalBlock::default(),
        raw: json!({ "endpoint": endpoint, "row": row }),
        fetched_at: Utc::now(),
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(name: &str, maturity: Option<(i32, u32, u32)>, unit_price: Option<f64>) -> BondRow {
        BondRow {
            name: name.to_string(),
            bond_type: None,
            maturity: maturity.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            unit_price,
            annual_yield: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_bond_list_parsing() {
        let json = r#"{
            "bonds": [
                {
                    "name": "Tesouro IPCA+ 2029",
                    "bond_type": "IPCA+",
                    "maturity": "2029-05-15",
                    "unit_price": 3250.55,
                    "annual_yield": 6.12,
                    "updated_at": "2026-08-04T13:00:00Z"
                }
            ]
        }"#;

        let response: BondListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.bonds.len(), 1);
        assert_eq!(response.bonds[0].unit_price, Some(3250.55));
        assert_eq!(response.bonds[0].kind(), Some(BondKind::IndexLinked));
    }

    #[test]
    fn test_select_row_prefers_exact_ticker_text() {
        let rows = vec![
            row("Tesouro IPCA+ 2035", Some((2035, 5, 15)), Some(1500.0)),
            row("Tesouro  IPCA+   2029", Some((2029, 5, 15)), Some(3250.55)),
        ];
        let profile = parse_bond("Tesouro IPCA+ 2029");

        let selected = select_row(&rows, "Tesouro IPCA+ 2029", &profile).unwrap();
        assert_eq!(normalize(&selected.name), "TESOURO IPCA+ 2029");
    }

    #[test]
    fn test_select_row_falls_back_to_kind_and_maturity() {
        let rows = vec![
            row("Tesouro Prefixado 2031", Some((2031, 1, 1)), Some(700.0)),
            row("Tesouro Selic 2029", Some((2029, 3, 1)), Some(14000.0)),
        ];
        // Ticker text matches no row name.
        let profile = parse_bond("LFT 01/03/2029");

        let selected = select_row(&rows, "LFT 01/03/2029", &profile).unwrap();
        assert_eq!(selected.name, "Tesouro Selic 2029");
    }

    #[test]
    fn test_select_row_falls_back_to_first_row() {
        let rows = vec![
            row("Tesouro Prefixado 2031", Some((2031, 1, 1)), Some(700.0)),
            row("Tesouro Selic 2029", Some((2029, 3, 1)), Some(14000.0)),
        ];
        let profile = parse_bond("Tesouro Educa+ 2041");

        let selected = select_row(&rows, "Tesouro Educa+ 2041", &profile).unwrap();
        assert_eq!(selected.name, "Tesouro Prefixado 2031");
    }

    #[test]
    fn test_row_to_payload() {
        let mut bond = row("Tesouro IPCA+ 2029", Some((2029, 5, 15)), Some(3250.75));
        bond.annual_yield = Some(6.12);

        let payload = row_to_payload(&bond, "https://example.test/bonds");
        assert_eq!(payload.data_source, PROVIDER_ID);
        assert_eq!(payload.quote.current_price, Some(dec!(3250.75)));
        assert_eq!(payload.quote.currency.as_deref(), Some("BRL"));
        assert_eq!(payload.fundamentals["annualYield"], json!(6.12));
        assert_eq!(payload.fundamentals["bondType"], json!("index-linked"));
    }

    #[test]
    fn test_ordered_endpoints_kind_specific_first() {
        let source = TreasurySource::new();
        let profile = parse_bond("Tesouro Selic 2027");

        let endpoints = source.ordered_endpoints(&profile);
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints[0].contains("selic"));
        assert_eq!(endpoints[1], GENERAL_ENDPOINT);
    }

    #[test]
    fn test_ordered_endpoints_unknown_kind_uses_general_only() {
        let source = TreasurySource::new();
        let profile = parse_bond("Tesouro Educa+ 2041");

        let endpoints = source.ordered_endpoints(&profile);
        assert_eq!(endpoints, vec![GENERAL_ENDPOINT]);
    }
}
