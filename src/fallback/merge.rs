//! Scoped merge of enrichment across candidates.
//!
//! This is deliberately not a general-purpose deep merge: it understands
//! exactly the fundamentals map and the historical block. Fundamentals merge
//! key-by-key, first writer wins, with heavy statement blocks accepted only
//! from the selected candidate to bound payload size. History rows dedupe by
//! date, dividends by the (date, value, kind) composite.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::models::{Candidate, DividendRow, HistoricalBlock, HistoryRow};

/// Fundamental blocks too large to carry from every source. The list follows
/// the statement-style blocks the primary feed emits.
pub const HEAVY_FUNDAMENTAL_KEYS: &[&str] = &[
    "financials",
    "quarterly_financials",
    "balance_sheet",
    "quarterly_balance_sheet",
    "cashflow",
    "quarterly_cashflow",
    "recommendations",
    "institutional_holders",
    "major_holders",
    "calendar",
];

pub fn is_heavy_key(key: &str) -> bool {
    HEAVY_FUNDAMENTAL_KEYS.contains(&key)
}

/// Result of merging enrichment across candidates.
#[derive(Clone, Debug, Default)]
pub struct MergedEnrichment {
    pub fundamentals: Map<String, Value>,
    pub historical: HistoricalBlock,
}

/// Merge enrichment from candidates already ranked best-first.
///
/// `heavy_allowed` is the `arrival_order` of the candidate whose heavy
/// blocks may pass (the selected base, or the best enrichment source when
/// nothing was priced). The function is pure, so merging the same ranked set
/// twice yields identical output.
pub fn merge_enrichment(ranked: &[&Candidate], heavy_allowed: Option<usize>) -> MergedEnrichment {
    let mut fundamentals: Map<String, Value> = Map::new();
    let mut history: BTreeMap<NaiveDate, HistoryRow> = BTreeMap::new();
    let mut dividends: Vec<DividendRow> = Vec::new();
    let mut dividend_seen: HashSet<(NaiveDate, Decimal, Option<String>)> = HashSet::new();

    for candidate in ranked {
        if !candidate.payload.has_enrichment() {
            continue;
        }
        let allow_heavy = heavy_allowed == Some(candidate.arrival_order);

        for (key, value) in &candidate.payload.fundamentals {
            if value.is_null() {
                continue;
            }
            if !allow_heavy && is_heavy_key(key) {
                continue;
            }
            fundamentals
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        for row in &candidate.payload.historical.history {
            history.entry(row.date).or_insert_with(|| row.clone());
        }

        for dividend in &candidate.payload.historical.dividends {
            let key = (dividend.date, dividend.value, dividend.kind.clone());
            if dividend_seen.insert(key) {
                dividends.push(dividend.clone());
            }
        }
    }

    dividends.sort_by(|a, b| a.date.cmp(&b.date).then(a.value.cmp(&b.value)));

    MergedEnrichment {
        fundamentals,
        historical: HistoricalBlock {
            history: history.into_values().collect(),
            dividends,
        },
    }
}
