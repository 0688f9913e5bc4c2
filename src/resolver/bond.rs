use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// dd/mm/yyyy, the spelling used on Tesouro Direto statements.
    static ref FULL_DATE: Regex =
        Regex::new(r"(\d{2})/(\d{2})/(\d{4})").expect("static regex");
    /// Four-digit year fallback for names like "Tesouro IPCA+ 2029".
    static ref YEAR_ONLY: Regex = Regex::new(r"\b(20\d{2})\b").expect("static regex");
}

/// Government bond remuneration type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BondKind {
    /// Inflation-indexed (IPCA+ / NTN-B family)
    IndexLinked,
    /// Floating rate (Selic / LFT family)
    Floating,
    /// Fixed rate (Prefixado / LTN / NTN-F family)
    FixedRate,
}

impl BondKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BondKind::IndexLinked => "index-linked",
            BondKind::Floating => "floating",
            BondKind::FixedRate => "fixed-rate",
        }
    }

    /// Heuristic keyword match over free-form bond text. Index-linked
    /// keywords are checked before fixed-rate ones so "Tesouro IPCA+ com
    /// juros prefixados" resolves as index-linked.
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.to_uppercase();
        if text.contains("IPCA") || text.contains("IGPM") || text.contains("IGP-M")
            || text.contains("NTN-B") || text.contains("NTNB")
        {
            return Some(BondKind::IndexLinked);
        }
        if text.contains("SELIC") || text.contains("LFT") {
            return Some(BondKind::Floating);
        }
        if text.contains("PREFIXADO") || text.contains("PRE-FIXADO")
            || text.contains("LTN") || text.contains("NTN-F") || text.contains("NTNF")
        {
            return Some(BondKind::FixedRate);
        }
        None
    }
}

impl std::fmt::Display for BondKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bond attributes recovered from a ticker string.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BondProfile {
    pub kind: Option<BondKind>,
    pub maturity: Option<NaiveDate>,
}

/// Extract bond kind and maturity from a free-form ticker.
///
/// The maturity is taken from a dd/mm/yyyy occurrence when present; bond
/// names that carry only the year fall back to January 1st of that year.
pub fn parse_bond(ticker: &str) -> BondProfile {
    BondProfile {
        kind: BondKind::from_text(ticker),
        maturity: extract_maturity(ticker),
    }
}

fn extract_maturity(text: &str) -> Option<NaiveDate> {
    if let Some(captures) = FULL_DATE.captures(text) {
        let day: u32 = captures.get(1)?.as_str().parse().ok()?;
        let month: u32 = captures.get(2)?.as_str().parse().ok()?;
        let year: i32 = captures.get(3)?.as_str().parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    let year: i32 = YEAR_ONLY.captures(text)?.get(1)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, 1, 1)
}
