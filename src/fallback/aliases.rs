//! Canonical source-id resolution.
//!
//! Sources report implementation-specific names for themselves; the alias
//! table maps those spellings to the canonical ids used by the trust table
//! and the audit trace. Unknown ids pass through unchanged.

use std::collections::HashMap;

/// Alias table from reported source names to canonical ids.
#[derive(Clone, Debug)]
pub struct SourceAliases {
    map: HashMap<String, String>,
}

impl Default for SourceAliases {
    fn default() -> Self {
        let entries: &[(&str, &str)] = &[
            ("yahoo", "YFINANCE"),
            ("yahoo_finance", "YFINANCE"),
            ("yfinance", "YFINANCE"),
            ("tesouro", "TESOURO_DIRETO"),
            ("tesouro_direto", "TESOURO_DIRETO"),
            ("tesourodireto.com.br", "TESOURO_DIRETO"),
            ("brapi", "BRAPI"),
            ("brapi.dev", "BRAPI"),
            ("hg_brasil", "HGBRASIL"),
            ("hgbrasil", "HGBRASIL"),
            ("hgbrasil.com", "HGBRASIL"),
            ("status_invest", "STATUSINVEST"),
            ("statusinvest", "STATUSINVEST"),
            ("statusinvest.com.br", "STATUSINVEST"),
            ("fundamentus", "FUNDAMENTUS"),
            ("fundamentus.com.br", "FUNDAMENTUS"),
            ("google", "GOOGLEFINANCE"),
            ("google_finance", "GOOGLEFINANCE"),
            ("googlefinance", "GOOGLEFINANCE"),
        ];

        Self {
            map: entries
                .iter()
                .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
                .collect(),
        }
    }
}

impl SourceAliases {
    /// Build a table from explicit entries; alias keys are matched
    /// case-insensitively.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            map: entries
                .into_iter()
                .map(|(alias, canonical)| (alias.to_lowercase(), canonical))
                .collect(),
        }
    }

    /// Resolve a reported id to its canonical form. Ids without an alias
    /// entry fall back to themselves.
    pub fn canonical(&self, reported: &str) -> String {
        let key = reported.trim().to_lowercase();
        self.map
            .get(&key)
            .cloned()
            .unwrap_or_else(|| reported.trim().to_string())
    }
}
