//! The fallback cascade: invoke, score, select, merge.
//!
//! The manager runs every configured source in a fixed order (structured
//! feeds first, then scrapers), scores each response, selects the best priced
//! candidate, and merges enrichment from everything else. It never returns an
//! error: when nothing can price the symbol it degrades to an explicit
//! unavailable payload that still carries whatever enrichment was obtained.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{AttemptStatus, Candidate, HistoricalBlock, QuoteBlock, SourceAttempt};
use crate::source::{FetchOptions, HealthStatus, MarketDataSource, SourceKind};

use super::aliases::SourceAliases;
use super::merge::merge_enrichment;
use super::scoring::ScoringConfig;

/// Source id reported when no candidate could price the symbol.
pub const UNAVAILABLE_SOURCE: &str = "unavailable";

/// One reconciled payload: the output of a cascade run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledPayload {
    /// Canonical id of the selected source, or `"unavailable"`
    pub data_source: String,
    pub is_scraped: bool,
    pub quote: QuoteBlock,
    pub fundamentals: Map<String, Value>,
    pub historical: HistoricalBlock,
    /// Full attempt trace; observability only
    pub attempts: Vec<SourceAttempt>,
    pub fetched_at: DateTime<Utc>,
}

impl ReconciledPayload {
    pub fn is_priced(&self) -> bool {
        self.quote.valid_price().is_some()
    }
}

/// Health of one probed scraper.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceHealth {
    pub source_id: String,
    #[serde(flatten)]
    pub status: HealthStatus,
}

/// Aggregated cascade health.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeHealth {
    /// True when every probed scraper reported ok
    pub ok: bool,
    pub checked_at: DateTime<Utc>,
    pub sources: Vec<SourceHealth>,
}

/// Orchestrates the alternative-source cascade.
pub struct FallbackManager {
    sources: Vec<Arc<dyn MarketDataSource>>,
    scoring: ScoringConfig,
    aliases: SourceAliases,
}

impl FallbackManager {
    pub fn new(sources: Vec<Arc<dyn MarketDataSource>>) -> Self {
        Self::with_config(sources, ScoringConfig::default(), SourceAliases::default())
    }

    /// Construct with injected scoring and alias tables; tests use this to
    /// stay hermetic.
    pub fn with_config(
        sources: Vec<Arc<dyn MarketDataSource>>,
        scoring: ScoringConfig,
        aliases: SourceAliases,
    ) -> Self {
        Self {
            sources,
            scoring,
            aliases,
        }
    }

    /// Run the full cascade for a symbol.
    ///
    /// Invokes every source sequentially, never aborting on individual
    /// failures, and always resolves to a payload.
    pub async fn reconcile(&self, symbol: &str, options: &FetchOptions) -> ReconciledPayload {
        let now = Utc::now();
        let mut attempts: Vec<SourceAttempt> = Vec::new();
        let mut candidates: Vec<Candidate> = Vec::new();

        for (arrival_order, source) in self.ordered_sources().into_iter().enumerate() {
            let source_id = self.aliases.canonical(source.id());
            debug!("Cascade: fetching {} from {}", symbol, source_id);

            match source.fetch(symbol, options).await {
                Ok(payload) => {
                    let score = self.scoring.score(&source_id, &payload, now);
                    let status = if payload.valid_price().is_some() {
                        AttemptStatus::Success
                    } else if payload.has_enrichment() {
                        AttemptStatus::Partial
                    } else {
                        AttemptStatus::Empty
                    };

                    attempts.push(SourceAttempt {
                        source_id: source_id.clone(),
                        status,
                        score: Some(score),
                        error: None,
                    });

                    if status != AttemptStatus::Empty {
                        candidates.push(Candidate {
                            source_id,
                            payload,
                            score,
                            arrival_order,
                        });
                    }
                }
                Err(error) => {
                    warn!("Cascade source {} failed for {}: {}", source_id, symbol, error);
                    attempts.push(SourceAttempt {
                        source_id,
                        status: AttemptStatus::Error,
                        score: None,
                        error: Some(error.to_string()),
                    });
                }
            }
        }

        let mut ranked: Vec<&Candidate> = candidates.iter().collect();
        ranked.sort_by(|a, b| b.ranking_cmp(a));

        let selected = ranked.iter().copied().find(|c| c.valid_price().is_some());

        // Heavy fundamental blocks are carried from the selected base only,
        // or from the best enrichment source when nothing was priced.
        let heavy_allowed = selected.map(|c| c.arrival_order).or_else(|| {
            ranked
                .iter()
                .copied()
                .find(|c| c.payload.has_enrichment())
                .map(|c| c.arrival_order)
        });

        let merged = merge_enrichment(&ranked, heavy_allowed);

        match selected {
            Some(best) => {
                info!(
                    "Cascade selected {} for {} (total score {:.1}, {} attempt(s))",
                    best.source_id,
                    symbol,
                    best.score.total,
                    attempts.len()
                );
                ReconciledPayload {
                    data_source: best.source_id.clone(),
                    is_scraped: best.payload.is_scraped,
                    quote: best.payload.quote.clone(),
                    fundamentals: merged.fundamentals,
                    historical: merged.historical,
                    attempts,
                    fetched_at: now,
                }
            }
            None => {
                warn!(
                    "Cascade could not price {} ({} attempt(s)); reporting unavailable",
                    symbol,
                    attempts.len()
                );
                ReconciledPayload {
                    data_source: UNAVAILABLE_SOURCE.to_string(),
                    is_scraped: false,
                    quote: QuoteBlock::default(),
                    fundamentals: merged.fundamentals,
                    historical: merged.historical,
                    attempts,
                    fetched_at: now,
                }
            }
        }
    }

    /// Probe every scraper-type source and aggregate the results.
    pub async fn health_check(&self) -> CascadeHealth {
        let mut sources = Vec::new();

        for source in &self.sources {
            if source.kind() != SourceKind::Scraper {
                continue;
            }
            let status = source.health_check().await;
            sources.push(SourceHealth {
                source_id: self.aliases.canonical(source.id()),
                status,
            });
        }

        CascadeHealth {
            ok: sources.iter().all(|s| s.status.ok),
            checked_at: Utc::now(),
            sources,
        }
    }

    /// Cascade invocation order: structured feeds in configured order, then
    /// scrapers in configured order.
    fn ordered_sources(&self) -> Vec<&Arc<dyn MarketDataSource>> {
        let mut ordered: Vec<_> = self
            .sources
            .iter()
            .filter(|s| s.kind() == SourceKind::StructuredFeed)
            .collect();
        ordered.extend(self.sources.iter().filter(|s| s.kind() == SourceKind::Scraper));
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceError;
    use crate::models::NormalizedPayload;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;

    struct MockSource {
        id: &'static str,
        kind: SourceKind,
        payload: Option<NormalizedPayload>,
        fail_message: Option<&'static str>,
        healthy: bool,
    }

    impl MockSource {
        fn ok(id: &'static str, kind: SourceKind, payload: NormalizedPayload) -> Self {
            Self {
                id,
                kind,
                payload: Some(payload),
                fail_message: None,
                healthy: true,
            }
        }

        fn failing(id: &'static str, kind: SourceKind, message: &'static str) -> Self {
            Self {
                id,
                kind,
                payload: None,
                fail_message: Some(message),
                healthy: false,
            }
        }
    }

    #[async_trait]
    impl MarketDataSource for MockSource {
        fn id(&self) -> &'static str {
            self.id
        }

        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn fetch(
            &self,
            _symbol: &str,
            _options: &FetchOptions,
        ) -> Result<NormalizedPayload, SourceError> {
            match (&self.payload, self.fail_message) {
                (Some(payload), _) => Ok(payload.clone()),
                (None, Some(message)) => Err(SourceError::Unreachable {
                    source_id: self.id.to_string(),
                    message: message.to_string(),
                }),
                (None, None) => unreachable!("mock configured without payload or error"),
            }
        }

        async fn health_check(&self) -> HealthStatus {
            if self.healthy {
                HealthStatus::ok()
            } else {
                HealthStatus::degraded("markup changed")
            }
        }
    }

    fn priced(source: &str, scraped: bool, price: Decimal) -> NormalizedPayload {
        let mut payload = NormalizedPayload::empty(source, scraped);
        payload.quote.current_price = Some(price);
        payload
    }

    #[tokio::test]
    async fn test_fresher_trusted_scraper_wins_over_structured_feed() {
        // Structured feed at trust 76 returns 10.1; a fresher scraper at
        // trust 86 returns 10.2. The scraper's price must win.
        let now = Utc::now();

        let mut feed_payload = priced("hgbrasil", false, dec!(10.1));
        feed_payload.quote.observed_at = Some(now - chrono::Duration::hours(20));

        let mut scraper_payload = priced("statusinvest", true, dec!(10.2));
        scraper_payload.quote.observed_at = Some(now - chrono::Duration::minutes(5));

        let manager = FallbackManager::new(vec![
            Arc::new(MockSource::ok("hgbrasil", SourceKind::StructuredFeed, feed_payload)),
            Arc::new(MockSource::ok("statusinvest", SourceKind::Scraper, scraper_payload)),
        ]);

        let result = manager.reconcile("PETR4.SA", &FetchOptions::default()).await;

        assert_eq!(result.data_source, "STATUSINVEST");
        assert_eq!(result.quote.current_price, Some(dec!(10.2)));
        assert!(result.is_scraped);
    }

    #[tokio::test]
    async fn test_cascade_survives_individual_failures() {
        let manager = FallbackManager::new(vec![
            Arc::new(MockSource::failing("brapi", SourceKind::StructuredFeed, "HTTP 500")),
            Arc::new(MockSource::ok(
                "statusinvest",
                SourceKind::Scraper,
                priced("statusinvest", true, dec!(8.4)),
            )),
        ]);

        let result = manager.reconcile("VALE3.SA", &FetchOptions::default()).await;

        assert_eq!(result.data_source, "STATUSINVEST");
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.attempts[0].status, AttemptStatus::Error);
        assert!(result.attempts[0].error.as_ref().unwrap().contains("HTTP 500"));
        assert_eq!(result.attempts[1].status, AttemptStatus::Success);
    }

    #[tokio::test]
    async fn test_all_sources_failing_degrades_to_unavailable() {
        let manager = FallbackManager::new(vec![
            Arc::new(MockSource::failing("brapi", SourceKind::StructuredFeed, "down")),
            Arc::new(MockSource::failing("statusinvest", SourceKind::Scraper, "down")),
        ]);

        let result = manager.reconcile("XXXX4.SA", &FetchOptions::default()).await;

        assert_eq!(result.data_source, UNAVAILABLE_SOURCE);
        assert_eq!(result.quote.current_price, None);
        assert!(!result.is_priced());
        assert_eq!(result.attempts.len(), 2);
        assert!(result
            .attempts
            .iter()
            .all(|a| a.status == AttemptStatus::Error));
    }

    #[tokio::test]
    async fn test_unpriced_enrichment_is_preserved_when_unavailable() {
        let mut enrichment_only = NormalizedPayload::empty("fundamentus", true);
        enrichment_only
            .fundamentals
            .insert("peRatio".to_string(), json!(7.3));

        let manager = FallbackManager::new(vec![
            Arc::new(MockSource::failing("brapi", SourceKind::StructuredFeed, "down")),
            Arc::new(MockSource::ok("fundamentus", SourceKind::Scraper, enrichment_only)),
        ]);

        let result = manager.reconcile("BBAS3.SA", &FetchOptions::default()).await;

        assert_eq!(result.data_source, UNAVAILABLE_SOURCE);
        assert_eq!(result.quote.current_price, None);
        assert_eq!(result.fundamentals["peRatio"], json!(7.3));
        assert_eq!(result.attempts[1].status, AttemptStatus::Partial);
    }

    #[tokio::test]
    async fn test_zero_priced_candidate_is_never_selected() {
        let manager = FallbackManager::new(vec![Arc::new(MockSource::ok(
            "brapi",
            SourceKind::StructuredFeed,
            priced("brapi", false, Decimal::ZERO),
        ))]);

        let result = manager.reconcile("PETR4.SA", &FetchOptions::default()).await;
        assert_eq!(result.data_source, UNAVAILABLE_SOURCE);
    }

    #[tokio::test]
    async fn test_full_tie_breaks_by_arrival_order() {
        // Two unknown sources with identical payloads and identical trust:
        // the one invoked first must win, deterministically.
        let payload_a = priced("first_source", false, dec!(5.0));
        let payload_b = priced("second_source", false, dec!(6.0));

        let manager = FallbackManager::new(vec![
            Arc::new(MockSource::ok("first_source", SourceKind::StructuredFeed, payload_a)),
            Arc::new(MockSource::ok("second_source", SourceKind::StructuredFeed, payload_b)),
        ]);

        let result = manager.reconcile("TIED4.SA", &FetchOptions::default()).await;
        assert_eq!(result.data_source, "first_source");
        assert_eq!(result.quote.current_price, Some(dec!(5.0)));
    }

    #[tokio::test]
    async fn test_feeds_invoked_before_scrapers() {
        // A scraper listed first is still invoked after the feed; arrival
        // order in the trace reflects the cascade order.
        let manager = FallbackManager::new(vec![
            Arc::new(MockSource::ok(
                "statusinvest",
                SourceKind::Scraper,
                priced("statusinvest", true, dec!(10.0)),
            )),
            Arc::new(MockSource::ok(
                "brapi",
                SourceKind::StructuredFeed,
                priced("brapi", false, dec!(10.0)),
            )),
        ]);

        let result = manager.reconcile("PETR4.SA", &FetchOptions::default()).await;
        assert_eq!(result.attempts[0].source_id, "BRAPI");
        assert_eq!(result.attempts[1].source_id, "STATUSINVEST");
    }

    #[tokio::test]
    async fn test_selected_source_quote_block_is_kept_whole() {
        let mut best = priced("brapi", false, dec!(10.0));
        best.quote.previous_close = Some(dec!(9.8));
        best.quote.currency = Some("BRL".to_string());

        let manager = FallbackManager::new(vec![Arc::new(MockSource::ok(
            "brapi",
            SourceKind::StructuredFeed,
            best,
        ))]);

        let result = manager.reconcile("PETR4.SA", &FetchOptions::default()).await;
        assert_eq!(result.quote.previous_close, Some(dec!(9.8)));
        assert_eq!(result.quote.currency.as_deref(), Some("BRL"));
    }

    #[tokio::test]
    async fn test_health_check_probes_only_scrapers_and_aggregates() {
        let manager = FallbackManager::new(vec![
            Arc::new(MockSource::failing("brapi", SourceKind::StructuredFeed, "down")),
            Arc::new(MockSource::ok(
                "statusinvest",
                SourceKind::Scraper,
                priced("statusinvest", true, dec!(1.0)),
            )),
            Arc::new(MockSource::failing("fundamentus", SourceKind::Scraper, "down")),
        ]);

        let health = manager.health_check().await;

        // The failing feed is not probed; the failing scraper degrades the
        // aggregate.
        assert_eq!(health.sources.len(), 2);
        assert!(!health.ok);
        assert!(health.sources.iter().any(|s| s.source_id == "STATUSINVEST" && s.status.ok));
        assert!(health.sources.iter().any(|s| s.source_id == "FUNDAMENTUS" && !s.status.ok));
    }
}
