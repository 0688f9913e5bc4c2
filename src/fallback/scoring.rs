//! Candidate scoring: trust, freshness, completeness.
//!
//! The numeric constants are hand-tuned and live in [`ScoringConfig`] so a
//! deployment (or a test) can inject its own table without touching global
//! state. The tiered shape is what matters: authoritative feed > live API >
//! structured third-party > scraped third-party for trust, and banded decay
//! by observation age for freshness.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::models::{NormalizedPayload, SourceScore};

/// One freshness band: observations no older than `max_age` score `score`.
#[derive(Clone, Debug)]
pub struct FreshnessBand {
    pub max_age: Duration,
    pub score: f64,
}

/// Freshness scoring bands, checked in order.
#[derive(Clone, Debug)]
pub struct FreshnessBands {
    /// Clock skew tolerated before data counts as future-dated
    pub future_tolerance: Duration,
    /// Score for implausibly future-dated observations
    pub future_penalty: f64,
    /// Age bands, ascending by `max_age`
    pub bands: Vec<FreshnessBand>,
    /// Score for observations older than every band
    pub stale_penalty: f64,
}

impl Default for FreshnessBands {
    fn default() -> Self {
        Self {
            future_tolerance: Duration::minutes(5),
            future_penalty: -10.0,
            bands: vec![
                FreshnessBand { max_age: Duration::minutes(15), score: 30.0 },
                FreshnessBand { max_age: Duration::hours(1), score: 25.0 },
                FreshnessBand { max_age: Duration::hours(24), score: 18.0 },
                FreshnessBand { max_age: Duration::days(7), score: 10.0 },
                FreshnessBand { max_age: Duration::days(30), score: 2.0 },
            ],
            stale_penalty: -15.0,
        }
    }
}

/// Weights for the completeness component.
#[derive(Clone, Debug)]
pub struct CompletenessWeights {
    pub price_present: f64,
    /// Applied when the payload carries no usable price
    pub price_missing_penalty: f64,
    /// Per populated secondary quote field
    pub secondary_field: f64,
    /// Per populated fundamentals key, up to `fundamentals_cap`
    pub fundamentals_key: f64,
    pub fundamentals_cap: f64,
    /// Log-scale factor for history row count, capped at `history_cap`
    pub history_factor: f64,
    pub history_cap: f64,
    /// Log-scale factor for dividend row count, capped at `dividends_cap`
    pub dividends_factor: f64,
    pub dividends_cap: f64,
    /// Small bonus for non-scraped sources
    pub structured_bonus: f64,
}

impl Default for CompletenessWeights {
    fn default() -> Self {
        Self {
            price_present: 40.0,
            price_missing_penalty: -40.0,
            secondary_field: 2.0,
            fundamentals_key: 1.0,
            fundamentals_cap: 12.0,
            history_factor: 2.0,
            history_cap: 8.0,
            dividends_factor: 1.5,
            dividends_cap: 4.0,
            structured_bonus: 3.0,
        }
    }
}

/// Scoring configuration: the static trust table plus the freshness and
/// completeness shapes. Injected per FallbackManager instance.
#[derive(Clone, Debug)]
pub struct ScoringConfig {
    pub trust_weights: HashMap<String, f64>,
    /// Trust weight for sources without a table entry
    pub default_trust: f64,
    pub freshness: FreshnessBands,
    pub completeness: CompletenessWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let entries: &[(&str, f64)] = &[
            // Authoritative feed for its own instrument class
            ("TESOURO_DIRETO", 95.0),
            // Live API
            ("YFINANCE", 90.0),
            // Structured third-party feeds
            ("BRAPI", 80.0),
            ("HGBRASIL", 76.0),
            // Scraped third-party pages
            ("STATUSINVEST", 86.0),
            ("FUNDAMENTUS", 70.0),
            ("GOOGLEFINANCE", 65.0),
        ];

        Self {
            trust_weights: entries
                .iter()
                .map(|(id, weight)| (id.to_string(), *weight))
                .collect(),
            default_trust: 50.0,
            freshness: FreshnessBands::default(),
            completeness: CompletenessWeights::default(),
        }
    }
}

impl ScoringConfig {
    pub fn trust_weight(&self, source_id: &str) -> f64 {
        self.trust_weights
            .get(source_id)
            .copied()
            .unwrap_or(self.default_trust)
    }

    /// Banded freshness of an observation timestamp relative to `now`.
    pub fn freshness(&self, observed_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age = now.signed_duration_since(observed_at);

        if age < -self.freshness.future_tolerance {
            return self.freshness.future_penalty;
        }
        for band in &self.freshness.bands {
            if age <= band.max_age {
                return band.score;
            }
        }
        self.freshness.stale_penalty
    }

    /// Completeness of a payload: price dominates, then secondary fields,
    /// fundamentals breadth, history depth, and the structured bonus.
    pub fn completeness(&self, payload: &NormalizedPayload) -> f64 {
        let weights = &self.completeness;
        let mut score = if payload.valid_price().is_some() {
            weights.price_present
        } else {
            weights.price_missing_penalty
        };

        score += payload.quote.secondary_field_count() as f64 * weights.secondary_field;

        let fundamentals_keys = payload
            .fundamentals
            .values()
            .filter(|value| !value.is_null())
            .count();
        score += (fundamentals_keys as f64 * weights.fundamentals_key).min(weights.fundamentals_cap);

        let history_rows = payload.historical.history.len();
        if history_rows > 0 {
            score += ((1.0 + history_rows as f64).ln() * weights.history_factor)
                .min(weights.history_cap);
        }

        let dividend_rows = payload.historical.dividends.len();
        if dividend_rows > 0 {
            score += ((1.0 + dividend_rows as f64).ln() * weights.dividends_factor)
                .min(weights.dividends_cap);
        }

        if !payload.is_scraped {
            score += weights.structured_bonus;
        }

        score
    }

    /// Full score for one canonicalized source response.
    pub fn score(
        &self,
        source_id: &str,
        payload: &NormalizedPayload,
        now: DateTime<Utc>,
    ) -> SourceScore {
        let observed_at = payload.observation_time();
        let trust_weight = self.trust_weight(source_id);
        let freshness = self.freshness(observed_at, now);
        let completeness = self.completeness(payload);

        SourceScore {
            trust_weight,
            freshness,
            completeness,
            total: trust_weight + freshness + completeness,
            observed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NormalizedPayload;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn priced_payload(source: &str, scraped: bool) -> NormalizedPayload {
        let mut payload = NormalizedPayload::empty(source, scraped);
        payload.quote.current_price = Some(dec!(10.0));
        payload
    }

    #[test]
    fn test_trust_weight_lookup_with_default() {
        let config = ScoringConfig::default();
        assert_eq!(config.trust_weight("TESOURO_DIRETO"), 95.0);
        assert_eq!(config.trust_weight("UNKNOWN_SOURCE"), 50.0);
    }

    #[test]
    fn test_freshness_bands() {
        let config = ScoringConfig::default();
        let now = Utc::now();

        assert_eq!(config.freshness(now - Duration::minutes(2), now), 30.0);
        assert_eq!(config.freshness(now - Duration::minutes(45), now), 25.0);
        assert_eq!(config.freshness(now - Duration::hours(10), now), 18.0);
        assert_eq!(config.freshness(now - Duration::days(3), now), 10.0);
        assert_eq!(config.freshness(now - Duration::days(20), now), 2.0);
    }

    #[test]
    fn test_freshness_penalizes_stale_and_future() {
        let config = ScoringConfig::default();
        let now = Utc::now();

        assert_eq!(config.freshness(now - Duration::days(90), now), -15.0);
        assert_eq!(config.freshness(now + Duration::hours(2), now), -10.0);
        // Small clock skew is tolerated as near-real-time.
        assert_eq!(config.freshness(now + Duration::minutes(2), now), 30.0);
    }

    #[test]
    fn test_completeness_price_dominates() {
        let config = ScoringConfig::default();

        let priced = priced_payload("X", false);
        let mut unpriced = NormalizedPayload::empty("X", false);
        unpriced
            .fundamentals
            .insert("peRatio".to_string(), json!(12.1));

        assert!(config.completeness(&priced) > config.completeness(&unpriced));
        assert!(config.completeness(&unpriced) < 0.0);
    }

    #[test]
    fn test_completeness_fundamentals_capped() {
        let config = ScoringConfig::default();

        let mut few = priced_payload("X", false);
        for i in 0..3 {
            few.fundamentals.insert(format!("k{}", i), json!(i));
        }

        let mut many = priced_payload("X", false);
        for i in 0..50 {
            many.fundamentals.insert(format!("k{}", i), json!(i));
        }

        let delta = config.completeness(&many) - config.completeness(&few);
        assert!(delta <= config.completeness.fundamentals_cap);
    }

    #[test]
    fn test_completeness_null_fundamentals_do_not_count() {
        let config = ScoringConfig::default();

        let mut with_nulls = priced_payload("X", false);
        with_nulls.fundamentals.insert("a".to_string(), json!(null));
        with_nulls.fundamentals.insert("b".to_string(), json!(null));

        assert_eq!(
            config.completeness(&with_nulls),
            config.completeness(&priced_payload("X", false))
        );
    }

    #[test]
    fn test_structured_bonus() {
        let config = ScoringConfig::default();

        let feed = priced_payload("X", false);
        let scraper = priced_payload("X", true);
        assert_eq!(
            config.completeness(&feed) - config.completeness(&scraper),
            config.completeness.structured_bonus
        );
    }

    #[test]
    fn test_fresher_trusted_scraper_outscores_structured_feed() {
        // A structured feed at weight 76 loses to a fresher scraper at
        // weight 86.
        let config = ScoringConfig::default();
        let now = Utc::now();

        let mut feed = priced_payload("HGBRASIL", false);
        feed.quote.observed_at = Some(now - Duration::hours(20));
        let feed_score = config.score("HGBRASIL", &feed, now);

        let mut scraper = priced_payload("STATUSINVEST", true);
        scraper.quote.observed_at = Some(now - Duration::minutes(5));
        let scraper_score = config.score("STATUSINVEST", &scraper, now);

        assert_eq!(feed_score.trust_weight, 76.0);
        assert_eq!(scraper_score.trust_weight, 86.0);
        assert!(scraper_score.total > feed_score.total);
    }
}
