use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::payload::NormalizedPayload;

/// Score computed for one source response.
///
/// `total = trust_weight + freshness + completeness`. All three components
/// are kept for tie-breaking and for the audit trace.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceScore {
    /// Static per-source priority
    pub trust_weight: f64,
    /// Banded contribution from the age of the best observation timestamp
    pub freshness: f64,
    /// Contribution from how many useful fields the payload carries
    pub completeness: f64,
    /// Sum of the three components
    pub total: f64,
    /// The observation timestamp the freshness band was computed from
    pub observed_at: DateTime<Utc>,
}

/// One source response under consideration during reconciliation.
///
/// Candidates exist only inside a single reconciliation and are discarded
/// after selection and merge.
#[derive(Clone, Debug)]
pub struct Candidate {
    /// Canonical source id (after alias resolution)
    pub source_id: String,
    pub payload: NormalizedPayload,
    pub score: SourceScore,
    /// Position in the cascade invocation order; final tie-break
    pub arrival_order: usize,
}

impl Candidate {
    /// Usable price, if any.
    pub fn valid_price(&self) -> Option<Decimal> {
        self.payload.valid_price()
    }

    /// Ranking comparison: total score, then trust weight, then freshness,
    /// then earliest arrival. Deterministic for any input order.
    pub fn ranking_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .total
            .total_cmp(&other.score.total)
            .then(self.score.trust_weight.total_cmp(&other.score.trust_weight))
            .then(self.score.freshness.total_cmp(&other.score.freshness))
            .then(other.arrival_order.cmp(&self.arrival_order))
    }
}

/// Outcome classification of one cascade attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    /// Usable price obtained
    Success,
    /// No usable price, but enrichment obtained
    Partial,
    /// Response carried nothing usable
    Empty,
    /// The source call failed
    Error,
}

/// Trace entry for one cascade attempt. Observability only; never consulted
/// by control flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAttempt {
    pub source_id: String,
    pub status: AttemptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<SourceScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payload::NormalizedPayload;

    fn candidate(total: f64, trust: f64, freshness: f64, order: usize) -> Candidate {
        Candidate {
            source_id: format!("S{}", order),
            payload: NormalizedPayload::empty("S", false),
            score: SourceScore {
                trust_weight: trust,
                freshness,
                completeness: total - trust - freshness,
                total,
                observed_at: Utc::now(),
            },
            arrival_order: order,
        }
    }

    #[test]
    fn test_ranking_by_total_score() {
        let a = candidate(90.0, 50.0, 20.0, 0);
        let b = candidate(95.0, 40.0, 20.0, 1);
        assert_eq!(a.ranking_cmp(&b), std::cmp::Ordering::Less);
    }

    #[test]
    fn test_ranking_tie_broken_by_trust_then_freshness() {
        let a = candidate(90.0, 50.0, 20.0, 0);
        let b = candidate(90.0, 60.0, 10.0, 1);
        assert_eq!(a.ranking_cmp(&b), std::cmp::Ordering::Less);

        let c = candidate(90.0, 50.0, 25.0, 2);
        assert_eq!(a.ranking_cmp(&c), std::cmp::Ordering::Less);
    }

    #[test]
    fn test_full_tie_prefers_earlier_arrival() {
        let a = candidate(90.0, 50.0, 20.0, 0);
        let b = candidate(90.0, 50.0, 20.0, 3);
        // Earlier arrival ranks greater, so max_by picks it.
        assert_eq!(a.ranking_cmp(&b), std::cmp::Ordering::Greater);
    }
}
