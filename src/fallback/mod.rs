//! Alternative-source cascade: scoring, selection, and merge.
//!
//! This module provides:
//! - [`FallbackManager`] - runs the cascade and reconciles responses
//! - [`ScoringConfig`] - injectable trust/freshness/completeness tables
//! - [`SourceAliases`] - canonical source-id resolution
//! - the scoped enrichment merge

mod aliases;
mod manager;
mod merge;
mod scoring;

pub use aliases::SourceAliases;
pub use manager::{
    CascadeHealth, FallbackManager, ReconciledPayload, SourceHealth, UNAVAILABLE_SOURCE,
};
pub use merge::{is_heavy_key, merge_enrichment, MergedEnrichment, HEAVY_FUNDAMENTAL_KEYS};
pub use scoring::{CompletenessWeights, FreshnessBand, FreshnessBands, ScoringConfig};
