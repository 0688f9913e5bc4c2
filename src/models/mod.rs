//! Data model for the market data engine.
//!
//! - [`NormalizedPayload`] - the shape every source call produces
//! - [`Candidate`] / [`SourceScore`] / [`SourceAttempt`] - reconciliation-time types
//! - [`Asset`] - read-only input record owned by the CRUD layer

mod asset;
mod candidate;
mod payload;

pub use asset::Asset;
pub use candidate::{AttemptStatus, Candidate, SourceAttempt, SourceScore};
pub use payload::{DividendRow, HistoricalBlock, HistoryRow, NormalizedPayload, QuoteBlock};
