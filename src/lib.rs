//! Carteira Market Data Crate
//!
//! Market data acquisition and reconciliation engine for the Carteira
//! portfolio tracker.
//!
//! # Overview
//!
//! Given a financial instrument, the engine obtains a current price plus
//! fundamentals and history from a primary authoritative source. When that
//! source is unavailable or incomplete it fans out to a ranked cascade of
//! alternative sources (structured feeds and HTML scrapers), scores every
//! response, and merges them into one coherent, auditable payload - under
//! concurrency limits that avoid triggering upstream blocking.
//!
//! # Architecture
//!
//! ```text
//! +------------------------+
//! | AssetMarketDataService |  (primary vs. fallback, persistence, batches)
//! +------------------------+
//!        |           \
//!        v            v
//! +--------------+  +--------------------+
//! | primary      |  | ThrottledScheduler |  (FIFO, concurrency + pacing)
//! | adapter      |  +--------------------+
//! +--------------+
//!        | price missing/invalid
//!        v
//! +-----------------+
//! | FallbackManager |  (cascade -> score -> select -> merge)
//! +-----------------+
//!        |
//!        v
//! +-----------------+
//! | N sources       |  (structured feeds, then scrapers)
//! +-----------------+
//! ```
//!
//! # Core Types
//!
//! - [`MarketDataSource`] - fetch contract every source implements
//! - [`NormalizedPayload`] - the shape one source call produces
//! - [`FallbackManager`] / [`ReconciledPayload`] - the cascade and its output
//! - [`AssetMarketDataService`] / [`AssetQuotePayload`] - orchestration and
//!   the downstream payload contract
//! - [`ThrottledScheduler`] - shared FIFO concurrency/pacing gate
//! - [`MarketDataStore`] - persistence contract (snapshots, latest pointer,
//!   asset price fields)
//!
//! Scoring behavior - trust weights, freshness bands, completeness weights -
//! is configuration ([`ScoringConfig`]), injected per [`FallbackManager`] so
//! tests stay hermetic.

pub mod cache;
pub mod errors;
pub mod fallback;
pub mod models;
pub mod resolver;
pub mod scheduler;
pub mod service;
pub mod source;
pub mod store;

// Re-export error types
pub use errors::{RetryClass, SourceError, StoreError};

// Re-export the data model
pub use models::{
    Asset, AttemptStatus, Candidate, DividendRow, HistoricalBlock, HistoryRow, NormalizedPayload,
    QuoteBlock, SourceAttempt, SourceScore,
};

// Re-export resolver functions
pub use resolver::{parse_bond, provider_symbol, resolve_market, BondKind, BondProfile, Market};

// Re-export the source contract and adapters
pub use source::{
    FetchOptions, HealthStatus, MarketDataSource, RetryPolicy, SourceKind, TreasuryEndpoints,
    TreasurySource, YFinanceConfig, YFinanceSource,
};

// Re-export the cascade
pub use fallback::{
    CascadeHealth, FallbackManager, ReconciledPayload, ScoringConfig, SourceAliases, SourceHealth,
    UNAVAILABLE_SOURCE,
};

// Re-export scheduling and caching
pub use cache::{CacheConfig, PayloadCache};
pub use scheduler::{SchedulerConfig, TaskHandle, ThrottledScheduler};

// Re-export persistence types
pub use store::{
    AssetPriceUpdate, LatestPrice, MarketDataStore, MemoryStore, PriceSnapshot,
};

// Re-export the service
pub use service::{
    AssetMarketDataService, AssetQuotePayload, RefreshOptions, RefreshOutcome, RefreshStatus,
    RefreshSummary, ServiceConfig,
};
