//! Error types and retry classification for the market data engine.
//!
//! This module provides:
//! - [`SourceError`]: the error enum for all source fetch operations
//! - [`RetryClass`]: classification for determining retry behavior
//! - [`StoreError`]: failures from the persistence contract

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while fetching from a market data source.
///
/// The taxonomy has two categories. Availability errors (`Unreachable`,
/// `BadStatus`, `Timeout`, `NotConfigured`, `Exhausted`) mean the source could
/// not be used at all. `Incomplete` means the source answered but the payload
/// is missing a mandatory field. Sources must surface hard failures as one of
/// these variants - never as an empty payload.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The source could not be reached at the transport level.
    #[error("Source unreachable: {source_id} - {message}")]
    Unreachable {
        /// The source that failed
        source_id: String,
        /// Underlying transport error description
        message: String,
    },

    /// The source answered with a non-success HTTP status.
    #[error("Source {source_id} returned HTTP {status}")]
    BadStatus {
        /// The source that failed
        source_id: String,
        /// The HTTP status code received
        status: u16,
    },

    /// The request to the source timed out.
    #[error("Timeout: {source_id}")]
    Timeout {
        /// The source that timed out
        source_id: String,
    },

    /// No source is configured for the requested operation.
    #[error("No source configured: {0}")]
    NotConfigured(String),

    /// Every endpoint of a multi-endpoint source was tried and all failed.
    /// Carries the error from each attempt for diagnostics.
    #[error("All endpoints failed for {source_id} ({} attempts)", .attempts.len())]
    Exhausted {
        /// The source that ran out of endpoints
        source_id: String,
        /// One description per failed attempt, in attempt order
        attempts: Vec<String>,
    },

    /// The source answered but a mandatory field is missing.
    #[error("Incomplete data from {source_id}: missing {missing}")]
    Incomplete {
        /// The source that returned incomplete data
        source_id: String,
        /// The mandatory field that was absent
        missing: String,
    },
}

impl SourceError {
    /// Returns the retry classification for this error.
    ///
    /// Transport-level failures retry with backoff; content-level
    /// incompleteness never retries in place.
    ///
    /// # Examples
    ///
    /// ```
    /// use carteira_market_data::errors::{RetryClass, SourceError};
    ///
    /// let error = SourceError::Timeout { source_id: "YFINANCE".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = SourceError::Incomplete {
    ///     source_id: "YFINANCE".to_string(),
    ///     missing: "currentPrice".to_string(),
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Unreachable { .. } | Self::BadStatus { .. } | Self::Timeout { .. } => {
                RetryClass::WithBackoff
            }
            // Exhausted already consumed its own retry budget per endpoint.
            Self::NotConfigured(_) | Self::Exhausted { .. } | Self::Incomplete { .. } => {
                RetryClass::Never
            }
        }
    }

    /// True for availability-category errors, false for `Incomplete`.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, Self::Incomplete { .. })
    }

    /// The source id this error originated from, when known.
    pub fn source_id(&self) -> Option<&str> {
        match self {
            Self::Unreachable { source_id, .. }
            | Self::BadStatus { source_id, .. }
            | Self::Timeout { source_id }
            | Self::Exhausted { source_id, .. }
            | Self::Incomplete { source_id, .. } => Some(source_id),
            Self::NotConfigured(_) => None,
        }
    }
}

/// Errors from the persistence contract.
///
/// These never cross the `refresh_one` boundary; the service converts them
/// into failed refresh outcomes.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store rejected or failed the write.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// A record with the same key already exists and the record is immutable.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backing store could not be queried.
    #[error("Query failed: {0}")]
    QueryFailed(String),
}
