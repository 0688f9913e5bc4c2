//! Bounded exponential backoff for transport-level failures.

use std::future::Future;
use std::time::Duration;

use log::debug;

use crate::errors::{RetryClass, SourceError};

/// Retry policy shared by the concrete adapters.
///
/// Only errors classified [`RetryClass::WithBackoff`] are retried; content
/// incompleteness returns immediately. The delay doubles per attempt up to
/// `max_delay`.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget runs out. Returns the last error in the latter cases.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut delay = self.base_delay;
        let attempts = self.max_attempts.max(1);

        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if error.retry_class() != RetryClass::WithBackoff || attempt == attempts {
                        return Err(error);
                    }
                    debug!(
                        "Retrying after {:?} (attempt {}/{}): {}",
                        delay, attempt, attempts, error
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.max_delay);
                }
            }
        }

        // The loop always returns; attempts >= 1 makes this unreachable.
        Err(SourceError::NotConfigured("empty retry budget".to_string()))
    }
}
