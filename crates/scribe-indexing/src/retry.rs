//! Bounded exponential backoff for engine writes.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use tracing::{debug, warn};

use scribe_types::RetrySettings;

use crate::error::IndexingError;

/// Retry limits for a single engine call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_retries.max(1),
            initial_interval: Duration::from_millis(settings.initial_interval_ms),
            max_interval: Duration::from_millis(settings.max_interval_ms),
            max_elapsed: Duration::from_millis(settings.max_elapsed_ms),
        }
    }

    /// Single attempt, no sleeping.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            max_elapsed: Duration::ZERO,
        }
    }

    /// Fast policy for tests: several attempts with millisecond delays.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(2),
            max_elapsed: Duration::from_secs(1),
        }
    }

    /// Run `attempt` until it returns an accepted value, an attempt limit is
    /// hit, or the backoff is exhausted.
    ///
    /// Errors and values rejected by `accept` are both retried. The last
    /// outcome is returned when retries run out.
    pub async fn run<T, F, Fut>(
        &self,
        engine: &str,
        operation: &str,
        accept: fn(&T) -> bool,
        mut attempt: F,
    ) -> Result<T, IndexingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexingError>>,
    {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build();

        let mut attempts = 0;

        loop {
            attempts += 1;
            let outcome = attempt().await;

            let reason = match &outcome {
                Ok(value) if accept(value) => return outcome,
                Ok(_) => "rejected".to_string(),
                Err(e) => e.to_string(),
            };

            if attempts >= self.max_attempts {
                debug!(engine, operation, attempts, "Retries exhausted");
                return outcome;
            }

            match backoff.next_backoff() {
                Some(duration) => {
                    warn!(
                        engine,
                        operation,
                        attempt = attempts,
                        reason = %reason,
                        retry_in_ms = duration.as_millis() as u64,
                        "Engine call failed, retrying"
                    );
                    tokio::time::sleep(duration).await;
                }
                None => {
                    debug!(engine, operation, attempts, "Backoff exhausted");
                    return outcome;
                }
            }
        }
    }
}
