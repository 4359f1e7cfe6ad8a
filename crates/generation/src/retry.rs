//! Bounded retry with backoff for completion calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::completion::{CompletionClient, CompletionRequest, GenerationError};

/// How the pause between retries grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same pause before every retry.
    Fixed,
    /// Pause doubles with each retry, capped at `max_delay`.
    #[default]
    Exponential,
}

/// Retry policy for transient completion failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first call (0 = call once).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Call once, never retry.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Pause before the given retry (1-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor).min(self.max_delay)
            }
        }
    }

    /// Sum of every pause a fully exhausted retry loop sleeps through.
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_retries)
            .map(|retry| self.delay_for_retry(retry))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }
}

/// Run a completion call with a per-call timeout, retrying transient failures.
///
/// Runs at most `1 + policy.max_retries` calls. Non-transient errors are
/// returned immediately.
pub async fn complete_with_retry<C>(
    client: &C,
    request: &CompletionRequest,
    policy: &RetryPolicy,
    timeout: Duration,
) -> Result<String, GenerationError>
where
    C: CompletionClient + ?Sized,
{
    let mut retries_done = 0;

    loop {
        let outcome = match tokio::time::timeout(timeout, client.complete(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(GenerationError::Timeout(timeout)),
        };

        match outcome {
            Ok(text) => {
                debug!(retries = retries_done, "completion succeeded");
                return Ok(text);
            }
            Err(err) if err.is_transient() && policy.should_retry(retries_done) => {
                retries_done += 1;
                let delay = policy.delay_for_retry(retries_done);
                warn!(
                    error = %err,
                    retry = retries_done,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "transient completion failure; retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
