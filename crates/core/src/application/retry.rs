// Retry logic
use crate::domain::Job;
use crate::port::TimeProvider;
use std::sync::Arc;
use tracing::{info, warn};

/// Default base delay for the first retry (2s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: i64 = 2000;

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the job (with backoff delay in ms)
    Retry(i64),
    /// Attempt budget spent
    DeadLetter,
}

/// Exponential backoff retry policy
///
/// Determines if a job should be retried based on:
/// - Attempts already made (counted when the job was claimed)
/// - Maximum attempts allowed
/// - Backoff factor for exponential delay
pub struct RetryPolicy {
    time_provider: Arc<dyn TimeProvider>,
    base_delay_ms: i64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for current time
    /// * `base_delay_ms` - Delay before the first retry
    pub fn new(time_provider: Arc<dyn TimeProvider>, base_delay_ms: i64) -> Self {
        Self {
            time_provider,
            base_delay_ms,
        }
    }

    /// Decide what happens after a failed attempt
    ///
    /// Backoff formula: `delay = base_delay * backoff_factor ^ (attempts - 1)`,
    /// so with the defaults the retries wait 2s then 4s.
    pub fn should_retry(&self, job: &Job) -> RetryDecision {
        if !job.has_attempts_left() {
            warn!(
                job_id = %job.id,
                attempts = %job.attempts,
                max_attempts = %job.max_attempts,
                "Max retry attempts reached"
            );
            return RetryDecision::DeadLetter;
        }

        let exponent = (job.attempts - 1).max(0);
        let delay_ms = (self.base_delay_ms as f64 * job.backoff_factor.powi(exponent)) as i64;

        info!(
            job_id = %job.id,
            attempt = %job.attempts,
            max_attempts = %job.max_attempts,
            delay_ms = %delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }

    /// Record a failed attempt on `job`: requeue with backoff or dead-letter
    pub fn apply_failure(&self, job: &mut Job, error: &str) -> RetryDecision {
        let now = self.time_provider.now_millis();
        let decision = self.should_retry(job);
        match decision {
            RetryDecision::Retry(delay_ms) => job.requeue(now + delay_ms, error),
            RetryDecision::DeadLetter => job.dead_letter(now, error),
        }
        decision
    }
}
