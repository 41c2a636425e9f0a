use std::time::Duration;

use tracing::warn;

use crate::clock::Clock;
use crate::error::{FetchError, SourceError};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_SECS: [u64; 3] = [1, 2, 4];

/// Max attempts, backoff schedule and a retryable-error predicate.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Vec<Duration>,
    retryable: fn(&SourceError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            retryable: SourceError::is_transient,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            ..Self::default()
        }
    }

    pub fn with_predicate(mut self, retryable: fn(&SourceError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_retryable(&self, err: &SourceError) -> bool {
        (self.retryable)(err)
    }

    /// Delay slept after failed attempt number `attempt` (1-based). Past the
    /// end of the schedule the last entry repeats.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let idx = attempt.saturating_sub(1) as usize;
        self.backoff
            .get(idx)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempt budget
    /// is spent. `op` receives the 1-based attempt number.
    pub fn execute<T>(
        &self,
        clock: &dyn Clock,
        label: &str,
        mut op: impl FnMut(u32) -> Result<T, SourceError>,
    ) -> Result<T, FetchError> {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if !self.is_retryable(&err) => {
                    return Err(FetchError::Permanent(err));
                }
                Err(err) if attempt >= self.max_attempts => {
                    return Err(FetchError::Transient {
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        op = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "transient fetch failure, backing off"
                    );
                    clock.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}
