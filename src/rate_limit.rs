use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::clock::Clock;

/// Sliding-log limiter: at most `max_calls` calls in any trailing `period`.
///
/// Not internally synchronised; `CachingFetchClient` keeps it behind the same
/// lock as its team cache. Slots are reserved under the lock and slept on
/// outside it, so concurrent waiters are staggered rather than stampeding.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    calls: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, period: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            period,
            calls: VecDeque::new(),
        }
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Claims the next free slot and returns how long the caller must wait
    /// before using it (zero when under budget). Callers holding a shared lock
    /// reserve under it and sleep after releasing it.
    pub fn reserve(&mut self, now: Instant) -> Duration {
        while let Some(&oldest) = self.calls.front() {
            if now.saturating_duration_since(oldest) >= self.period {
                self.calls.pop_front();
            } else {
                break;
            }
        }

        let mut slot = if self.calls.len() < self.max_calls {
            now
        } else {
            self.calls[self.calls.len() - self.max_calls] + self.period
        };
        if let Some(&last) = self.calls.back() {
            slot = slot.max(last);
        }
        slot = slot.max(now);

        self.calls.push_back(slot);
        let wait = slot.saturating_duration_since(now);
        if !wait.is_zero() {
            warn!(
                sleep_secs = wait.as_secs_f64(),
                max_calls = self.max_calls,
                period_secs = self.period.as_secs(),
                "rate limit reached, sleeping"
            );
        }
        wait
    }

    /// Blocks on `clock` until a call is allowed. Returns the time slept.
    pub fn wait_if_needed(&mut self, clock: &dyn Clock) -> Duration {
        let wait = self.reserve(clock.now());
        if !wait.is_zero() {
            clock.sleep(wait);
        }
        wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn full_budget_passes_without_sleeping() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(150, Duration::from_secs(60));
        for _ in 0..150 {
            assert_eq!(limiter.wait_if_needed(&clock), Duration::ZERO);
        }
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn call_over_budget_waits_for_oldest_to_leave_window() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(150, Duration::from_secs(60));
        for _ in 0..150 {
            limiter.wait_if_needed(&clock);
        }
        let slept = limiter.wait_if_needed(&clock);
        assert_eq!(slept, Duration::from_secs(60));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
    }

    #[test]
    fn partial_window_only_waits_the_remainder() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(2, Duration::from_secs(10));
        limiter.wait_if_needed(&clock);
        clock.advance(Duration::from_secs(4));
        limiter.wait_if_needed(&clock);
        let slept = limiter.wait_if_needed(&clock);
        assert_eq!(slept, Duration::from_secs(6));
    }

    #[test]
    fn expired_calls_are_dropped() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(3, Duration::from_secs(5));
        for _ in 0..3 {
            limiter.wait_if_needed(&clock);
        }
        clock.advance(Duration::from_secs(5));
        for _ in 0..3 {
            assert_eq!(limiter.wait_if_needed(&clock), Duration::ZERO);
        }
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn back_to_back_reservations_are_staggered() {
        let clock = ManualClock::new();
        let now = clock.now();
        let mut limiter = RateLimiter::new(1, Duration::from_secs(2));
        assert_eq!(limiter.reserve(now), Duration::ZERO);
        assert_eq!(limiter.reserve(now), Duration::from_secs(2));
        assert_eq!(limiter.reserve(now), Duration::from_secs(4));
    }
}
