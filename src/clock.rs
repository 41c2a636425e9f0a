use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Time source used by the rate limiter and retry policy.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock: `sleep` advances time instantly and is recorded.
#[derive(Debug)]
pub struct ManualClock {
    inner: Mutex<ManualState>,
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ManualState {
                now: Instant::now(),
                sleeps: Vec::new(),
            }),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.now += by;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.sleeps.clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().into_iter().sum()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.now
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.now += duration;
        state.sleeps.push(duration);
    }
}
