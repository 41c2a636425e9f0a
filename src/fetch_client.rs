use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{FetchError, SourceError};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::types::{Fixture, FixtureResult, MatchRecord};

const MAX_FIXTURE_PAGES: u32 = 10;

#[derive(Debug, Clone, Default)]
pub struct FixturePage {
    pub fixtures: Vec<Fixture>,
    pub has_more: bool,
}

/// External sports-data source. Each call is a single network attempt.
pub trait MatchSource: Send + Sync {
    fn list_fixtures(
        &self,
        league_id: u32,
        from: NaiveDate,
        to: NaiveDate,
        page: u32,
    ) -> Result<FixturePage, SourceError>;

    /// Most-recent-first.
    fn list_recent_matches(&self, team_id: u32, limit: usize)
    -> Result<Vec<MatchRecord>, SourceError>;

    fn fetch_result(&self, fixture_id: u64) -> Result<Option<FixtureResult>, SourceError>;
}

struct FetchState {
    limiter: RateLimiter,
    cache: HashMap<u32, Vec<MatchRecord>>,
}

/// Rate-limited, retrying access to a `MatchSource` with a per-run cache of
/// team histories. The limiter log and the cache share one lock.
pub struct CachingFetchClient {
    source: Box<dyn MatchSource>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<FetchState>,
}

impl CachingFetchClient {
    pub fn new(
        source: Box<dyn MatchSource>,
        limiter: RateLimiter,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            retry,
            clock,
            state: Mutex::new(FetchState {
                limiter,
                cache: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FetchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserves a limiter slot under the lock, then sleeps outside it.
    fn throttle(&self) {
        let wait = self.lock().limiter.reserve(self.clock.now());
        if !wait.is_zero() {
            self.clock.sleep(wait);
        }
    }

    pub fn fetch_team_matches(
        &self,
        team_id: u32,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, FetchError> {
        let cached = self.lock().cache.get(&team_id).cloned();
        if let Some(matches) = cached {
            debug!(team_id, matches = matches.len(), "team history cache hit");
            return Ok(matches);
        }

        let matches = self
            .retry
            .execute(self.clock.as_ref(), "team_matches", |_| {
                self.throttle();
                self.source.list_recent_matches(team_id, limit)
            })?;
        debug!(team_id, matches = matches.len(), "fetched team history");

        self.lock().cache.insert(team_id, matches.clone());
        Ok(matches)
    }

    /// Fetches every distinct team once. With `parallel` the requests fan out
    /// over the rayon pool; the shared limiter still bounds the call rate.
    pub fn prefetch_team_matches(
        &self,
        team_ids: &[u32],
        limit: usize,
        parallel: bool,
    ) -> HashMap<u32, Result<Vec<MatchRecord>, FetchError>> {
        let mut seen = HashSet::new();
        let unique: Vec<u32> = team_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        if parallel {
            unique
                .par_iter()
                .map(|id| (*id, self.fetch_team_matches(*id, limit)))
                .collect()
        } else {
            unique
                .iter()
                .map(|id| (*id, self.fetch_team_matches(*id, limit)))
                .collect()
        }
    }

    pub fn fetch_fixtures(
        &self,
        league_id: u32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Fixture>, FetchError> {
        let mut fixtures = Vec::new();
        for page in 1..=MAX_FIXTURE_PAGES {
            let batch = self.retry.execute(self.clock.as_ref(), "fixtures", |_| {
                self.throttle();
                self.source.list_fixtures(league_id, from, to, page)
            })?;
            fixtures.extend(batch.fixtures);
            if !batch.has_more {
                break;
            }
            if page == MAX_FIXTURE_PAGES {
                warn!(league_id, pages = page, "fixture pagination truncated");
            }
        }
        info!(league_id, fixtures = fixtures.len(), "fetched fixtures");
        Ok(fixtures)
    }

    pub fn fetch_result(&self, fixture_id: u64) -> Result<Option<FixtureResult>, FetchError> {
        self.retry.execute(self.clock.as_ref(), "fixture_result", |_| {
            self.throttle();
            self.source.fetch_result(fixture_id)
        })
    }

    pub fn cached_teams(&self) -> usize {
        self.lock().cache.len()
    }
}
