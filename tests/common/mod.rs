#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;

use momentum_predictor::clock::{Clock, ManualClock};
use momentum_predictor::error::SourceError;
use momentum_predictor::fetch_client::{CachingFetchClient, FixturePage, MatchSource};
use momentum_predictor::rate_limit::RateLimiter;
use momentum_predictor::retry::RetryPolicy;
use momentum_predictor::types::{Fixture, FixtureResult, MatchRecord};

/// In-memory source that counts every call and can inject failures.
#[derive(Default)]
pub struct FakeSource {
    fixtures: Mutex<HashMap<u32, Vec<Fixture>>>,
    histories: Mutex<HashMap<u32, Vec<MatchRecord>>>,
    results: Mutex<HashMap<u64, FixtureResult>>,
    team_failures: Mutex<HashMap<u32, VecDeque<SourceError>>>,
    pub history_calls: AtomicUsize,
    pub fixture_calls: AtomicUsize,
    pub result_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_fixture(&self, fixture: Fixture) {
        self.fixtures
            .lock()
            .unwrap()
            .entry(fixture.league_id)
            .or_default()
            .push(fixture);
    }

    pub fn set_history(&self, team_id: u32, matches: Vec<MatchRecord>) {
        self.histories.lock().unwrap().insert(team_id, matches);
    }

    pub fn set_result(&self, result: FixtureResult) {
        self.results.lock().unwrap().insert(result.fixture_id, result);
    }

    /// Queued errors are returned, in order, before the team's history.
    pub fn fail_team(&self, team_id: u32, errors: Vec<SourceError>) {
        self.team_failures
            .lock()
            .unwrap()
            .insert(team_id, errors.into());
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }
}

pub struct SharedSource(pub Arc<FakeSource>);

impl MatchSource for SharedSource {
    fn list_fixtures(
        &self,
        league_id: u32,
        _from: NaiveDate,
        _to: NaiveDate,
        _page: u32,
    ) -> Result<FixturePage, SourceError> {
        self.0.fixture_calls.fetch_add(1, Ordering::SeqCst);
        let fixtures = self
            .0
            .fixtures
            .lock()
            .unwrap()
            .get(&league_id)
            .cloned()
            .unwrap_or_default();
        Ok(FixturePage {
            fixtures,
            has_more: false,
        })
    }

    fn list_recent_matches(
        &self,
        team_id: u32,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        self.0.history_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self
            .0
            .team_failures
            .lock()
            .unwrap()
            .get_mut(&team_id)
            .and_then(|q| q.pop_front())
        {
            return Err(err);
        }
        let mut matches = self
            .0
            .histories
            .lock()
            .unwrap()
            .get(&team_id)
            .cloned()
            .unwrap_or_default();
        matches.truncate(limit);
        Ok(matches)
    }

    fn fetch_result(&self, fixture_id: u64) -> Result<Option<FixtureResult>, SourceError> {
        self.0.result_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.0.results.lock().unwrap().get(&fixture_id).cloned())
    }
}

pub fn client_with(
    source: &Arc<FakeSource>,
    clock: &Arc<ManualClock>,
    max_calls: usize,
    period_secs: u64,
) -> CachingFetchClient {
    let clock: Arc<dyn Clock> = clock.clone();
    CachingFetchClient::new(
        Box::new(SharedSource(source.clone())),
        RateLimiter::new(max_calls, Duration::from_secs(period_secs)),
        RetryPolicy::default(),
        clock,
    )
}

pub fn fixture(id: u64, league_id: u32, home: u32, away: u32, date: &str) -> Fixture {
    Fixture {
        id,
        league_id,
        name: format!("Team {home} vs Team {away}"),
        starting_at: format!("{date} 15:00:00"),
        home_team_id: home,
        away_team_id: away,
        home_team: format!("Team {home}"),
        away_team: format!("Team {away}"),
    }
}

/// Builds a most-recent-first history for `team_id` from `(scored, conceded,
/// at_home)` triples, one day apart.
pub fn history(team_id: u32, games: &[(u8, u8, bool)]) -> Vec<MatchRecord> {
    let opponent = team_id + 1000;
    games
        .iter()
        .enumerate()
        .map(|(i, (scored, conceded, at_home))| {
            let (home_team_id, away_team_id, home_goals, away_goals) = if *at_home {
                (team_id, opponent, *scored, *conceded)
            } else {
                (opponent, team_id, *conceded, *scored)
            };
            MatchRecord {
                id: team_id as u64 * 100 + i as u64,
                date: format!("2024-04-{:02}", 28 - i.min(27)),
                home_team_id,
                away_team_id,
                home_goals,
                away_goals,
                ht_home_goals: Some(home_goals / 2),
                ht_away_goals: Some(away_goals / 2),
            }
        })
        .collect()
}

pub fn result(fixture_id: u64, home_goals: u8, away_goals: u8) -> FixtureResult {
    FixtureResult {
        fixture_id,
        home_goals,
        away_goals,
        ht_home_goals: Some(home_goals.min(1)),
        ht_away_goals: Some(0),
    }
}
