use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use tracing::{debug, error, info, warn};

use crate::accuracy::{Metrics, Prob3, evaluate_markets, evaluate_probs, summarize_accuracy};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::export::{PredictionExportRow, export_predictions};
use crate::fetch_client::CachingFetchClient;
use crate::http_client::{REQUEST_TIMEOUT_SECS, build_http_client, http_client};
use crate::learner::learn;
use crate::prediction::predict;
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::sportmonks::SportmonksSource;
use crate::store::{Store, with_write_retry};
use crate::team_stats;
use crate::types::{Fixture, Outcome};
use crate::weights::{GENERAL_SCOPE, Weights};

/// Pending predictions older than this are no longer chased for results.
pub const RESOLVE_LOOKBACK_DAYS: u64 = 14;

#[derive(Debug, Default)]
pub struct PredictSummary {
    pub fixtures_seen: usize,
    pub leagues_failed: usize,
    pub skipped: usize,
    pub persisted: usize,
    pub already_resolved: usize,
    pub persist_failed: usize,
    pub exported: Option<usize>,
    pub predictions: Vec<PredictionExportRow>,
}

#[derive(Debug)]
pub struct LearnSummary {
    pub pending: usize,
    pub resolved: usize,
    pub still_pending: usize,
    pub fetch_failed: usize,
    pub metrics: Metrics,
    pub learned: bool,
    pub weights_updated: usize,
}

/// Run context: one fetch client (limiter + cache), one store, one config.
pub struct Predictor {
    config: Config,
    client: CachingFetchClient,
    store: Store,
}

impl Predictor {
    pub fn new(config: Config, client: CachingFetchClient, store: Store) -> Self {
        Self {
            config,
            client,
            store,
        }
    }

    /// Live wiring: Sportmonks over HTTP, the system clock and the on-disk store.
    pub fn from_config(config: Config) -> Result<Self> {
        let http = if config.request_timeout == Duration::from_secs(REQUEST_TIMEOUT_SECS) {
            http_client()?.clone()
        } else {
            build_http_client(config.request_timeout)?
        };
        let source = SportmonksSource::new(http, config.base_url.clone(), config.api_key.clone());
        let client = CachingFetchClient::new(
            Box::new(source),
            RateLimiter::new(config.rate_limit_calls, config.rate_limit_period),
            RetryPolicy::default(),
            Arc::new(SystemClock),
        );
        let store = Store::open(&config.db_path)
            .with_context(|| format!("open sqlite db {}", config.db_path.display()))?;
        Ok(Self::new(config, client, store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn current_weights(&self, now: &str) -> Weights {
        match self.store.load_or_seed_weights(now) {
            Ok(records) => {
                let general: Vec<_> = records
                    .into_iter()
                    .filter(|w| w.prediction_type == GENERAL_SCOPE)
                    .collect();
                Weights::from_records(
                    &general,
                    self.config.learning.weight_min,
                    self.config.learning.weight_max,
                )
            }
            Err(err) => {
                warn!(error = %err, "could not load weights, using defaults");
                Weights::defaults()
            }
        }
    }

    /// Predicts every fixture of the configured leagues between `from` and
    /// `to`. Fetch and persistence failures skip the fixture, never the run.
    pub fn run_predict(&self, from: NaiveDate, to: NaiveDate, now: &str) -> PredictSummary {
        let mut summary = PredictSummary::default();
        let weights = self.current_weights(now);

        let mut fixtures: Vec<Fixture> = Vec::new();
        for league_id in &self.config.league_ids {
            match self.client.fetch_fixtures(*league_id, from, to) {
                Ok(batch) => fixtures.extend(batch),
                Err(err) => {
                    warn!(league_id, error = %err, "fixture listing failed, league skipped");
                    summary.leagues_failed += 1;
                }
            }
        }
        summary.fixtures_seen = fixtures.len();
        if fixtures.is_empty() {
            info!(%from, %to, "no fixtures in window");
            return summary;
        }

        let team_ids: Vec<u32> = fixtures
            .iter()
            .flat_map(|f| [f.home_team_id, f.away_team_id])
            .collect();
        let histories: HashMap<_, _> = self.client.prefetch_team_matches(
            &team_ids,
            self.config.recent_match_limit,
            self.config.parallel_fetch,
        );

        for fixture in fixtures {
            let (Some(Ok(home_matches)), Some(Ok(away_matches))) = (
                histories.get(&fixture.home_team_id),
                histories.get(&fixture.away_team_id),
            ) else {
                for team_id in [fixture.home_team_id, fixture.away_team_id] {
                    if let Some(Err(err)) = histories.get(&team_id) {
                        warn!(
                            fixture_id = fixture.id,
                            team_id,
                            transient = err.is_transient(),
                            error = %err,
                            "team history unavailable, fixture skipped"
                        );
                    }
                }
                summary.skipped += 1;
                continue;
            };

            let home = team_stats::compute(home_matches, fixture.home_team_id, true);
            let away = team_stats::compute(away_matches, fixture.away_team_id, false);
            let prediction = predict(&home, &away, &weights);
            debug!(
                fixture_id = fixture.id,
                home = prediction.home_win,
                draw = prediction.draw,
                away = prediction.away_win,
                confidence = prediction.confidence_score,
                "predicted"
            );

            match with_write_retry("upsert_prediction", || {
                self.store.upsert_prediction(&fixture, &prediction, now)
            }) {
                Some(true) => summary.persisted += 1,
                Some(false) => {
                    debug!(fixture_id = fixture.id, "prediction already resolved, kept");
                    summary.already_resolved += 1;
                }
                None => summary.persist_failed += 1,
            }

            summary.predictions.push(PredictionExportRow {
                fixture,
                home,
                away,
                prediction,
            });
        }

        if let Some(path) = &self.config.export_path {
            match export_predictions(path, &summary.predictions) {
                Ok(n) => {
                    info!(path = %path.display(), rows = n, "exported predictions");
                    summary.exported = Some(n);
                }
                Err(err) => error!(path = %path.display(), error = %err, "export failed"),
            }
        }

        info!(
            fixtures = summary.fixtures_seen,
            persisted = summary.persisted,
            skipped = summary.skipped,
            "predict run complete"
        );
        summary
    }

    /// Resolves pending predictions from the lookback window, accumulates
    /// accuracy, then runs the learner if anything new resolved.
    pub fn run_learn(&self, today: NaiveDate, now: &str) -> LearnSummary {
        let mut summary = LearnSummary {
            pending: 0,
            resolved: 0,
            still_pending: 0,
            fetch_failed: 0,
            metrics: evaluate_probs(&[], &[]),
            learned: false,
            weights_updated: 0,
        };

        let since = today
            .checked_sub_days(Days::new(RESOLVE_LOOKBACK_DAYS))
            .unwrap_or(today)
            .format("%Y-%m-%d")
            .to_string();
        let pending = match self.store.load_pending_predictions(&since) {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "could not load pending predictions");
                return summary;
            }
        };
        summary.pending = pending.len();

        let mut probs: Vec<Prob3> = Vec::new();
        let mut outcomes: Vec<Outcome> = Vec::new();

        for stored in pending {
            let mut result = match self.client.fetch_result(stored.fixture_id) {
                Ok(Some(result)) => result,
                Ok(None) => {
                    summary.still_pending += 1;
                    continue;
                }
                Err(err) => {
                    warn!(fixture_id = stored.fixture_id, error = %err, "result fetch failed");
                    summary.fetch_failed += 1;
                    continue;
                }
            };
            result.fixture_id = stored.fixture_id;

            let resolved = with_write_retry("resolve_prediction", || {
                self.store.resolve_prediction(&result, now)
            });
            if resolved != Some(true) {
                continue;
            }
            summary.resolved += 1;

            for market in evaluate_markets(&stored.prediction, &result) {
                with_write_retry("accumulate_accuracy", || {
                    self.store.accumulate_accuracy(
                        market.prediction_type,
                        stored.league_id,
                        market.bucket,
                        market.correct,
                        now,
                    )
                });
            }
            probs.push(Prob3::from_prediction(&stored.prediction));
            outcomes.push(result.outcome());
        }

        summary.metrics = evaluate_probs(&probs, &outcomes);
        if summary.resolved > 0 {
            info!(
                resolved = summary.resolved,
                brier = summary.metrics.brier,
                log_loss = summary.metrics.log_loss,
                hit_rate = summary.metrics.accuracy,
                "resolved predictions"
            );
        } else {
            info!(pending = summary.pending, "nothing new resolved, learner not run");
            return summary;
        }

        let aggregates = match self.store.load_accuracy() {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "could not load accuracy, learner not run");
                return summary;
            }
        };
        let current = match self.store.load_or_seed_weights(now) {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "could not load weights, learner not run");
                return summary;
            }
        };

        let outcome = learn(
            &summarize_accuracy(&aggregates),
            &current,
            &self.config.learning,
            now,
        );
        summary.learned = true;
        for weight in &outcome.updated {
            if with_write_retry("save_weight", || self.store.save_weight(weight)).is_some() {
                summary.weights_updated += 1;
            }
        }
        info!(
            updated = summary.weights_updated,
            skipped_types = outcome.skipped.len(),
            "learning pass complete"
        );
        summary
    }
}
