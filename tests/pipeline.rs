mod common;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use momentum_predictor::clock::ManualClock;
use momentum_predictor::config::Config;
use momentum_predictor::error::SourceError;
use momentum_predictor::pipeline::Predictor;
use momentum_predictor::store::Store;
use momentum_predictor::types::{MatchPrediction, PredictionStatus};
use momentum_predictor::weights::Factor;

use common::{FakeSource, client_with, fixture, history, result};

const T0: &str = "2024-05-10T08:00:00+00:00";
const T1: &str = "2024-05-20T08:00:00+00:00";

fn config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("SPORTMONKS_API_KEY", "test-key"),
        ("PREDICTOR_DB_PATH", "/unused/predictions.sqlite"),
        ("PREDICTOR_LEAGUES", "501"),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

fn predictor(source: &Arc<FakeSource>) -> Predictor {
    let clock = Arc::new(ManualClock::new());
    Predictor::new(
        config(),
        client_with(source, &clock, 150, 60),
        Store::open_in_memory().unwrap(),
    )
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn predict_run_stores_predictions_and_skips_failed_teams() {
    let source = FakeSource::new();
    source.add_fixture(fixture(100, 501, 1, 2, "2024-05-11"));
    source.add_fixture(fixture(101, 501, 3, 4, "2024-05-11"));
    source.set_history(
        1,
        history(
            1,
            &[(3, 0, true), (2, 0, true), (2, 1, false), (3, 1, true), (1, 0, false)],
        ),
    );
    source.set_history(
        2,
        history(
            2,
            &[(0, 2, false), (1, 3, false), (0, 1, true), (1, 1, true), (0, 0, false)],
        ),
    );
    source.set_history(3, history(3, &[(1, 1, true)]));
    source.set_history(4, history(4, &[(2, 2, false)]));
    source.fail_team(
        4,
        vec![SourceError::Client {
            status: 403,
            body: "forbidden".into(),
        }],
    );

    let predictor = predictor(&source);
    let summary = predictor.run_predict(date("2024-05-11"), date("2024-05-12"), T0);

    assert_eq!(summary.fixtures_seen, 2);
    assert_eq!(summary.persisted, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.predictions.len(), 1);
    let p = &summary.predictions[0].prediction;
    assert!(p.home_win > p.away_win);
    assert!((0.0..=1.0).contains(&p.confidence_score));
    assert_eq!(predictor.store().count_predictions().unwrap(), 1);

    // Team 4 recovers; cached teams are not fetched again.
    let calls_before = source.history_calls();
    let again = predictor.run_predict(date("2024-05-11"), date("2024-05-12"), T1);
    assert_eq!(again.persisted, 2);
    assert_eq!(source.history_calls(), calls_before + 1);
    assert_eq!(predictor.store().count_predictions().unwrap(), 2);

    let row = predictor.store().load_prediction(100).unwrap().unwrap();
    assert_eq!(row.created_at, T0);
    assert_eq!(row.updated_at, T1);
}

#[test]
fn empty_window_is_not_an_error() {
    let source = FakeSource::new();
    let predictor = predictor(&source);
    let summary = predictor.run_predict(date("2024-05-11"), date("2024-05-11"), T0);
    assert_eq!(summary.fixtures_seen, 0);
    assert_eq!(summary.persisted, 0);
    assert_eq!(source.history_calls(), 0);
}

fn confident_home_call() -> MatchPrediction {
    MatchPrediction {
        home_win: 70,
        draw: 18,
        away_win: 12,
        over_25: 60,
        under_25: 40,
        btts: 55,
        ht_home_over_05: 60,
        ht_away_over_05: 40,
        ft_home_over_15: 55,
        ft_away_over_15: 35,
        goal_lines: Vec::new(),
        home_expected_goals: 1.9,
        away_expected_goals: 0.9,
        confidence_score: 0.7,
    }
}

#[test]
fn learn_resolves_accumulates_and_adjusts_weights() {
    let source = FakeSource::new();
    let predictor = predictor(&source);
    let store = predictor.store();

    for id in 1..=12u64 {
        let fx = fixture(id, 501, id as u32, 100 + id as u32, "2024-05-12");
        store.upsert_prediction(&fx, &confident_home_call(), T0).unwrap();
        source.set_result(result(id, 3, 1));
    }
    // Kicked off but not finished yet.
    store
        .upsert_prediction(&fixture(13, 501, 50, 51, "2024-05-19"), &confident_home_call(), T0)
        .unwrap();
    // Outside the lookback window.
    store
        .upsert_prediction(&fixture(14, 501, 60, 61, "2024-04-01"), &confident_home_call(), T0)
        .unwrap();
    source.set_result(result(14, 0, 2));

    let summary = predictor.run_learn(date("2024-05-20"), T1);
    assert_eq!(summary.pending, 13);
    assert_eq!(summary.resolved, 12);
    assert_eq!(summary.still_pending, 1);
    assert_eq!(summary.metrics.samples, 12);
    assert_eq!(summary.metrics.accuracy, 1.0);
    assert!(summary.learned);

    let accuracy = store.load_accuracy().unwrap();
    assert!(accuracy.iter().all(|a| a.predictions_made == 12 && a.predictions_correct == 12));
    assert_eq!(accuracy.len(), 6);

    let weights = store.load_or_seed_weights(T1).unwrap();
    let form = weights.iter().find(|w| w.factor == Factor::FormPoints).unwrap();
    assert!((form.current_weight - 1.15).abs() < 1e-9);
    assert_eq!(form.adjustment_count, 1);
    assert_eq!(form.last_adjusted.as_deref(), Some(T1));
    let trend = weights
        .iter()
        .find(|w| w.factor == Factor::TrendMultiplier)
        .unwrap();
    assert_eq!(trend.current_weight, 1.0);
    assert_eq!(trend.adjustment_count, 0);

    assert_eq!(
        store.load_prediction(1).unwrap().unwrap().status(),
        PredictionStatus::Resolved
    );
    assert_eq!(
        store.load_prediction(14).unwrap().unwrap().status(),
        PredictionStatus::Pending
    );

    // Nothing new to resolve: weights stay put.
    let rerun = predictor.run_learn(date("2024-05-20"), T1);
    assert_eq!(rerun.resolved, 0);
    assert!(!rerun.learned);
    let after = store.load_or_seed_weights(T1).unwrap();
    assert_eq!(after, weights);
}

#[test]
fn learner_waits_for_enough_samples() {
    let source = FakeSource::new();
    let predictor = predictor(&source);
    let store = predictor.store();

    for id in 1..=4u64 {
        let fx = fixture(id, 501, id as u32, 100 + id as u32, "2024-05-15");
        store.upsert_prediction(&fx, &confident_home_call(), T0).unwrap();
        source.set_result(result(id, 0, 1));
    }

    let summary = predictor.run_learn(date("2024-05-20"), T1);
    assert_eq!(summary.resolved, 4);
    assert!(summary.learned);
    assert_eq!(summary.weights_updated, 0);
    let weights = store.load_or_seed_weights(T1).unwrap();
    assert!(weights.iter().all(|w| w.adjustment_count == 0));
}
