mod common;

use momentum_predictor::prediction::predict;
use momentum_predictor::store::Store;
use momentum_predictor::team_stats::compute;
use momentum_predictor::types::{ConfidenceBucket, MatchPrediction, PredictionStatus, PredictionType};
use momentum_predictor::weights::{Factor, GENERAL_SCOPE, Weights};

use common::{fixture, history, result};

const T0: &str = "2024-05-10T08:00:00+00:00";
const T1: &str = "2024-05-10T09:00:00+00:00";

fn sample_prediction(home_goals: u8) -> MatchPrediction {
    let home = compute(&history(1, &[(home_goals, 0, true), (1, 1, false)]), 1, true);
    let away = compute(&history(2, &[(0, 1, false)]), 2, false);
    predict(&home, &away, &Weights::defaults())
}

#[test]
fn rerunning_a_fixture_replaces_the_row() {
    let store = Store::open_in_memory().unwrap();
    let fx = fixture(100, 501, 1, 2, "2024-05-11");

    assert!(store.upsert_prediction(&fx, &sample_prediction(1), T0).unwrap());
    let updated = sample_prediction(4);
    assert!(store.upsert_prediction(&fx, &updated, T1).unwrap());

    assert_eq!(store.count_predictions().unwrap(), 1);
    let row = store.load_prediction(100).unwrap().unwrap();
    assert_eq!(row.prediction, updated);
    assert_eq!(row.created_at, T0);
    assert_eq!(row.updated_at, T1);
    assert_eq!(row.match_date, "2024-05-11");
    assert_eq!(row.status(), PredictionStatus::Pending);
}

#[test]
fn resolution_happens_once_and_freezes_the_prediction() {
    let store = Store::open_in_memory().unwrap();
    let fx = fixture(100, 501, 1, 2, "2024-05-11");
    let original = sample_prediction(2);
    store.upsert_prediction(&fx, &original, T0).unwrap();

    assert!(store.resolve_prediction(&result(100, 2, 1), T1).unwrap());
    assert!(!store.resolve_prediction(&result(100, 0, 0), T1).unwrap());

    let row = store.load_prediction(100).unwrap().unwrap();
    assert_eq!(row.status(), PredictionStatus::Resolved);
    let stored = row.result.unwrap();
    assert_eq!((stored.home_goals, stored.away_goals), (2, 1));

    // A later predict run must not overwrite a resolved row.
    assert!(!store.upsert_prediction(&fx, &sample_prediction(5), T1).unwrap());
    assert_eq!(store.load_prediction(100).unwrap().unwrap().prediction, original);
}

#[test]
fn pending_window_filters_by_date_and_status() {
    let store = Store::open_in_memory().unwrap();
    let p = sample_prediction(1);
    store.upsert_prediction(&fixture(1, 501, 1, 2, "2024-04-01"), &p, T0).unwrap();
    store.upsert_prediction(&fixture(2, 501, 3, 4, "2024-05-01"), &p, T0).unwrap();
    store.upsert_prediction(&fixture(3, 501, 5, 6, "2024-05-05"), &p, T0).unwrap();
    store.resolve_prediction(&result(3, 1, 0), T1).unwrap();

    let pending = store.load_pending_predictions("2024-04-26").unwrap();
    let ids: Vec<u64> = pending.iter().map(|p| p.fixture_id).collect();
    assert_eq!(ids, vec![2]);
    assert_eq!(pending[0].prediction.goal_lines.len(), 10);
}

#[test]
fn resolving_an_unknown_fixture_is_a_no_op() {
    let store = Store::open_in_memory().unwrap();
    assert!(!store.resolve_prediction(&result(404, 1, 0), T0).unwrap());
    assert!(store.load_prediction(404).unwrap().is_none());
}

#[test]
fn weights_are_seeded_once_and_saved() {
    let store = Store::open_in_memory().unwrap();
    let mut seeded = store.load_or_seed_weights(T0).unwrap();
    assert_eq!(seeded.len(), Factor::ALL.len());
    assert!(seeded.iter().all(|w| w.prediction_type == GENERAL_SCOPE));

    let form = seeded
        .iter_mut()
        .find(|w| w.factor == Factor::FormPoints)
        .unwrap();
    form.current_weight = 1.15;
    form.adjustment_count = 1;
    form.last_adjusted = Some(T1.to_string());
    store.save_weight(form).unwrap();

    let reloaded = store.load_or_seed_weights(T1).unwrap();
    assert_eq!(reloaded.len(), Factor::ALL.len());
    let form = reloaded
        .iter()
        .find(|w| w.factor == Factor::FormPoints)
        .unwrap();
    assert_eq!(form.current_weight, 1.15);
    assert_eq!(form.adjustment_count, 1);
    let boost = reloaded
        .iter()
        .find(|w| w.factor == Factor::RecentFormBoost)
        .unwrap();
    assert_eq!(boost.current_weight, 1.2);
    assert_eq!(boost.last_adjusted.as_deref(), Some(T0));
}

#[test]
fn accuracy_only_accumulates() {
    let store = Store::open_in_memory().unwrap();
    let kind = PredictionType::Over25;
    store.accumulate_accuracy(kind, 501, ConfidenceBucket::High, true, T0).unwrap();
    store.accumulate_accuracy(kind, 501, ConfidenceBucket::High, false, T0).unwrap();
    store.accumulate_accuracy(kind, 501, ConfidenceBucket::High, true, T1).unwrap();
    store.accumulate_accuracy(kind, 271, ConfidenceBucket::Low, false, T1).unwrap();

    let rows = store.load_accuracy().unwrap();
    assert_eq!(rows.len(), 2);
    let high = rows.iter().find(|r| r.league_id == 501).unwrap();
    assert_eq!((high.predictions_made, high.predictions_correct), (3, 2));
    assert_eq!(high.confidence_bucket, ConfidenceBucket::High);
    let low = rows.iter().find(|r| r.league_id == 271).unwrap();
    assert_eq!((low.predictions_made, low.predictions_correct), (1, 0));
}
