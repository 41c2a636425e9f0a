use std::collections::BTreeMap;

use crate::types::{
    AccuracyAggregate, ConfidenceBucket, FixtureResult, MatchPrediction, Outcome, PredictionType,
};

const BINARY_CALL_PCT: u8 = 50;

/// How one market of one resolved prediction fared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketOutcome {
    pub prediction_type: PredictionType,
    pub predicted_pct: u8,
    pub bucket: ConfidenceBucket,
    pub correct: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Prob3 {
    pub fn from_prediction(pred: &MatchPrediction) -> Self {
        let total = (pred.home_win as f64 + pred.draw as f64 + pred.away_win as f64).max(1.0);
        Self {
            home: pred.home_win as f64 / total,
            draw: pred.draw as f64 / total,
            away: pred.away_win as f64 / total,
        }
    }

    fn argmax(self) -> Outcome {
        if self.home >= self.draw && self.home >= self.away {
            Outcome::Home
        } else if self.away >= self.draw {
            Outcome::Away
        } else {
            Outcome::Draw
        }
    }

    fn of(self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

impl Metrics {
    fn empty() -> Self {
        Self {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            accuracy: 0.0,
        }
    }
}

fn predicted_pct(pred: &MatchPrediction, prediction_type: PredictionType) -> u8 {
    match prediction_type {
        PredictionType::HomeWin => pred.home_win,
        PredictionType::Draw => pred.draw,
        PredictionType::AwayWin => pred.away_win,
        PredictionType::Over25 => pred.over_25,
        PredictionType::Under25 => pred.under_25,
        PredictionType::Btts => pred.btts,
    }
}

/// A 1X2 market is called when it holds the top percentage (ties go home,
/// then away); a binary market when it is above 50.
fn called(pred: &MatchPrediction, prediction_type: PredictionType) -> bool {
    let top = Prob3::from_prediction(pred).argmax();
    match prediction_type {
        PredictionType::HomeWin => top == Outcome::Home,
        PredictionType::Draw => top == Outcome::Draw,
        PredictionType::AwayWin => top == Outcome::Away,
        PredictionType::Over25 => pred.over_25 > BINARY_CALL_PCT,
        PredictionType::Under25 => pred.under_25 > BINARY_CALL_PCT,
        PredictionType::Btts => pred.btts > BINARY_CALL_PCT,
    }
}

fn happened(result: &FixtureResult, prediction_type: PredictionType) -> bool {
    match prediction_type {
        PredictionType::HomeWin => result.outcome() == Outcome::Home,
        PredictionType::Draw => result.outcome() == Outcome::Draw,
        PredictionType::AwayWin => result.outcome() == Outcome::Away,
        PredictionType::Over25 => result.total_goals() > 2,
        PredictionType::Under25 => result.total_goals() <= 2,
        PredictionType::Btts => result.both_scored(),
    }
}

/// One entry per tracked market. A market is correct when the call matches
/// reality in either direction.
pub fn evaluate_markets(pred: &MatchPrediction, result: &FixtureResult) -> Vec<MarketOutcome> {
    PredictionType::ALL
        .into_iter()
        .map(|prediction_type| {
            let pct = predicted_pct(pred, prediction_type);
            MarketOutcome {
                prediction_type,
                predicted_pct: pct,
                bucket: ConfidenceBucket::from_pct(pct),
                correct: called(pred, prediction_type) == happened(result, prediction_type),
            }
        })
        .collect()
}

/// Collapses league and bucket into per-type (made, correct) totals.
pub fn summarize_accuracy(rows: &[AccuracyAggregate]) -> BTreeMap<PredictionType, (u32, u32)> {
    let mut totals: BTreeMap<PredictionType, (u32, u32)> = BTreeMap::new();
    for row in rows {
        let entry = totals.entry(row.prediction_type).or_default();
        entry.0 = entry.0.saturating_add(row.predictions_made);
        entry.1 = entry
            .1
            .saturating_add(row.predictions_correct.min(row.predictions_made));
    }
    totals
}

pub fn evaluate_probs(predictions: &[Prob3], outcomes: &[Outcome]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics::empty();
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, outcome) in predictions.iter().zip(outcomes) {
        for candidate in [Outcome::Home, Outcome::Draw, Outcome::Away] {
            let y = if candidate == *outcome { 1.0 } else { 0.0 };
            brier_sum += (p.of(candidate) - y).powi(2);
        }
        log_loss_sum += -p.of(*outcome).clamp(1e-12, 1.0).ln();
        if p.argmax() == *outcome {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(home: u8, draw: u8, away: u8, over: u8, btts: u8) -> MatchPrediction {
        MatchPrediction {
            home_win: home,
            draw,
            away_win: away,
            over_25: over,
            under_25: 100 - over,
            btts,
            ht_home_over_05: 50,
            ht_away_over_05: 50,
            ft_home_over_15: 50,
            ft_away_over_15: 50,
            goal_lines: Vec::new(),
            home_expected_goals: 1.5,
            away_expected_goals: 1.0,
            confidence_score: 0.5,
        }
    }

    fn result(home: u8, away: u8) -> FixtureResult {
        FixtureResult {
            fixture_id: 1,
            home_goals: home,
            away_goals: away,
            ht_home_goals: None,
            ht_away_goals: None,
        }
    }

    fn outcome_for(outcomes: &[MarketOutcome], t: PredictionType) -> MarketOutcome {
        outcomes
            .iter()
            .copied()
            .find(|o| o.prediction_type == t)
            .unwrap()
    }

    #[test]
    fn home_favourite_wins() {
        let outcomes = evaluate_markets(&prediction(60, 25, 15, 70, 40), &result(3, 1));
        assert_eq!(outcomes.len(), PredictionType::ALL.len());
        assert!(outcome_for(&outcomes, PredictionType::HomeWin).correct);
        // Not calling a draw that did not happen is correct too.
        assert!(outcome_for(&outcomes, PredictionType::Draw).correct);
        assert!(outcome_for(&outcomes, PredictionType::Over25).correct);
        assert!(!outcome_for(&outcomes, PredictionType::Under25).correct);
        assert!(!outcome_for(&outcomes, PredictionType::Btts).correct);
    }

    #[test]
    fn buckets_follow_market_pct() {
        let outcomes = evaluate_markets(&prediction(72, 18, 10, 45, 55), &result(0, 0));
        assert_eq!(
            outcome_for(&outcomes, PredictionType::HomeWin).bucket,
            ConfidenceBucket::VeryHigh
        );
        assert_eq!(
            outcome_for(&outcomes, PredictionType::Draw).bucket,
            ConfidenceBucket::Low
        );
        assert_eq!(
            outcome_for(&outcomes, PredictionType::Over25).bucket,
            ConfidenceBucket::Moderate
        );
        assert_eq!(
            outcome_for(&outcomes, PredictionType::Btts).bucket,
            ConfidenceBucket::High
        );
    }

    #[test]
    fn summary_merges_leagues_and_buckets() {
        let rows = vec![
            AccuracyAggregate {
                prediction_type: PredictionType::Btts,
                league_id: 501,
                confidence_bucket: ConfidenceBucket::High,
                predictions_made: 6,
                predictions_correct: 4,
            },
            AccuracyAggregate {
                prediction_type: PredictionType::Btts,
                league_id: 271,
                confidence_bucket: ConfidenceBucket::Low,
                predictions_made: 5,
                predictions_correct: 2,
            },
        ];
        let summary = summarize_accuracy(&rows);
        assert_eq!(summary.get(&PredictionType::Btts), Some(&(11, 6)));
        assert!(!summary.contains_key(&PredictionType::HomeWin));
    }

    #[test]
    fn brier_of_certain_hit_is_zero() {
        let p = Prob3 {
            home: 1.0,
            draw: 0.0,
            away: 0.0,
        };
        let m = evaluate_probs(&[p], &[Outcome::Home]);
        assert_eq!(m.samples, 1);
        assert!(m.brier.abs() < 1e-12);
        assert_eq!(m.accuracy, 1.0);
    }

    #[test]
    fn mismatched_lengths_yield_empty_metrics() {
        let m = evaluate_probs(&[], &[Outcome::Draw]);
        assert_eq!(m.samples, 0);
    }
}
