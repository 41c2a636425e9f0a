use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::types::PredictionType;
use crate::weights::{
    DEFAULT_WEIGHT_MAX, DEFAULT_WEIGHT_MIN, Factor, FactorWeight, GENERAL_SCOPE, factors_for,
};

#[derive(Debug, Clone, PartialEq)]
pub struct LearningConfig {
    pub learning_rate: f64,
    pub min_samples: u32,
    pub threshold_high: f64,
    pub threshold_low: f64,
    pub weight_min: f64,
    pub weight_max: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.15,
            min_samples: 10,
            threshold_high: 0.55,
            threshold_low: 0.45,
            weight_min: DEFAULT_WEIGHT_MIN,
            weight_max: DEFAULT_WEIGHT_MAX,
        }
    }
}

impl LearningConfig {
    fn multiplier(&self, accuracy: f64) -> f64 {
        if accuracy > self.threshold_high {
            1.0 + self.learning_rate
        } else if accuracy < self.threshold_low {
            1.0 - self.learning_rate
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LearnOutcome {
    /// Only weights whose value changed.
    pub updated: Vec<FactorWeight>,
    /// Accuracy of every type that passed the sample gate.
    pub accuracy: BTreeMap<PredictionType, f64>,
    /// Types below the sample gate.
    pub skipped: Vec<PredictionType>,
}

/// One batch learning pass over `(made, correct)` totals per prediction type.
///
/// Types under `min_samples` or inside the neutral accuracy band contribute
/// nothing. Each general-scope factor mapped from at least one voting type is
/// multiplied by the mean of those types' multipliers and clamped to the weight bounds. Weights that end up
/// unchanged are left exactly as they were.
pub fn learn(
    accuracy_by_type: &BTreeMap<PredictionType, (u32, u32)>,
    current: &[FactorWeight],
    cfg: &LearningConfig,
    now: &str,
) -> LearnOutcome {
    let mut outcome = LearnOutcome::default();
    let mut votes: BTreeMap<Factor, Vec<(f64, f64)>> = BTreeMap::new();

    for prediction_type in PredictionType::ALL {
        let (made, correct) = accuracy_by_type
            .get(&prediction_type)
            .copied()
            .unwrap_or((0, 0));
        if made < cfg.min_samples || made == 0 {
            debug!(
                prediction_type = prediction_type.as_str(),
                made,
                min_samples = cfg.min_samples,
                "below sample gate, skipped"
            );
            outcome.skipped.push(prediction_type);
            continue;
        }
        let accuracy = correct.min(made) as f64 / made as f64;
        outcome.accuracy.insert(prediction_type, accuracy);

        let multiplier = cfg.multiplier(accuracy);
        if multiplier == 1.0 {
            continue;
        }
        for factor in factors_for(prediction_type) {
            votes
                .entry(*factor)
                .or_default()
                .push((multiplier, accuracy));
        }
    }

    for weight in current
        .iter()
        .filter(|w| w.prediction_type == GENERAL_SCOPE)
    {
        let Some(factor_votes) = votes.get(&weight.factor) else {
            continue;
        };
        let n = factor_votes.len() as f64;
        let multiplier = factor_votes.iter().map(|(m, _)| m).sum::<f64>() / n;
        let performance = factor_votes.iter().map(|(_, a)| a).sum::<f64>() / n;

        let next = (weight.current_weight * multiplier).clamp(cfg.weight_min, cfg.weight_max);
        if (next - weight.current_weight).abs() < 1e-12 {
            continue;
        }

        info!(
            factor = weight.factor.as_str(),
            from = weight.current_weight,
            to = next,
            performance,
            "weight adjusted"
        );
        let mut updated = weight.clone();
        updated.current_weight = next;
        updated.performance_score = performance;
        updated.adjustment_count = updated.adjustment_count.saturating_add(1);
        updated.last_adjusted = Some(now.to_string());
        outcome.updated.push(updated);
    }

    outcome
}
