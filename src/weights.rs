use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::PredictionType;

pub const GENERAL_SCOPE: &str = "general";
pub const DEFAULT_WEIGHT_MIN: f64 = 0.3;
pub const DEFAULT_WEIGHT_MAX: f64 = 2.0;
const DEFAULT_PERFORMANCE_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Factor {
    FormPoints,
    GoalsScored,
    GoalsConceded,
    HomeAdvantage,
    HtGoals,
    TrendMultiplier,
    RecentFormBoost,
    HomeAwaySplit,
}

impl Factor {
    pub const ALL: [Factor; 8] = [
        Factor::FormPoints,
        Factor::GoalsScored,
        Factor::GoalsConceded,
        Factor::HomeAdvantage,
        Factor::HtGoals,
        Factor::TrendMultiplier,
        Factor::RecentFormBoost,
        Factor::HomeAwaySplit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Factor::FormPoints => "form_points",
            Factor::GoalsScored => "goals_scored_weight",
            Factor::GoalsConceded => "goals_conceded_weight",
            Factor::HomeAdvantage => "home_advantage",
            Factor::HtGoals => "ht_goals_weight",
            Factor::TrendMultiplier => "trend_multiplier",
            Factor::RecentFormBoost => "recent_form_boost",
            Factor::HomeAwaySplit => "home_away_split",
        }
    }

    pub fn default_weight(self) -> f64 {
        match self {
            Factor::RecentFormBoost => 1.2,
            Factor::HomeAwaySplit => 1.1,
            _ => 1.0,
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Factor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Factor::ALL
            .into_iter()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| format!("unknown factor: {s}"))
    }
}

/// Factors a prediction type's accuracy feeds back into.
pub fn factors_for(prediction_type: PredictionType) -> &'static [Factor] {
    match prediction_type {
        PredictionType::HomeWin => &[
            Factor::FormPoints,
            Factor::HomeAdvantage,
            Factor::RecentFormBoost,
            Factor::HomeAwaySplit,
        ],
        PredictionType::Draw => &[Factor::FormPoints],
        PredictionType::AwayWin => &[Factor::FormPoints, Factor::HomeAwaySplit],
        PredictionType::Over25 | PredictionType::Under25 | PredictionType::Btts => {
            &[Factor::GoalsScored, Factor::GoalsConceded]
        }
    }
}

/// Persisted weight row, keyed by (factor, prediction_type scope).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorWeight {
    pub factor: Factor,
    pub prediction_type: String,
    pub current_weight: f64,
    pub performance_score: f64,
    pub adjustment_count: u32,
    pub last_adjusted: Option<String>,
}

impl FactorWeight {
    pub fn seeded(factor: Factor, now: &str) -> Self {
        Self {
            factor,
            prediction_type: GENERAL_SCOPE.to_string(),
            current_weight: factor.default_weight(),
            performance_score: DEFAULT_PERFORMANCE_SCORE,
            adjustment_count: 0,
            last_adjusted: Some(now.to_string()),
        }
    }
}

pub fn default_factor_weights(now: &str) -> Vec<FactorWeight> {
    Factor::ALL
        .into_iter()
        .map(|f| FactorWeight::seeded(f, now))
        .collect()
}

/// Weight lookup consumed by the prediction engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    values: BTreeMap<Factor, f64>,
}

impl Weights {
    pub fn defaults() -> Self {
        Self {
            values: Factor::ALL
                .into_iter()
                .map(|f| (f, f.default_weight()))
                .collect(),
        }
    }

    pub fn uniform(value: f64) -> Self {
        Self {
            values: Factor::ALL.into_iter().map(|f| (f, value)).collect(),
        }
    }

    /// Missing factors fall back to their defaults. Stored values are clamped
    /// to `[min, max]`, the same bounds the learner writes under.
    pub fn from_records(records: &[FactorWeight], min: f64, max: f64) -> Self {
        let mut weights = Self::defaults();
        for record in records {
            weights
                .values
                .insert(record.factor, record.current_weight.clamp(min, max));
        }
        weights
    }

    pub fn get(&self, factor: Factor) -> f64 {
        self.values
            .get(&factor)
            .copied()
            .unwrap_or_else(|| factor.default_weight())
    }

    pub fn set(&mut self, factor: Factor, value: f64) {
        self.values.insert(factor, value);
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self::defaults()
    }
}
