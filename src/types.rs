use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }
}

/// A finished historical match as reported by the data source. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: u64,
    pub date: String,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_goals: u8,
    pub away_goals: u8,
    pub ht_home_goals: Option<u8>,
    pub ht_away_goals: Option<u8>,
}

impl MatchRecord {
    pub fn side_of(&self, team_id: u32) -> Option<Side> {
        if self.home_team_id == team_id {
            Some(Side::Home)
        } else if self.away_team_id == team_id {
            Some(Side::Away)
        } else {
            None
        }
    }

    /// (scored, conceded) from the perspective of `side`.
    pub fn goals_for(&self, side: Side) -> (u8, u8) {
        match side {
            Side::Home => (self.home_goals, self.away_goals),
            Side::Away => (self.away_goals, self.home_goals),
        }
    }

    pub fn ht_goals_for(&self, side: Side) -> Option<(u8, u8)> {
        let (Some(h), Some(a)) = (self.ht_home_goals, self.ht_away_goals) else {
            return None;
        };
        Some(match side {
            Side::Home => (h, a),
            Side::Away => (a, h),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: u64,
    pub league_id: u32,
    pub name: String,
    pub starting_at: String,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_team: String,
    pub away_team: String,
}

impl Fixture {
    pub fn match_date(&self) -> &str {
        self.starting_at
            .split(['T', ' '])
            .next()
            .unwrap_or(self.starting_at.as_str())
    }

    pub fn kickoff_time(&self) -> &str {
        self.starting_at
            .split(['T', ' '])
            .nth(1)
            .map(|t| t.get(..5).unwrap_or(t))
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Improving => "Improving",
            Trend::Stable => "Stable",
            Trend::Declining => "Declining",
        }
    }
}

/// Momentum statistics for one team, recomputed on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    pub team_id: u32,
    /// Side the team takes in the upcoming fixture.
    pub venue: Side,
    pub form: String,
    pub form_points: u32,
    pub weighted_form_points: f64,
    pub weighted_form_points_l10: f64,
    pub goals_scored_l5_avg: f64,
    pub goals_conceded_l5_avg: f64,
    pub goals_scored_l10_avg: f64,
    pub goals_conceded_l10_avg: f64,
    pub ht_goals_scored_avg: f64,
    pub ht_goals_conceded_avg: f64,
    pub ht_samples: usize,
    pub clean_sheets: u32,
    pub btts: u32,
    pub btts_rate: f64,
    pub home_form_points: u32,
    pub away_form_points: u32,
    pub trend_scored: Trend,
    pub trend_conceded: Trend,
    pub sample_count: usize,
    pub sample_quality: f64,
    pub low_confidence: bool,
}

impl TeamStats {
    /// Split points matching the side of the upcoming fixture.
    pub fn venue_split_points(&self) -> u32 {
        match self.venue {
            Side::Home => self.home_form_points,
            Side::Away => self.away_form_points,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalLine {
    pub line: f64,
    pub over: u8,
    pub under: u8,
}

/// Market percentages (0-100) plus a [0, 1] confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPrediction {
    pub home_win: u8,
    pub draw: u8,
    pub away_win: u8,
    pub over_25: u8,
    pub under_25: u8,
    pub btts: u8,
    pub ht_home_over_05: u8,
    pub ht_away_over_05: u8,
    pub ft_home_over_15: u8,
    pub ft_away_over_15: u8,
    #[serde(default)]
    pub goal_lines: Vec<GoalLine>,
    pub home_expected_goals: f64,
    pub away_expected_goals: f64,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PredictionType {
    HomeWin,
    Draw,
    AwayWin,
    Over25,
    Under25,
    Btts,
}

impl PredictionType {
    pub const ALL: [PredictionType; 6] = [
        PredictionType::HomeWin,
        PredictionType::Draw,
        PredictionType::AwayWin,
        PredictionType::Over25,
        PredictionType::Under25,
        PredictionType::Btts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PredictionType::HomeWin => "home_win",
            PredictionType::Draw => "draw",
            PredictionType::AwayWin => "away_win",
            PredictionType::Over25 => "over_25",
            PredictionType::Under25 => "under_25",
            PredictionType::Btts => "btts",
        }
    }
}

impl fmt::Display for PredictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredictionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PredictionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| format!("unknown prediction type: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceBucket {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl ConfidenceBucket {
    pub fn from_pct(pct: u8) -> Self {
        match pct {
            0..30 => ConfidenceBucket::Low,
            30..50 => ConfidenceBucket::Moderate,
            50..70 => ConfidenceBucket::High,
            _ => ConfidenceBucket::VeryHigh,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceBucket::Low => "0-30%",
            ConfidenceBucket::Moderate => "30-50%",
            ConfidenceBucket::High => "50-70%",
            ConfidenceBucket::VeryHigh => "70-100%",
        }
    }
}

impl FromStr for ConfidenceBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0-30%" => Ok(ConfidenceBucket::Low),
            "30-50%" => Ok(ConfidenceBucket::Moderate),
            "50-70%" => Ok(ConfidenceBucket::High),
            "70-100%" => Ok(ConfidenceBucket::VeryHigh),
            other => Err(format!("unknown confidence bucket: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyAggregate {
    pub prediction_type: PredictionType,
    pub league_id: u32,
    pub confidence_bucket: ConfidenceBucket,
    pub predictions_made: u32,
    pub predictions_correct: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Home => "home_win",
            Outcome::Draw => "draw",
            Outcome::Away => "away_win",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "home_win" => Some(Outcome::Home),
            "draw" => Some(Outcome::Draw),
            "away_win" => Some(Outcome::Away),
            _ => None,
        }
    }
}

pub fn classify_outcome(home_goals: u8, away_goals: u8) -> Outcome {
    if home_goals > away_goals {
        Outcome::Home
    } else if home_goals < away_goals {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureResult {
    pub fixture_id: u64,
    pub home_goals: u8,
    pub away_goals: u8,
    pub ht_home_goals: Option<u8>,
    pub ht_away_goals: Option<u8>,
}

impl FixtureResult {
    pub fn outcome(&self) -> Outcome {
        classify_outcome(self.home_goals, self.away_goals)
    }

    pub fn total_goals(&self) -> u32 {
        self.home_goals as u32 + self.away_goals as u32
    }

    pub fn both_scored(&self) -> bool {
        self.home_goals > 0 && self.away_goals > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionStatus {
    Pending,
    Resolved,
}

/// A persisted prediction row; `result` is set once by the resolve step.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPrediction {
    pub fixture_id: u64,
    pub league_id: u32,
    pub match_date: String,
    pub home_team: String,
    pub away_team: String,
    pub prediction: MatchPrediction,
    pub result: Option<FixtureResult>,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredPrediction {
    pub fn status(&self) -> PredictionStatus {
        if self.result.is_some() {
            PredictionStatus::Resolved
        } else {
            PredictionStatus::Pending
        }
    }
}
