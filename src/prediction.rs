use crate::types::{GoalLine, MatchPrediction, TeamStats, Trend};
use crate::weights::{Factor, Weights};

// Expected goals.
const HOME_ADVANTAGE_GOALS: f64 = 0.35;
const ATTACK_SHARE: f64 = 0.6;
const DEFENCE_SHARE: f64 = 0.4;
const SPLIT_POINTS_SCALE: f64 = 15.0;
const AWAY_SPLIT_DAMPING: f64 = 0.5;
const TREND_STEP: f64 = 0.05;
const HT_SHARE_OF_FT: f64 = 0.45;

// Continuous goal-line transform.
const LINE_MIDPOINT_PCT: f64 = 50.0;
const LINE_SLOPE_PCT: f64 = 20.0;
const HEADLINE_LINE_BOUNDS: (f64, f64) = (10.0, 90.0);
const LADDER_BOUNDS: (f64, f64) = (5.0, 95.0);
pub const GOAL_LINES: [f64; 10] = [0.5, 1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5, 8.5, 9.5];

// BTTS blend: interaction term dominates, history term adds at most 30 points.
const BTTS_INTERACTION_BLEND: f64 = 1.0;
const BTTS_HISTORY_BLEND: f64 = 15.0;
const BTTS_BOUNDS: (f64, f64) = (10.0, 75.0);

// Match result.
const BASE_HOME_PCT: f64 = 40.0;
const BASE_AWAY_PCT: f64 = 30.0;
const FORM_HOME_SLOPE: f64 = 2.0;
const FORM_AWAY_SLOPE: f64 = 1.5;
const XG_DIFF_SLOPE: f64 = 5.0;
const HOME_ADVANTAGE_PCT: f64 = 8.0;
const HOME_BOUNDS: (f64, f64) = (15.0, 75.0);
const AWAY_BOUNDS: (f64, f64) = (10.0, 60.0);
const MAX_DECISIVE_PCT: f64 = 85.0;
const MIN_DRAW_PCT: f64 = 15.0;

// Confidence.
const FORM_GAP_SCALE: f64 = 15.0;
const GOALS_GAP_SCALE: f64 = 2.0;
const HEADLINE_LINE: f64 = 2.5;

/// `50 + (expected - line) * 20`, clamped. Linear, so monotonic in `expected`.
pub fn goal_line_pct(expected: f64, line: f64, bounds: (f64, f64)) -> f64 {
    (LINE_MIDPOINT_PCT + (expected - line) * LINE_SLOPE_PCT).clamp(bounds.0, bounds.1)
}

pub fn over_25_pct(total_expected_goals: f64) -> f64 {
    goal_line_pct(total_expected_goals, HEADLINE_LINE, HEADLINE_LINE_BOUNDS)
}

pub fn btts_pct(home_expected: f64, away_expected: f64, home_rate: f64, away_rate: f64) -> f64 {
    let interaction = (home_expected / 2.0) * (away_expected / 2.0) * 100.0;
    let history = home_rate + away_rate;
    (interaction * BTTS_INTERACTION_BLEND + history * BTTS_HISTORY_BLEND)
        .clamp(BTTS_BOUNDS.0, BTTS_BOUNDS.1)
}

/// `0.5 * sample quality + 0.3 * form clarity + 0.2 * goals clarity` in [0, 1].
pub fn confidence_score(sample_quality_avg: f64, form_gap: f64, total_expected: f64) -> f64 {
    let form_clarity = (form_gap.abs() / FORM_GAP_SCALE).min(1.0);
    let goals_clarity = ((total_expected - HEADLINE_LINE).abs() / GOALS_GAP_SCALE).min(1.0);
    let raw = 0.5 * sample_quality_avg.clamp(0.0, 1.0) + 0.3 * form_clarity + 0.2 * goals_clarity;
    (raw.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

fn trend_factor(trend: Trend, weights: &Weights) -> f64 {
    let step = TREND_STEP * weights.get(Factor::TrendMultiplier);
    match trend {
        Trend::Improving => 1.0 + step,
        Trend::Stable => 1.0,
        Trend::Declining => (1.0 - step).max(0.0),
    }
}

/// (home, away) expected goals.
pub fn expected_goals(home: &TeamStats, away: &TeamStats, weights: &Weights) -> (f64, f64) {
    let scored_w = weights.get(Factor::GoalsScored);
    let conceded_w = weights.get(Factor::GoalsConceded);
    let split_w = weights.get(Factor::HomeAwaySplit);

    let home_attack = home.goals_scored_l5_avg
        * scored_w
        * (1.0 + home.venue_split_points() as f64 / SPLIT_POINTS_SCALE * split_w)
        * trend_factor(home.trend_scored, weights);
    let home_defence_gap = away.goals_conceded_l5_avg * conceded_w;

    let away_attack = away.goals_scored_l5_avg
        * scored_w
        * (1.0
            + away.venue_split_points() as f64 / SPLIT_POINTS_SCALE
                * split_w
                * AWAY_SPLIT_DAMPING)
        * trend_factor(away.trend_scored, weights);
    let away_defence_gap = home.goals_conceded_l5_avg * conceded_w;

    let home_xg = home_attack * ATTACK_SHARE
        + home_defence_gap * DEFENCE_SHARE
        + HOME_ADVANTAGE_GOALS * weights.get(Factor::HomeAdvantage);
    let away_xg = away_attack * ATTACK_SHARE + away_defence_gap * DEFENCE_SHARE;
    (home_xg.max(0.0), away_xg.max(0.0))
}

/// Home / draw / away as floats summing to 100.
pub fn result_percentages(
    home: &TeamStats,
    away: &TeamStats,
    home_xg: f64,
    away_xg: f64,
    weights: &Weights,
) -> (f64, f64, f64) {
    let form_diff = (home.weighted_form_points - away.weighted_form_points)
        * weights.get(Factor::FormPoints)
        * weights.get(Factor::RecentFormBoost);
    let xg_diff = home_xg - away_xg;

    let mut home_pct = (BASE_HOME_PCT
        + form_diff * FORM_HOME_SLOPE
        + xg_diff * XG_DIFF_SLOPE
        + HOME_ADVANTAGE_PCT * weights.get(Factor::HomeAdvantage))
    .clamp(HOME_BOUNDS.0, HOME_BOUNDS.1);
    let mut away_pct = (BASE_AWAY_PCT - form_diff * FORM_AWAY_SLOPE - xg_diff * XG_DIFF_SLOPE)
        .clamp(AWAY_BOUNDS.0, AWAY_BOUNDS.1);

    let decisive = home_pct + away_pct;
    if decisive > MAX_DECISIVE_PCT {
        let scale = MAX_DECISIVE_PCT / decisive;
        home_pct *= scale;
        away_pct *= scale;
    }
    let draw_pct = (100.0 - home_pct - away_pct).max(MIN_DRAW_PCT);

    let total = home_pct + draw_pct + away_pct;
    (
        home_pct / total * 100.0,
        draw_pct / total * 100.0,
        away_pct / total * 100.0,
    )
}

fn half_time_expected(ft_expected: f64, stats: &TeamStats, weights: &Weights) -> f64 {
    let from_ft = ft_expected * HT_SHARE_OF_FT;
    let blended = if stats.ht_samples > 0 {
        0.5 * from_ft + 0.5 * stats.ht_goals_scored_avg
    } else {
        from_ft
    };
    blended * weights.get(Factor::HtGoals)
}

fn pct(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

pub fn predict(home: &TeamStats, away: &TeamStats, weights: &Weights) -> MatchPrediction {
    let (home_xg, away_xg) = expected_goals(home, away, weights);
    let total = home_xg + away_xg;

    let over_25 = pct(over_25_pct(total));

    let (h, _, a) = result_percentages(home, away, home_xg, away_xg, weights);
    let home_win = pct(h);
    let away_win = pct(a);
    let draw = 100u8.saturating_sub(home_win).saturating_sub(away_win);

    let ht_home = half_time_expected(home_xg, home, weights);
    let ht_away = half_time_expected(away_xg, away, weights);

    let goal_lines = GOAL_LINES
        .iter()
        .map(|line| {
            let over = pct(goal_line_pct(total, *line, LADDER_BOUNDS));
            GoalLine {
                line: *line,
                over,
                under: 100 - over,
            }
        })
        .collect();

    let sample_quality_avg = (home.sample_quality + away.sample_quality) / 2.0;
    let form_gap = home.weighted_form_points - away.weighted_form_points;

    MatchPrediction {
        home_win,
        draw,
        away_win,
        over_25,
        under_25: 100 - over_25,
        btts: pct(btts_pct(home_xg, away_xg, home.btts_rate, away.btts_rate)),
        ht_home_over_05: pct(goal_line_pct(ht_home, 0.5, HEADLINE_LINE_BOUNDS)),
        ht_away_over_05: pct(goal_line_pct(ht_away, 0.5, HEADLINE_LINE_BOUNDS)),
        ft_home_over_15: pct(goal_line_pct(home_xg, 1.5, HEADLINE_LINE_BOUNDS)),
        ft_away_over_15: pct(goal_line_pct(away_xg, 1.5, HEADLINE_LINE_BOUNDS)),
        goal_lines,
        home_expected_goals: (home_xg * 100.0).round() / 100.0,
        away_expected_goals: (away_xg * 100.0).round() / 100.0,
        confidence_score: confidence_score(sample_quality_avg, form_gap, total),
    }
}
