use tracing::{debug, warn};

use crate::types::{MatchRecord, Side, TeamStats, Trend};

pub const RECENCY_WEIGHTS_L5: [f64; 5] = [1.0, 0.9, 0.8, 0.7, 0.6];
pub const RECENCY_WEIGHTS_L10: [f64; 10] = [1.0, 0.95, 0.9, 0.85, 0.8, 0.75, 0.7, 0.65, 0.6, 0.55];

const FORM_WINDOW: usize = 5;
const LONG_WINDOW: usize = 10;
pub const MIN_RELIABLE_MATCHES: usize = 3;
const TREND_MIN_POINTS: usize = 4;
const TREND_UP: f64 = 1.15;
const TREND_DOWN: f64 = 0.85;

pub fn points_for(scored: u8, conceded: u8) -> u32 {
    if scored > conceded {
        3
    } else if scored == conceded {
        1
    } else {
        0
    }
}

/// Mean of the two most recent values against the mean of the two oldest.
/// `values` are most-recent-first; fewer than four points is `Stable`.
pub fn classify_trend(values: &[f64]) -> Trend {
    if values.len() < TREND_MIN_POINTS {
        return Trend::Stable;
    }
    let recent = (values[0] + values[1]) / 2.0;
    let n = values.len();
    let older = (values[n - 2] + values[n - 1]) / 2.0;
    if recent > older * TREND_UP {
        Trend::Improving
    } else if recent < older * TREND_DOWN {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

pub fn sample_quality(available: usize) -> f64 {
    available.min(FORM_WINDOW) as f64 / FORM_WINDOW as f64
}

fn avg(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    (mean * 100.0).round() / 100.0
}

/// Momentum statistics from a most-recent-first history. Never fails: thin or
/// empty histories produce a low-confidence result.
pub fn compute(matches: &[MatchRecord], team_id: u32, is_home: bool) -> TeamStats {
    let venue = if is_home { Side::Home } else { Side::Away };

    let mut form = String::new();
    let mut form_points = 0u32;
    let mut weighted_form_points = 0.0;
    let mut weighted_form_points_l10 = 0.0;
    let mut scored_l5 = Vec::new();
    let mut conceded_l5 = Vec::new();
    let mut scored_l10 = Vec::new();
    let mut conceded_l10 = Vec::new();
    let mut ht_scored = Vec::new();
    let mut ht_conceded = Vec::new();
    let mut clean_sheets = 0u32;
    let mut btts = 0u32;
    let mut home_form_points = 0u32;
    let mut away_form_points = 0u32;

    let usable = matches
        .iter()
        .filter_map(|m| match m.side_of(team_id) {
            Some(side) => Some((m, side)),
            None => {
                debug!(team_id, match_id = m.id, "match does not involve team, ignored");
                None
            }
        })
        .take(LONG_WINDOW);

    let mut count = 0usize;
    for (i, (record, side)) in usable.enumerate() {
        count += 1;
        let (scored, conceded) = record.goals_for(side);
        let points = points_for(scored, conceded);

        weighted_form_points_l10 += points as f64 * RECENCY_WEIGHTS_L10[i];
        scored_l10.push(scored as f64);
        conceded_l10.push(conceded as f64);

        if i >= FORM_WINDOW {
            continue;
        }

        form.push(match points {
            3 => 'W',
            1 => 'D',
            _ => 'L',
        });
        form_points += points;
        weighted_form_points += points as f64 * RECENCY_WEIGHTS_L5[i];
        match side {
            Side::Home => home_form_points += points,
            Side::Away => away_form_points += points,
        }
        scored_l5.push(scored as f64);
        conceded_l5.push(conceded as f64);
        if conceded == 0 {
            clean_sheets += 1;
        }
        if scored > 0 && conceded > 0 {
            btts += 1;
        }
        if let Some((ht_for, ht_against)) = record.ht_goals_for(side) {
            ht_scored.push(ht_for as f64);
            ht_conceded.push(ht_against as f64);
        }
    }

    let low_confidence = count < MIN_RELIABLE_MATCHES;
    if low_confidence {
        warn!(
            kind = "DataQualityWarning",
            team_id,
            matches = count,
            "insufficient match history, prediction confidence reduced"
        );
    }

    let l5 = scored_l5.len();
    TeamStats {
        team_id,
        venue,
        form,
        form_points,
        weighted_form_points,
        weighted_form_points_l10,
        goals_scored_l5_avg: avg(&scored_l5),
        goals_conceded_l5_avg: avg(&conceded_l5),
        goals_scored_l10_avg: avg(&scored_l10),
        goals_conceded_l10_avg: avg(&conceded_l10),
        ht_goals_scored_avg: avg(&ht_scored),
        ht_goals_conceded_avg: avg(&ht_conceded),
        ht_samples: ht_scored.len(),
        clean_sheets,
        btts,
        btts_rate: if l5 == 0 { 0.0 } else { btts as f64 / l5 as f64 },
        home_form_points,
        away_form_points,
        trend_scored: classify_trend(&scored_l5),
        trend_conceded: classify_trend(&conceded_l5),
        sample_count: count,
        sample_quality: sample_quality(count),
        low_confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_needs_four_points() {
        assert_eq!(classify_trend(&[5.0, 5.0, 0.0]), Trend::Stable);
        assert_eq!(classify_trend(&[]), Trend::Stable);
    }

    #[test]
    fn trend_thresholds() {
        assert_eq!(classify_trend(&[3.0, 3.0, 2.0, 2.0]), Trend::Improving);
        assert_eq!(classify_trend(&[2.0, 2.0, 2.3, 2.3]), Trend::Stable);
        assert_eq!(classify_trend(&[1.0, 1.0, 1.0, 2.0, 2.0]), Trend::Declining);
        assert_eq!(classify_trend(&[0.0, 0.0, 0.0, 0.0]), Trend::Stable);
    }

    #[test]
    fn sample_quality_caps_at_five() {
        assert_eq!(sample_quality(0), 0.0);
        assert!((sample_quality(2) - 0.4).abs() < 1e-9);
        assert_eq!(sample_quality(5), 1.0);
        assert_eq!(sample_quality(10), 1.0);
    }

    #[test]
    fn recency_weights_decay() {
        assert!(RECENCY_WEIGHTS_L5.windows(2).all(|w| w[0] > w[1]));
        assert!(RECENCY_WEIGHTS_L10.windows(2).all(|w| w[0] > w[1]));
        assert!((RECENCY_WEIGHTS_L10[9] - 0.55).abs() < 1e-9);
    }
}
