use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::types::{Fixture, MatchPrediction, TeamStats};

pub const SHEET_NAME: &str = "Predictions";

/// Denormalised copy of one prediction for the spreadsheet sink.
#[derive(Debug, Clone)]
pub struct PredictionExportRow {
    pub fixture: Fixture,
    pub home: TeamStats,
    pub away: TeamStats,
    pub prediction: MatchPrediction,
}

const HEADER: [&str; 32] = [
    "Fixture ID",
    "League ID",
    "Date",
    "Kickoff",
    "Home",
    "Away",
    "Home Form",
    "Home Weighted Form",
    "Home Goals For L5",
    "Home Goals Against L5",
    "Home Home Pts",
    "Home Trend",
    "Away Form",
    "Away Weighted Form",
    "Away Goals For L5",
    "Away Goals Against L5",
    "Away Away Pts",
    "Away Trend",
    "Home xG",
    "Away xG",
    "Home Win %",
    "Draw %",
    "Away Win %",
    "Over 2.5 %",
    "Under 2.5 %",
    "BTTS %",
    "HT Home O0.5 %",
    "HT Away O0.5 %",
    "FT Home O1.5 %",
    "FT Away O1.5 %",
    "Confidence",
    "Low Data",
];

pub fn export_predictions(path: &Path, rows: &[PredictionExportRow]) -> Result<usize> {
    let mut table = vec![HEADER.iter().map(|h| h.to_string()).collect::<Vec<_>>()];
    table.extend(rows.iter().map(prediction_row));

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;
        write_rows(sheet, &table)?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    workbook
        .save(path)
        .with_context(|| format!("save xlsx {}", path.display()))?;
    Ok(rows.len())
}

fn prediction_row(row: &PredictionExportRow) -> Vec<String> {
    let p = &row.prediction;
    let low_data = row.home.low_confidence || row.away.low_confidence;
    vec![
        row.fixture.id.to_string(),
        row.fixture.league_id.to_string(),
        row.fixture.match_date().to_string(),
        row.fixture.kickoff_time().to_string(),
        row.fixture.home_team.clone(),
        row.fixture.away_team.clone(),
        row.home.form.clone(),
        format!("{:.1}", row.home.weighted_form_points),
        format!("{:.2}", row.home.goals_scored_l5_avg),
        format!("{:.2}", row.home.goals_conceded_l5_avg),
        row.home.home_form_points.to_string(),
        row.home.trend_scored.as_str().to_string(),
        row.away.form.clone(),
        format!("{:.1}", row.away.weighted_form_points),
        format!("{:.2}", row.away.goals_scored_l5_avg),
        format!("{:.2}", row.away.goals_conceded_l5_avg),
        row.away.away_form_points.to_string(),
        row.away.trend_scored.as_str().to_string(),
        format!("{:.2}", p.home_expected_goals),
        format!("{:.2}", p.away_expected_goals),
        p.home_win.to_string(),
        p.draw.to_string(),
        p.away_win.to_string(),
        p.over_25.to_string(),
        p.under_25.to_string(),
        p.btts.to_string(),
        p.ht_home_over_05.to_string(),
        p.ht_away_over_05.to_string(),
        p.ft_home_over_15.to_string(),
        p.ft_away_over_15.to_string(),
        format!("{:.2}", p.confidence_score),
        if low_data { "yes" } else { "" }.to_string(),
    ]
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
