use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{error, warn};

use crate::error::{PersistResult, PersistenceError};
use crate::types::{
    AccuracyAggregate, ConfidenceBucket, Fixture, FixtureResult, MatchPrediction, PredictionType,
    StoredPrediction,
};
use crate::weights::{FactorWeight, default_factor_weights};

/// SQLite-backed persistence for predictions, factor weights and accuracy.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> PersistResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Inserts or replaces the prediction for `fixture.id`. A Resolved row is
    /// never touched; returns whether a row was written.
    pub fn upsert_prediction(
        &self,
        fixture: &Fixture,
        prediction: &MatchPrediction,
        now: &str,
    ) -> PersistResult<bool> {
        let goal_lines = serde_json::to_string(&prediction.goal_lines)?;
        let changed = self.conn.execute(
            r#"
            INSERT INTO predictions (
                fixture_id, league_id, match_date, home_team, away_team,
                home_win_pct, draw_pct, away_win_pct, over_25_pct, under_25_pct, btts_pct,
                ht_home_over_05_pct, ht_away_over_05_pct, ft_home_over_15_pct, ft_away_over_15_pct,
                goal_lines_json, home_expected_goals, away_expected_goals, confidence_score,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19,
                ?20, ?20
            )
            ON CONFLICT(fixture_id) DO UPDATE SET
                league_id = excluded.league_id,
                match_date = excluded.match_date,
                home_team = excluded.home_team,
                away_team = excluded.away_team,
                home_win_pct = excluded.home_win_pct,
                draw_pct = excluded.draw_pct,
                away_win_pct = excluded.away_win_pct,
                over_25_pct = excluded.over_25_pct,
                under_25_pct = excluded.under_25_pct,
                btts_pct = excluded.btts_pct,
                ht_home_over_05_pct = excluded.ht_home_over_05_pct,
                ht_away_over_05_pct = excluded.ht_away_over_05_pct,
                ft_home_over_15_pct = excluded.ft_home_over_15_pct,
                ft_away_over_15_pct = excluded.ft_away_over_15_pct,
                goal_lines_json = excluded.goal_lines_json,
                home_expected_goals = excluded.home_expected_goals,
                away_expected_goals = excluded.away_expected_goals,
                confidence_score = excluded.confidence_score,
                updated_at = excluded.updated_at
            WHERE predictions.actual_result IS NULL
            "#,
            params![
                fixture.id as i64,
                fixture.league_id as i64,
                fixture.match_date(),
                fixture.home_team,
                fixture.away_team,
                prediction.home_win,
                prediction.draw,
                prediction.away_win,
                prediction.over_25,
                prediction.under_25,
                prediction.btts,
                prediction.ht_home_over_05,
                prediction.ht_away_over_05,
                prediction.ft_home_over_15,
                prediction.ft_away_over_15,
                goal_lines,
                prediction.home_expected_goals,
                prediction.away_expected_goals,
                prediction.confidence_score,
                now,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn load_prediction(&self, fixture_id: u64) -> PersistResult<Option<StoredPrediction>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {PREDICTION_COLUMNS} FROM predictions WHERE fixture_id = ?1"),
                params![fixture_id as i64],
                read_prediction_row,
            )
            .optional()?;
        raw.map(finish_prediction).transpose()
    }

    /// Pending rows whose match date is on or after `since` (`YYYY-MM-DD`).
    pub fn load_pending_predictions(&self, since: &str) -> PersistResult<Vec<StoredPrediction>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {PREDICTION_COLUMNS}
            FROM predictions
            WHERE actual_result IS NULL
              AND match_date >= ?1
            ORDER BY match_date ASC, fixture_id ASC
            "#
        ))?;
        let rows = stmt.query_map(params![since], read_prediction_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(finish_prediction(row?)?);
        }
        Ok(out)
    }

    /// Pending -> Resolved. Returns false when the row was already resolved
    /// or does not exist.
    pub fn resolve_prediction(&self, result: &FixtureResult, now: &str) -> PersistResult<bool> {
        let changed = self.conn.execute(
            r#"
            UPDATE predictions SET
                actual_home_goals = ?2,
                actual_away_goals = ?3,
                actual_ht_home_goals = ?4,
                actual_ht_away_goals = ?5,
                actual_result = ?6,
                updated_at = ?7
            WHERE fixture_id = ?1
              AND actual_result IS NULL
            "#,
            params![
                result.fixture_id as i64,
                result.home_goals,
                result.away_goals,
                result.ht_home_goals,
                result.ht_away_goals,
                result.outcome().as_str(),
                now,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn count_predictions(&self) -> PersistResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }

    /// Seeds any missing default rows, then returns every stored weight.
    pub fn load_or_seed_weights(&self, now: &str) -> PersistResult<Vec<FactorWeight>> {
        for seed in default_factor_weights(now) {
            self.conn.execute(
                r#"
                INSERT OR IGNORE INTO learning_weights (
                    factor_name, prediction_type, current_weight,
                    performance_score, adjustment_count, last_adjusted
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    seed.factor.as_str(),
                    seed.prediction_type,
                    seed.current_weight,
                    seed.performance_score,
                    seed.adjustment_count,
                    seed.last_adjusted,
                ],
            )?;
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT factor_name, prediction_type, current_weight,
                   performance_score, adjustment_count, last_adjusted
            FROM learning_weights
            ORDER BY factor_name ASC, prediction_type ASC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (name, scope, current_weight, performance_score, adjustment_count, last) = row?;
            let Ok(factor) = name.parse() else {
                warn!(factor = %name, "unknown factor in learning_weights, ignored");
                continue;
            };
            out.push(FactorWeight {
                factor,
                prediction_type: scope,
                current_weight,
                performance_score,
                adjustment_count,
                last_adjusted: last,
            });
        }
        Ok(out)
    }

    pub fn save_weight(&self, weight: &FactorWeight) -> PersistResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO learning_weights (
                factor_name, prediction_type, current_weight,
                performance_score, adjustment_count, last_adjusted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(factor_name, prediction_type) DO UPDATE SET
                current_weight = excluded.current_weight,
                performance_score = excluded.performance_score,
                adjustment_count = excluded.adjustment_count,
                last_adjusted = excluded.last_adjusted
            "#,
            params![
                weight.factor.as_str(),
                weight.prediction_type,
                weight.current_weight,
                weight.performance_score,
                weight.adjustment_count,
                weight.last_adjusted,
            ],
        )?;
        Ok(())
    }

    /// `made += 1`, `correct += hit`. Counts only ever grow.
    pub fn accumulate_accuracy(
        &self,
        prediction_type: PredictionType,
        league_id: u32,
        bucket: ConfidenceBucket,
        correct: bool,
        now: &str,
    ) -> PersistResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO prediction_accuracy (
                prediction_type, league_id, confidence_bucket,
                predictions_made, predictions_correct, last_updated
            ) VALUES (?1, ?2, ?3, 1, ?4, ?5)
            ON CONFLICT(prediction_type, league_id, confidence_bucket) DO UPDATE SET
                predictions_made = predictions_made + 1,
                predictions_correct = predictions_correct + excluded.predictions_correct,
                last_updated = excluded.last_updated
            "#,
            params![
                prediction_type.as_str(),
                league_id as i64,
                bucket.as_str(),
                i64::from(correct),
                now,
            ],
        )?;
        Ok(())
    }

    pub fn load_accuracy(&self) -> PersistResult<Vec<AccuracyAggregate>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT prediction_type, league_id, confidence_bucket,
                   predictions_made, predictions_correct
            FROM prediction_accuracy
            ORDER BY prediction_type ASC, league_id ASC, confidence_bucket ASC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u32>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (kind, league_id, bucket, made, correct) = row?;
            out.push(AccuracyAggregate {
                prediction_type: kind.parse().map_err(PersistenceError::Corrupt)?,
                league_id,
                confidence_bucket: bucket.parse().map_err(PersistenceError::Corrupt)?,
                predictions_made: made,
                predictions_correct: correct.min(made),
            });
        }
        Ok(out)
    }
}

/// Runs a write, retrying once. A second failure is logged and the record
/// skipped (`None`).
pub fn with_write_retry<T>(label: &str, mut op: impl FnMut() -> PersistResult<T>) -> Option<T> {
    match op() {
        Ok(value) => Some(value),
        Err(first) => {
            warn!(op = label, error = %first, "write failed, retrying once");
            match op() {
                Ok(value) => Some(value),
                Err(err) => {
                    error!(op = label, error = %err, "write failed twice, record skipped");
                    None
                }
            }
        }
    }
}

pub fn init_schema(conn: &Connection) -> PersistResult<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS predictions (
            fixture_id INTEGER PRIMARY KEY,
            league_id INTEGER NOT NULL,
            match_date TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_win_pct INTEGER NOT NULL,
            draw_pct INTEGER NOT NULL,
            away_win_pct INTEGER NOT NULL,
            over_25_pct INTEGER NOT NULL,
            under_25_pct INTEGER NOT NULL,
            btts_pct INTEGER NOT NULL,
            ht_home_over_05_pct INTEGER NOT NULL,
            ht_away_over_05_pct INTEGER NOT NULL,
            ft_home_over_15_pct INTEGER NOT NULL,
            ft_away_over_15_pct INTEGER NOT NULL,
            goal_lines_json TEXT NOT NULL,
            home_expected_goals REAL NOT NULL,
            away_expected_goals REAL NOT NULL,
            confidence_score REAL NOT NULL,
            actual_home_goals INTEGER NULL,
            actual_away_goals INTEGER NULL,
            actual_ht_home_goals INTEGER NULL,
            actual_ht_away_goals INTEGER NULL,
            actual_result TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_predictions_match_date ON predictions(match_date);
        CREATE INDEX IF NOT EXISTS idx_predictions_result ON predictions(actual_result);

        CREATE TABLE IF NOT EXISTS learning_weights (
            factor_name TEXT NOT NULL,
            prediction_type TEXT NOT NULL,
            current_weight REAL NOT NULL,
            performance_score REAL NOT NULL,
            adjustment_count INTEGER NOT NULL,
            last_adjusted TEXT NULL,
            PRIMARY KEY (factor_name, prediction_type)
        );

        CREATE TABLE IF NOT EXISTS prediction_accuracy (
            prediction_type TEXT NOT NULL,
            league_id INTEGER NOT NULL,
            confidence_bucket TEXT NOT NULL,
            predictions_made INTEGER NOT NULL CHECK (predictions_made >= 0),
            predictions_correct INTEGER NOT NULL CHECK (predictions_correct >= 0),
            last_updated TEXT NOT NULL,
            PRIMARY KEY (prediction_type, league_id, confidence_bucket)
        );
        "#,
    )?;
    Ok(())
}

const PREDICTION_COLUMNS: &str = r#"
    fixture_id, league_id, match_date, home_team, away_team,
    home_win_pct, draw_pct, away_win_pct, over_25_pct, under_25_pct, btts_pct,
    ht_home_over_05_pct, ht_away_over_05_pct, ft_home_over_15_pct, ft_away_over_15_pct,
    goal_lines_json, home_expected_goals, away_expected_goals, confidence_score,
    actual_home_goals, actual_away_goals, actual_ht_home_goals, actual_ht_away_goals,
    created_at, updated_at
"#;

/// Row decoded except for the goal-line JSON.
struct RawPrediction {
    stored: StoredPrediction,
    goal_lines_json: String,
}

fn read_prediction_row(row: &Row<'_>) -> rusqlite::Result<RawPrediction> {
    let fixture_id = row.get::<_, u64>(0)?;
    let result = match (row.get::<_, Option<u8>>(19)?, row.get::<_, Option<u8>>(20)?) {
        (Some(home_goals), Some(away_goals)) => Some(FixtureResult {
            fixture_id,
            home_goals,
            away_goals,
            ht_home_goals: row.get(21)?,
            ht_away_goals: row.get(22)?,
        }),
        _ => None,
    };
    Ok(RawPrediction {
        stored: StoredPrediction {
            fixture_id,
            league_id: row.get(1)?,
            match_date: row.get(2)?,
            home_team: row.get(3)?,
            away_team: row.get(4)?,
            prediction: MatchPrediction {
                home_win: row.get(5)?,
                draw: row.get(6)?,
                away_win: row.get(7)?,
                over_25: row.get(8)?,
                under_25: row.get(9)?,
                btts: row.get(10)?,
                ht_home_over_05: row.get(11)?,
                ht_away_over_05: row.get(12)?,
                ft_home_over_15: row.get(13)?,
                ft_away_over_15: row.get(14)?,
                goal_lines: Vec::new(),
                home_expected_goals: row.get(16)?,
                away_expected_goals: row.get(17)?,
                confidence_score: row.get(18)?,
            },
            result,
            created_at: row.get(23)?,
            updated_at: row.get(24)?,
        },
        goal_lines_json: row.get(15)?,
    })
}

fn finish_prediction(raw: RawPrediction) -> PersistResult<StoredPrediction> {
    let mut stored = raw.stored;
    stored.prediction.goal_lines = serde_json::from_str(&raw.goal_lines_json)?;
    Ok(stored)
}
