use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::http_client::REQUEST_TIMEOUT_SECS;
use crate::learner::LearningConfig;
use crate::sportmonks::DEFAULT_BASE_URL;

const CACHE_DIR: &str = "momentum_predictor";
const DB_FILE: &str = "predictions.sqlite";
const DEFAULT_LEAGUES: [u32; 2] = [501, 271];
const DEFAULT_RATE_LIMIT_CALLS: usize = 150;
const DEFAULT_RATE_LIMIT_PERIOD_SECS: u64 = 60;
const DEFAULT_RECENT_MATCH_LIMIT: usize = 10;

/// Fatal: raised before any network activity.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{0}")]
    Inconsistent(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub db_path: PathBuf,
    pub league_ids: Vec<u32>,
    pub rate_limit_calls: usize,
    pub rate_limit_period: Duration,
    pub request_timeout: Duration,
    pub recent_match_limit: usize,
    pub parallel_fetch: bool,
    pub learning: LearningConfig,
    pub export_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("SPORTMONKS_API_KEY").ok_or(ConfigError::Missing("SPORTMONKS_API_KEY"))?;
        let base_url = get("SPORTMONKS_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let db_path = match get("PREDICTOR_DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_db_path(&get)
                .ok_or(ConfigError::Missing("PREDICTOR_DB_PATH (no HOME or XDG_CACHE_HOME)"))?,
        };

        let league_ids = match get("PREDICTOR_LEAGUES") {
            Some(raw) => parse_leagues(&raw).ok_or(ConfigError::Invalid {
                key: "PREDICTOR_LEAGUES",
                value: raw,
            })?,
            None => DEFAULT_LEAGUES.to_vec(),
        };

        let rate_limit_calls =
            parse_or(&get, "RATE_LIMIT_CALLS", DEFAULT_RATE_LIMIT_CALLS)?;
        if rate_limit_calls == 0 {
            return Err(ConfigError::Inconsistent(
                "RATE_LIMIT_CALLS must be at least 1".to_string(),
            ));
        }
        let rate_limit_period = Duration::from_secs(parse_or(
            &get,
            "RATE_LIMIT_PERIOD",
            DEFAULT_RATE_LIMIT_PERIOD_SECS,
        )?);
        let request_timeout =
            Duration::from_secs(parse_or(&get, "API_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS)?);
        let recent_match_limit =
            parse_or(&get, "RECENT_MATCH_LIMIT", DEFAULT_RECENT_MATCH_LIMIT)?;
        let parallel_fetch = get("PREDICTOR_PARALLEL_FETCH")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let defaults = LearningConfig::default();
        let learning = LearningConfig {
            learning_rate: parse_or(&get, "LEARNING_RATE", defaults.learning_rate)?,
            min_samples: parse_or(&get, "MIN_SAMPLES_FOR_LEARNING", defaults.min_samples)?,
            threshold_high: parse_or(&get, "ACCURACY_THRESHOLD_HIGH", defaults.threshold_high)?,
            threshold_low: parse_or(&get, "ACCURACY_THRESHOLD_LOW", defaults.threshold_low)?,
            weight_min: parse_or(&get, "WEIGHT_MIN", defaults.weight_min)?,
            weight_max: parse_or(&get, "WEIGHT_MAX", defaults.weight_max)?,
        };
        if learning.weight_min > learning.weight_max {
            return Err(ConfigError::Inconsistent(format!(
                "WEIGHT_MIN {} exceeds WEIGHT_MAX {}",
                learning.weight_min, learning.weight_max
            )));
        }
        if learning.threshold_low > learning.threshold_high {
            return Err(ConfigError::Inconsistent(format!(
                "ACCURACY_THRESHOLD_LOW {} exceeds ACCURACY_THRESHOLD_HIGH {}",
                learning.threshold_low, learning.threshold_high
            )));
        }

        Ok(Self {
            api_key,
            base_url,
            db_path,
            league_ids,
            rate_limit_calls,
            rate_limit_period,
            request_timeout,
            recent_match_limit,
            parallel_fetch,
            learning,
            export_path: get("PREDICTOR_EXPORT_PATH").map(PathBuf::from),
        })
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> bool {
    let t = raw.trim().to_ascii_lowercase();
    !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
}

pub fn parse_leagues(raw: &str) -> Option<Vec<u32>> {
    let ids: Vec<u32> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect::<Option<_>>()?;
    if ids.is_empty() { None } else { Some(ids) }
}

fn default_db_path(get: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(base) = get("XDG_CACHE_HOME") {
        return Some(PathBuf::from(base).join(CACHE_DIR).join(DB_FILE));
    }
    let home = get("HOME")?;
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR).join(DB_FILE))
}
