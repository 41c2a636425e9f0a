use chrono::NaiveDate;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::debug;

use crate::error::SourceError;
use crate::fetch_client::{FixturePage, MatchSource};
use crate::types::{Fixture, FixtureResult, MatchRecord};

pub const DEFAULT_BASE_URL: &str = "https://api.sportmonks.com/v3/football";
const FIXTURES_PER_PAGE: u32 = 50;
const FINISHED_STATES: &[&str] = &["FT", "AET", "FT_PEN"];
const MAX_ERROR_BODY: usize = 200;

/// Sportmonks v3 football API. Every method is exactly one HTTP request;
/// throttling and retries belong to `CachingFetchClient`.
pub struct SportmonksSource {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SportmonksSource {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn get(&self, url: &str) -> Result<String, SourceError> {
        debug!(url, "sportmonks request");
        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, &self.api_key)
            .send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            let mut snippet = body;
            if snippet.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !snippet.is_char_boundary(cut) {
                    cut -= 1;
                }
                snippet.truncate(cut);
            }
            return Err(SourceError::from_status(status.as_u16(), snippet));
        }
        Ok(body)
    }
}

impl MatchSource for SportmonksSource {
    fn list_fixtures(
        &self,
        league_id: u32,
        from: NaiveDate,
        to: NaiveDate,
        page: u32,
    ) -> Result<FixturePage, SourceError> {
        let url = format!(
            "{}/fixtures/between/{}/{}?include=participants&filters=fixtureLeagues:{league_id}&per_page={FIXTURES_PER_PAGE}&page={page}",
            self.base_url,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d"),
        );
        let body = self.get(&url)?;
        parse_fixtures_json(&body, league_id)
    }

    fn list_recent_matches(
        &self,
        team_id: u32,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        let url = format!(
            "{}/teams/{team_id}?include=latest.participants;latest.scores",
            self.base_url
        );
        let body = self.get(&url)?;
        parse_team_matches_json(&body, limit)
    }

    fn fetch_result(&self, fixture_id: u64) -> Result<Option<FixtureResult>, SourceError> {
        let url = format!(
            "{}/fixtures/{fixture_id}?include=participants;scores;state",
            self.base_url
        );
        let body = self.get(&url)?;
        parse_fixture_result_json(&body)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct SmFixture {
    id: u64,
    #[serde(default)]
    league_id: Option<u32>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    starting_at: Option<String>,
    #[serde(default)]
    participants: Vec<SmParticipant>,
    #[serde(default)]
    scores: Vec<SmScore>,
    #[serde(default)]
    state: Option<SmState>,
}

#[derive(Debug, Deserialize)]
struct SmParticipant {
    id: u32,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    meta: Option<SmMeta>,
}

#[derive(Debug, Deserialize)]
struct SmMeta {
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SmScore {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    score: Option<SmScoreValue>,
}

#[derive(Debug, Deserialize)]
struct SmScoreValue {
    #[serde(default)]
    goals: Option<u32>,
    #[serde(default)]
    participant: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SmState {
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    developer_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SmTeam {
    #[serde(default)]
    latest: Vec<SmFixture>,
}

impl SmFixture {
    fn participant(&self, location: &str) -> Option<&SmParticipant> {
        self.participants.iter().find(|p| {
            p.meta
                .as_ref()
                .and_then(|m| m.location.as_deref())
                .is_some_and(|l| l.eq_ignore_ascii_case(location))
        })
    }

    fn goals(&self, descriptions: &[&str], location: &str) -> Option<u8> {
        self.scores.iter().find_map(|s| {
            let desc = s.description.as_deref()?;
            if !descriptions.iter().any(|d| d.eq_ignore_ascii_case(desc)) {
                return None;
            }
            let value = s.score.as_ref()?;
            let side = value.participant.as_deref()?;
            if !side.eq_ignore_ascii_case(location) {
                return None;
            }
            value.goals.and_then(|g| u8::try_from(g).ok())
        })
    }

    fn full_time(&self) -> Option<(u8, u8)> {
        Some((
            self.goals(&["CURRENT"], "home")?,
            self.goals(&["CURRENT"], "away")?,
        ))
    }

    fn half_time(&self) -> (Option<u8>, Option<u8>) {
        const HT: &[&str] = &["1ST_HALF", "HT"];
        (self.goals(HT, "home"), self.goals(HT, "away"))
    }

    fn is_finished(&self) -> bool {
        let Some(state) = self.state.as_ref() else {
            return false;
        };
        [state.short_name.as_deref(), state.developer_name.as_deref()]
            .into_iter()
            .flatten()
            .any(|s| FINISHED_STATES.iter().any(|f| f.eq_ignore_ascii_case(s)))
    }
}

fn decode<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<Envelope<T>, SourceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(SourceError::Malformed("empty response".to_string()));
    }
    Ok(serde_json::from_str(trimmed)?)
}

pub fn parse_fixtures_json(raw: &str, league_id: u32) -> Result<FixturePage, SourceError> {
    let envelope: Envelope<Vec<SmFixture>> = decode(raw)?;
    let has_more = envelope.pagination.is_some_and(|p| p.has_more);
    let mut fixtures = Vec::new();
    for item in envelope.data.unwrap_or_default() {
        let (Some(home), Some(away)) = (item.participant("home"), item.participant("away")) else {
            debug!(fixture_id = item.id, "fixture without home/away participants");
            continue;
        };
        let home_team = home.name.clone().unwrap_or_else(|| "Unknown".to_string());
        let away_team = away.name.clone().unwrap_or_else(|| "Unknown".to_string());
        fixtures.push(Fixture {
            id: item.id,
            league_id: item.league_id.unwrap_or(league_id),
            name: item
                .name
                .clone()
                .unwrap_or_else(|| format!("{home_team} vs {away_team}")),
            starting_at: item.starting_at.clone().unwrap_or_default(),
            home_team_id: home.id,
            away_team_id: away.id,
            home_team,
            away_team,
        });
    }
    Ok(FixturePage { fixtures, has_more })
}

/// Finished matches only, most-recent-first, at most `limit`.
pub fn parse_team_matches_json(raw: &str, limit: usize) -> Result<Vec<MatchRecord>, SourceError> {
    let envelope: Envelope<SmTeam> = decode(raw)?;
    let team = envelope
        .data
        .ok_or_else(|| SourceError::Malformed("team payload without data".to_string()))?;

    let mut out = Vec::new();
    for item in &team.latest {
        let (Some(home), Some(away)) = (item.participant("home"), item.participant("away")) else {
            continue;
        };
        let Some((home_goals, away_goals)) = item.full_time() else {
            continue;
        };
        let (ht_home_goals, ht_away_goals) = item.half_time();
        out.push(MatchRecord {
            id: item.id,
            date: item.starting_at.clone().unwrap_or_default(),
            home_team_id: home.id,
            away_team_id: away.id,
            home_goals,
            away_goals,
            ht_home_goals,
            ht_away_goals,
        });
    }

    out.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    out.truncate(limit);
    Ok(out)
}

/// `None` while the fixture has not finished.
pub fn parse_fixture_result_json(raw: &str) -> Result<Option<FixtureResult>, SourceError> {
    let envelope: Envelope<SmFixture> = decode(raw)?;
    let fixture = envelope
        .data
        .ok_or_else(|| SourceError::Malformed("fixture payload without data".to_string()))?;
    if !fixture.is_finished() {
        return Ok(None);
    }
    let Some((home_goals, away_goals)) = fixture.full_time() else {
        return Ok(None);
    };
    let (ht_home_goals, ht_away_goals) = fixture.half_time();
    Ok(Some(FixtureResult {
        fixture_id: fixture.id,
        home_goals,
        away_goals,
        ht_home_goals,
        ht_away_goals,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_malformed() {
        assert!(matches!(
            parse_fixtures_json("  ", 1),
            Err(SourceError::Malformed(_))
        ));
        assert!(matches!(
            parse_team_matches_json("null", 5),
            Err(SourceError::Malformed(_))
        ));
    }

    #[test]
    fn unfinished_fixture_has_no_result() {
        let raw = r#"{"data":{"id":9,"state":{"short_name":"NS"},"scores":[]}}"#;
        assert_eq!(parse_fixture_result_json(raw).ok(), Some(None));
    }
}
