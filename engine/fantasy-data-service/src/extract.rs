//! Provider field extraction
//!
//! Providers rename fields freely between endpoints and API versions. Each
//! logical field is described by a [`FieldRule`] listing the accepted spellings
//! in priority order; the first candidate holding a usable value wins.

use crate::error::{FantasyError, FantasyResult};
use crate::models::valid_rank;
use player_identity::{normalize_team, TeamCode};
use serde_json::{Map, Value};
use tracing::warn;

/// One logical field and its accepted provider spellings.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub candidates: &'static [&'static str],
}

impl FieldRule {
    pub const fn new(name: &'static str, candidates: &'static [&'static str]) -> Self {
        Self { name, candidates }
    }

    /// First non-empty string (or number rendered as text) among the candidates.
    pub fn text(&self, row: &Map<String, Value>) -> Option<String> {
        self.candidates.iter().find_map(|field| match row.get(*field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// First candidate holding a number or a numeric string.
    pub fn number(&self, row: &Map<String, Value>) -> Option<f64> {
        self.candidates.iter().find_map(|field| match row.get(*field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
    }
}

pub const FANTASYPROS_NAME: FieldRule =
    FieldRule::new("player name", &["player_name", "name", "playerName", "full_name"]);

pub const FANTASYPROS_RANK: FieldRule = FieldRule::new("rank", &["rank_ecr", "rank", "ecr"]);

pub const PLAYER_TEAM: FieldRule =
    FieldRule::new("team", &["player_team_id", "team", "team_abbr", "proTeam", "team_id"]);

pub const PLAYER_BYE: FieldRule =
    FieldRule::new("bye week", &["player_bye_week", "bye_week", "byeWeek", "bye"]);

pub const DVP_TEAM: FieldRule = FieldRule::new(
    "team",
    &["team", "team_abbr", "teamAbbr", "abbreviation", "defense", "team_id"],
);

pub const DVP_RANK: FieldRule =
    FieldRule::new("rank", &["rank", "dvp_rank", "dvpRank", "position_rank", "rk"]);

/// Wrapper keys DvP providers nest their rows under.
pub const DVP_WRAPPERS: &[&str] = &["rows", "data", "teams", "results"];

/// Wrapper keys FantasyPros uses for player lists.
pub const FANTASYPROS_WRAPPERS: &[&str] = &["players", "data", "rows"];

/// Row objects from a body that is either a bare array or wraps one.
///
/// Non-object array elements are skipped. A body holding no row array at all
/// (an error object, a string) is an upstream failure of `source_id`; an
/// empty array is a valid empty result.
pub fn rows<'a>(
    body: &'a Value,
    wrappers: &[&str],
    source_id: &str,
) -> FantasyResult<Vec<&'a Map<String, Value>>> {
    let array = match body {
        Value::Array(items) => Some(items),
        Value::Object(obj) => wrappers.iter().find_map(|key| obj.get(*key)?.as_array()),
        _ => None,
    };

    array
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .ok_or_else(|| FantasyError::upstream(source_id, "unrecognized body shape"))
}

/// One matchup-difficulty row after mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct DvpRow {
    pub team: TeamCode,
    pub rank: u32,
}

/// Typed mapper from provider DvP rows to [`DvpRow`].
#[derive(Debug, Clone, Copy)]
pub struct DvpRowMapper {
    pub team: FieldRule,
    pub rank: FieldRule,
}

impl Default for DvpRowMapper {
    fn default() -> Self {
        Self { team: DVP_TEAM, rank: DVP_RANK }
    }
}

impl DvpRowMapper {
    /// `None` when the row has no team or no positive rank.
    ///
    /// Team codes outside the league list are kept as passthrough but logged.
    pub fn map(&self, row: &Map<String, Value>) -> Option<DvpRow> {
        let team = normalize_team(&self.team.text(row)?);
        if team.is_empty() {
            return None;
        }
        let rank = valid_rank(self.rank.number(row)?)?;

        if !team.is_canonical() {
            warn!("DvP row carries non-league team code '{}', keeping as-is", team);
        }

        Some(DvpRow { team, rank })
    }
}
