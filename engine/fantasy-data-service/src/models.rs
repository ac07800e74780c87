use crate::error::{FantasyError, FantasyResult};
use chrono::{Datelike, Utc};
use player_identity::TeamCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Last week of the regular season.
pub const MAX_WEEK: u8 = 18;

/// Seasons accepted by the read surface.
pub const SEASON_RANGE: std::ops::RangeInclusive<u16> = 2000..=2100;

/// Fantasy scoring format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringType {
    #[serde(rename = "std")]
    Standard,
    Half,
    Ppr,
}

impl ScoringType {
    /// Spelling FantasyPros expects in its `scoring` parameter.
    pub fn fantasypros_code(&self) -> &'static str {
        match self {
            ScoringType::Standard => "STD",
            ScoringType::Half => "HALF",
            ScoringType::Ppr => "PPR",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringType::Standard => "std",
            ScoringType::Half => "half",
            ScoringType::Ppr => "ppr",
        }
    }
}

impl fmt::Display for ScoringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringType {
    type Err = FantasyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "std" | "standard" => Ok(ScoringType::Standard),
            "half" | "half-ppr" | "half_ppr" => Ok(ScoringType::Half),
            "ppr" => Ok(ScoringType::Ppr),
            other => Err(FantasyError::Validation(format!("unknown scoring type '{other}'"))),
        }
    }
}

/// Scope shared by rank and matchup requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankRequest {
    pub season: u16,
    pub week: u8,
    pub scoring: ScoringType,
}

impl RankRequest {
    /// Validated request from raw caller input.
    pub fn new(season: u16, week: u8, scoring: &str) -> FantasyResult<Self> {
        validate_season(season)?;
        if !(1..=MAX_WEEK).contains(&week) {
            return Err(FantasyError::Validation(format!("week {week} is outside 1-{MAX_WEEK}")));
        }
        Ok(Self { season, week, scoring: scoring.parse()? })
    }

    /// Durable-tier key for a week of rankings from `source`.
    pub fn durable_key(&self, source: &str) -> String {
        format!("ranks:{}-{}:{}:{}", source, self.scoring, self.season, self.week)
    }
}

pub fn validate_season(season: u16) -> FantasyResult<()> {
    if SEASON_RANGE.contains(&season) {
        Ok(())
    } else {
        Err(FantasyError::Validation(format!("season {season} is out of range")))
    }
}

/// NFL season in progress: the calendar year, or the previous one before March.
pub fn current_season() -> u16 {
    let today = Utc::now().date_naive();
    let year = if today.month() < 3 { today.year() - 1 } else { today.year() };
    u16::try_from(year).unwrap_or(*SEASON_RANGE.start())
}

/// One (name, rank) pair read from a ranking table, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RankRow {
    pub name: String,
    pub rank: Option<f64>,
}

impl RankRow {
    pub fn new(name: impl Into<String>, rank: f64) -> Self {
        Self { name: name.into(), rank: Some(rank) }
    }
}

/// Merged consensus ranks for one (season, week, scoring).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankReport {
    pub season: u16,
    pub week: u8,
    pub scoring: ScoringType,
    /// canonical key -> best rank seen
    pub ranks: BTreeMap<String, u32>,
    /// Identifiers of position sources that could not be read
    pub missing: Vec<String>,
    pub count: usize,
}

/// Defense-vs-position difficulty for one (season, week, scoring).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DvpReport {
    pub season: u16,
    pub week: u8,
    pub scoring: ScoringType,
    /// "TEAM|POS" -> rank
    pub dvp_map: BTreeMap<String, u32>,
    /// Positions whose provider request failed
    pub missing: Vec<String>,
    pub count: usize,
}

/// Which strategy produced a bye-week map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByeWeekSource {
    /// Mode of per-player bye weeks
    Players,
    /// Elimination scan over weekly scoreboards
    Scoreboard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByeWeekReport {
    pub season: u16,
    /// Teams without an entry are data gaps, not errors.
    pub bye_weeks: BTreeMap<TeamCode, u8>,
    pub source: ByeWeekSource,
}

/// Accept only integral weeks 1-18.
pub fn valid_week(value: f64) -> Option<u8> {
    if value.is_finite() && value.fract() == 0.0 && (1.0..=f64::from(MAX_WEEK)).contains(&value) {
        Some(value as u8)
    } else {
        None
    }
}

/// Accept finite, positive ranks, rounded to the nearest integer.
pub fn valid_rank(value: f64) -> Option<u32> {
    if value.is_finite() && value > 0.0 && value <= f64::from(u32::MAX) {
        Some((value.round() as u32).max(1))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_type_parsing() {
        assert_eq!("PPR".parse::<ScoringType>().unwrap(), ScoringType::Ppr);
        assert_eq!("half-ppr".parse::<ScoringType>().unwrap(), ScoringType::Half);
        assert_eq!("standard".parse::<ScoringType>().unwrap(), ScoringType::Standard);
        assert!("superflex".parse::<ScoringType>().is_err());
    }

    #[test]
    fn test_scoring_type_serde() {
        assert_eq!(serde_json::to_string(&ScoringType::Standard).unwrap(), "\"std\"");
        assert_eq!(serde_json::to_string(&ScoringType::Ppr).unwrap(), "\"ppr\"");
    }

    #[test]
    fn test_rank_request_validation() {
        assert!(RankRequest::new(2025, 1, "ppr").is_ok());
        assert!(matches!(RankRequest::new(2025, 0, "ppr"), Err(FantasyError::Validation(_))));
        assert!(matches!(RankRequest::new(2025, 19, "ppr"), Err(FantasyError::Validation(_))));
        assert!(matches!(RankRequest::new(1999, 1, "ppr"), Err(FantasyError::Validation(_))));
        assert!(matches!(RankRequest::new(2025, 1, "dynasty"), Err(FantasyError::Validation(_))));
    }

    #[test]
    fn test_durable_key_scopes_source_season_week() {
        let request = RankRequest::new(2025, 3, "half").unwrap();
        assert_eq!(request.durable_key("fantasypros"), "ranks:fantasypros-half:2025:3");
    }

    #[test]
    fn test_valid_week() {
        assert_eq!(valid_week(14.0), Some(14));
        assert_eq!(valid_week(18.0), Some(18));
        assert_eq!(valid_week(0.0), None);
        assert_eq!(valid_week(19.0), None);
        assert_eq!(valid_week(7.5), None);
        assert_eq!(valid_week(f64::NAN), None);
    }

    #[test]
    fn test_valid_rank() {
        assert_eq!(valid_rank(3.0), Some(3));
        assert_eq!(valid_rank(2.6), Some(3));
        assert_eq!(valid_rank(0.2), Some(1));
        assert_eq!(valid_rank(0.0), None);
        assert_eq!(valid_rank(-4.0), None);
        assert_eq!(valid_rank(f64::INFINITY), None);
    }

    #[test]
    fn test_dvp_report_uses_camel_case() {
        let report = DvpReport {
            season: 2025,
            week: 1,
            scoring: ScoringType::Ppr,
            dvp_map: BTreeMap::from([("SF|RB".to_string(), 3)]),
            missing: vec![],
            count: 1,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["dvpMap"]["SF|RB"], 3);
    }
}
