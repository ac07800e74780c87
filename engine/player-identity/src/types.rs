use serde::{Deserialize, Serialize};
use std::fmt;

use crate::normalize::{normalize_position, normalize_team};

/// The 32 canonical NFL team abbreviations.
pub const NFL_TEAMS: [&str; 32] = [
    "ARI", "ATL", "BAL", "BUF", "CAR", "CHI", "CIN", "CLE", "DAL", "DEN", "DET", "GB", "HOU",
    "IND", "JAX", "KC", "LV", "LAC", "LAR", "MIA", "MIN", "NE", "NO", "NYG", "NYJ", "PHI", "PIT",
    "SF", "SEA", "TB", "TEN", "WSH",
];

/// Whether `code` is one of the canonical league abbreviations.
pub fn is_nfl_team(code: &str) -> bool {
    NFL_TEAMS.contains(&code)
}

/// A team abbreviation after alias resolution (e.g. "JAC" -> "JAX").
///
/// Codes the alias table does not know pass through uppercased, so a
/// `TeamCode` is not guaranteed to be one of [`NFL_TEAMS`]; use
/// [`TeamCode::is_canonical`] when that matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamCode(String);

impl TeamCode {
    pub(crate) fn from_normalized(code: String) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the code is one of the 32 league teams.
    pub fn is_canonical(&self) -> bool {
        is_nfl_team(&self.0)
    }
}

impl fmt::Display for TeamCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TeamCode {
    fn from(raw: &str) -> Self {
        normalize_team(raw)
    }
}

/// Fantasy position after alias resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum PositionTag {
    QB,
    RB,
    WR,
    TE,
    K,
    /// Team defense / special teams, rendered "D/ST"
    DST,
    /// Unrecognized tag, uppercased
    Other(String),
}

impl PositionTag {
    /// The six positions every provider agrees on.
    pub const FANTASY: [PositionTag; 6] = [
        PositionTag::QB,
        PositionTag::RB,
        PositionTag::WR,
        PositionTag::TE,
        PositionTag::K,
        PositionTag::DST,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            PositionTag::QB => "QB",
            PositionTag::RB => "RB",
            PositionTag::WR => "WR",
            PositionTag::TE => "TE",
            PositionTag::K => "K",
            PositionTag::DST => "D/ST",
            PositionTag::Other(tag) => tag,
        }
    }

    /// Spelling safe for URLs and file names ("D/ST" becomes "DST").
    pub fn slug(&self) -> &str {
        match self {
            PositionTag::DST => "DST",
            other => other.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, PositionTag::Other(_))
    }
}

impl fmt::Display for PositionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for PositionTag {
    fn from(raw: &str) -> Self {
        normalize_position(raw)
    }
}

impl From<String> for PositionTag {
    fn from(raw: String) -> Self {
        normalize_position(&raw)
    }
}

impl From<PositionTag> for String {
    fn from(tag: PositionTag) -> Self {
        tag.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nfl_team_list_is_unique() {
        let mut teams = NFL_TEAMS.to_vec();
        teams.sort_unstable();
        teams.dedup();
        assert_eq!(teams.len(), 32);
    }

    #[test]
    fn test_position_serde_uses_display_form() {
        let json = serde_json::to_string(&PositionTag::DST).unwrap();
        assert_eq!(json, "\"D/ST\"");

        let parsed: PositionTag = serde_json::from_str("\"def\"").unwrap();
        assert_eq!(parsed, PositionTag::DST);
    }

    #[test]
    fn test_position_slug() {
        assert_eq!(PositionTag::DST.slug(), "DST");
        assert_eq!(PositionTag::WR.slug(), "WR");
    }

    #[test]
    fn test_team_code_canonical_flag() {
        assert!(TeamCode::from("jac").is_canonical());
        assert!(!TeamCode::from("xyz").is_canonical());
    }
}
