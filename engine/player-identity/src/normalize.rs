//! Pure normalizers for provider-supplied identity strings.
//!
//! None of these functions can fail: unknown or empty input degrades to an
//! uppercased (possibly empty) component instead of an error.

use crate::types::{PositionTag, TeamCode};

/// Separator between the components of a canonical key.
///
/// [`normalize_name`] never emits it and [`canonical_key`] strips it from the
/// team and position components, so keys split unambiguously.
pub const KEY_DELIMITER: char = ':';

/// Legacy, relocated and provider-specific team spellings.
const TEAM_ALIASES: &[(&str, &str)] = &[
    ("JAC", "JAX"),
    ("WAS", "WSH"),
    ("OAK", "LV"),
    ("LVR", "LV"),
    ("SD", "LAC"),
    ("STL", "LAR"),
    ("LA", "LAR"),
    ("ARZ", "ARI"),
    ("BLT", "BAL"),
    ("CLV", "CLE"),
    ("HST", "HOU"),
    ("GNB", "GB"),
    ("KAN", "KC"),
    ("NWE", "NE"),
    ("NOR", "NO"),
    ("SFO", "SF"),
    ("TAM", "TB"),
];

/// Team nicknames used to label team defenses ("Bills D/ST").
const TEAM_NICKNAMES: &[(&str, &str)] = &[
    ("ARI", "Cardinals"),
    ("ATL", "Falcons"),
    ("BAL", "Ravens"),
    ("BUF", "Bills"),
    ("CAR", "Panthers"),
    ("CHI", "Bears"),
    ("CIN", "Bengals"),
    ("CLE", "Browns"),
    ("DAL", "Cowboys"),
    ("DEN", "Broncos"),
    ("DET", "Lions"),
    ("GB", "Packers"),
    ("HOU", "Texans"),
    ("IND", "Colts"),
    ("JAX", "Jaguars"),
    ("KC", "Chiefs"),
    ("LV", "Raiders"),
    ("LAC", "Chargers"),
    ("LAR", "Rams"),
    ("MIA", "Dolphins"),
    ("MIN", "Vikings"),
    ("NE", "Patriots"),
    ("NO", "Saints"),
    ("NYG", "Giants"),
    ("NYJ", "Jets"),
    ("PHI", "Eagles"),
    ("PIT", "Steelers"),
    ("SF", "49ers"),
    ("SEA", "Seahawks"),
    ("TB", "Buccaneers"),
    ("TEN", "Titans"),
    ("WSH", "Commanders"),
];

/// Generational suffixes dropped from the end of a player name.
const NAME_SUFFIXES: &[&str] = &["JR", "SR", "II", "III", "IV", "V"];

/// Canonicalize a provider team code.
pub fn normalize_team(raw: &str) -> TeamCode {
    let code = raw.trim().to_uppercase();
    let resolved = TEAM_ALIASES
        .iter()
        .find(|(alias, _)| *alias == code)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(code);

    TeamCode::from_normalized(resolved)
}

/// Canonicalize a provider position tag.
///
/// Depth-chart slots such as "WR1" or "QB2" resolve to their base position.
pub fn normalize_position(raw: &str) -> PositionTag {
    let tag = raw.trim().to_uppercase();

    if let Some(position) = known_position(&tag) {
        return position;
    }

    let base = tag.trim_end_matches(|c: char| c.is_ascii_digit());
    if base.len() < tag.len() {
        if let Some(position) = known_position(base) {
            return position;
        }
    }

    PositionTag::Other(tag)
}

fn known_position(tag: &str) -> Option<PositionTag> {
    match tag {
        "QB" => Some(PositionTag::QB),
        "RB" | "HB" | "FB" | "TB" => Some(PositionTag::RB),
        "WR" => Some(PositionTag::WR),
        "TE" => Some(PositionTag::TE),
        "K" | "PK" => Some(PositionTag::K),
        "D/ST" | "DST" | "D-ST" | "D ST" | "DEF" | "D" | "DEFENSE" | "DST/DEF" => {
            Some(PositionTag::DST)
        }
        _ => None,
    }
}

/// Canonicalize a player name.
///
/// Uppercases, drops every non-alphabetic character ("A.J." and "AJ" agree),
/// strips trailing generational suffixes and collapses whitespace.
pub fn normalize_name(raw: &str) -> String {
    let cleaned: String = raw
        .to_uppercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphabetic() {
                Some(c)
            } else if c.is_whitespace() {
                Some(' ')
            } else {
                None
            }
        })
        .collect();

    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    while tokens.len() > 1 && tokens.last().is_some_and(|last| NAME_SUFFIXES.contains(last)) {
        tokens.pop();
    }

    tokens.join(" ")
}

/// Composite identity key: `POS:NAME`, or `POS:NAME:TEAM` when a team is given.
pub fn canonical_key(name: &str, team: &str, position: &str) -> String {
    let position = normalize_position(position);
    let name = normalize_name(name);
    let team = normalize_team(team);

    let mut key = strip_delimiter(position.as_str());
    key.push(KEY_DELIMITER);
    key.push_str(&name);

    let team = strip_delimiter(team.as_str());
    if !team.is_empty() {
        key.push(KEY_DELIMITER);
        key.push_str(&team);
    }

    key
}

fn strip_delimiter(component: &str) -> String {
    component.chars().filter(|c| *c != KEY_DELIMITER).collect()
}

/// Display name providers use for a team defense, e.g. "Bills D/ST".
pub fn dst_display_name(team: &str) -> String {
    let team = normalize_team(team);
    let nickname = TEAM_NICKNAMES
        .iter()
        .find(|(code, _)| *code == team.as_str())
        .map(|(_, nickname)| *nickname)
        .unwrap_or(team.as_str());

    format!("{nickname} D/ST")
}
