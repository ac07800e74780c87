//! Player Identity - reconciles players, teams and positions across providers
//!
//! Every upstream provider spells teams, positions and player names a little
//! differently. This crate turns those raw strings into one stable composite
//! key so rows from different providers describing the same real-world player
//! land on the same entry.

pub mod normalize;
pub mod types;

pub use normalize::{
    canonical_key, dst_display_name, normalize_name, normalize_position, normalize_team,
    KEY_DELIMITER,
};
pub use types::{is_nfl_team, PositionTag, TeamCode, NFL_TEAMS};
