//! Configuration for the Fantasy Data Service

use crate::error::FantasyResult;
use crate::models::ScoringType;
use crate::ranks::DEFAULT_RANK_POSITIONS;
use cache_layer::CacheConfig;
use config::{Config, Environment, File};
use player_identity::PositionTag;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FantasyDataConfig {
    /// Upstream HTTP client settings
    pub http: HttpConfig,

    /// FantasyPros public API
    pub fantasypros: FantasyProsConfig,

    /// ESPN site API
    pub espn: EspnConfig,

    /// Rank aggregation
    pub ranks: RanksConfig,

    /// Local ranking tables
    pub tables: TablesConfig,

    /// Matchup difficulty provider
    pub dvp: DvpConfig,

    /// Cache tiers
    pub cache: ServiceCacheConfig,

    /// Background refresh job
    pub refresh: RefreshConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FantasyProsConfig {
    pub base_url: String,

    /// Environment variable holding the API key
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EspnConfig {
    pub scoreboard_url: String,

    /// 1 = preseason, 2 = regular season, 3 = postseason
    pub season_type: u8,
}

/// Where rankings come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankSourceKind {
    FantasyPros,
    Tables,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RanksConfig {
    pub source: RankSourceKind,

    pub positions: Vec<PositionTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablesConfig {
    /// Root of the `<season>/week<week>/<POS>.csv` tree
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DvpConfig {
    /// URL template with `{season}`, `{week}`, `{position}` and `{scoring}` placeholders
    pub url_template: String,

    /// Environment variable holding the provider API key, if one is needed
    pub api_key_env: Option<String>,

    /// Header the key is sent in
    pub api_key_header: String,

    /// TTL of cached provider responses in seconds
    pub http_ttl_secs: u64,

    /// Maximum number of cached provider responses
    pub http_cache_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCacheConfig {
    /// TTL of live rank aggregations in the process-local tier
    pub ranks_ttl_secs: u64,

    /// TTL of resolved bye weeks in the process-local tier
    pub byes_ttl_secs: u64,

    /// TTL of live DvP reports in the process-local tier
    pub dvp_ttl_secs: u64,

    /// Durable tier
    pub durable: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Scoring format refreshed into the durable tier
    pub scoring: ScoringType,

    /// Season to refresh; defaults to the season in progress
    pub season: Option<u16>,

    /// Minutes between refresh runs in periodic mode
    pub interval_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for FantasyDataConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                timeout_secs: 20,
                user_agent: "fantasy-data-service/0.1".to_string(),
            },
            fantasypros: FantasyProsConfig {
                base_url: "https://api.fantasypros.com/public/v2/json/nfl".to_string(),
                api_key_env: "FANTASYPROS_API_KEY".to_string(),
            },
            espn: EspnConfig {
                scoreboard_url: concat!(
                    "https://site.api.espn.com/apis/site/v2/sports/football/nfl",
                    "/scoreboard"
                )
                .to_string(),
                season_type: 2,
            },
            ranks: RanksConfig {
                source: RankSourceKind::FantasyPros,
                positions: DEFAULT_RANK_POSITIONS.to_vec(),
            },
            tables: TablesConfig { root: PathBuf::from("data/ranks") },
            dvp: DvpConfig {
                url_template: concat!(
                    "https://api.fantasypros.com/public/v2/json/nfl/{season}/defense-vs-position",
                    "?position={position}&scoring={scoring}&week={week}"
                )
                .to_string(),
                api_key_env: Some("FANTASYPROS_API_KEY".to_string()),
                api_key_header: "x-api-key".to_string(),
                http_ttl_secs: 6 * 3600, // 6 hours
                http_cache_capacity: 512,
            },
            cache: ServiceCacheConfig {
                ranks_ttl_secs: 15 * 60,
                byes_ttl_secs: 12 * 3600,
                dvp_ttl_secs: 30 * 60,
                durable: CacheConfig::default(),
            },
            refresh: RefreshConfig {
                scoring: ScoringType::Ppr,
                season: None,
                interval_minutes: 360,
            },
            logging: LoggingConfig { level: "info".to_string(), format: "pretty".to_string() },
        }
    }
}

impl FantasyDataConfig {
    /// Defaults, then the optional TOML file, then `FANTASY__SECTION__KEY`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> FantasyResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(Environment::with_prefix("FANTASY").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = FantasyDataConfig::default();
        assert_eq!(config.http_timeout(), Duration::from_secs(20));
        assert_eq!(config.dvp.http_ttl_secs, 21_600);
        assert_eq!(config.ranks.positions.len(), 5);
        assert_eq!(config.refresh.scoring, ScoringType::Ppr);
    }

    #[test]
    fn test_load_without_file_matches_defaults() {
        let config = FantasyDataConfig::load(None).unwrap();
        assert_eq!(config.fantasypros.base_url, FantasyDataConfig::default().fantasypros.base_url);
        assert_eq!(config.ranks.source, RankSourceKind::FantasyPros);
        assert_eq!(config.refresh.season, None);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[ranks]
source = "tables"
positions = ["QB", "D/ST"]

[refresh]
scoring = "half"
season = 2024
"#
        )
        .unwrap();

        let config = FantasyDataConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.ranks.source, RankSourceKind::Tables);
        assert_eq!(config.ranks.positions, vec![PositionTag::QB, PositionTag::DST]);
        assert_eq!(config.refresh.scoring, ScoringType::Half);
        assert_eq!(config.refresh.season, Some(2024));
        assert_eq!(config.http.timeout_secs, 20);
    }
}
