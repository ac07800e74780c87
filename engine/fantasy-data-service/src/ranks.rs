//! Consensus rank aggregation
//!
//! One source call per position, issued concurrently. Positions that fail
//! are listed in the report's `missing` manifest; only a total failure
//! surfaces as an error.

use crate::config::{FantasyDataConfig, RankSourceKind};
use crate::error::{FantasyError, FantasyResult};
use crate::extract::{rows, FANTASYPROS_NAME, FANTASYPROS_RANK, FANTASYPROS_WRAPPERS};
use crate::http::{CredentialBundle, HttpFetch, HttpRequest};
use crate::models::{valid_rank, RankReport, RankRequest, RankRow};
use crate::tables::{FsTableStore, TableStore};
use async_trait::async_trait;
use futures::future::join_all;
use player_identity::{canonical_key, PositionTag};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Header FantasyPros reads its API key from.
pub const FANTASYPROS_KEY_HEADER: &str = "x-api-key";

/// Positions ranked when none are configured.
pub const DEFAULT_RANK_POSITIONS: [PositionTag; 5] =
    [PositionTag::QB, PositionTag::RB, PositionTag::WR, PositionTag::TE, PositionTag::K];

/// A provider of per-position ranking rows.
#[async_trait]
pub trait RankSource: Send + Sync {
    /// Short provider name used in durable keys, e.g. "fantasypros".
    fn name(&self) -> &str;

    /// Identifier for one position's source, recorded when it fails.
    fn source_id(&self, request: &RankRequest, position: &PositionTag) -> String;

    async fn fetch_rows(
        &self,
        request: &RankRequest,
        position: &PositionTag,
    ) -> FantasyResult<Vec<RankRow>>;
}

/// Weekly expert consensus rankings from the FantasyPros public API.
pub struct FantasyProsRankSource {
    http: Arc<dyn HttpFetch>,
    base_url: String,
    credentials: CredentialBundle,
}

impl FantasyProsRankSource {
    pub fn new(
        http: Arc<dyn HttpFetch>,
        base_url: impl Into<String>,
        credentials: CredentialBundle,
    ) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_string(), credentials }
    }

    fn url(&self, request: &RankRequest, position: &PositionTag) -> String {
        format!(
            "{}/{}/consensus-rankings?position={}&scoring={}&type=weekly&week={}",
            self.base_url,
            request.season,
            position.slug(),
            request.scoring.fantasypros_code(),
            request.week
        )
    }
}

#[async_trait]
impl RankSource for FantasyProsRankSource {
    fn name(&self) -> &str {
        "fantasypros"
    }

    fn source_id(&self, request: &RankRequest, position: &PositionTag) -> String {
        self.url(request, position)
    }

    async fn fetch_rows(
        &self,
        request: &RankRequest,
        position: &PositionTag,
    ) -> FantasyResult<Vec<RankRow>> {
        if self.credentials.header(FANTASYPROS_KEY_HEADER).is_none() {
            return Err(FantasyError::Auth(format!(
                "FantasyPros requires the {FANTASYPROS_KEY_HEADER} header"
            )));
        }

        let source_id = self.source_id(request, position);
        let http_request = HttpRequest::parse(&self.url(request, position), source_id.clone())?
            .with_credentials(self.credentials.clone());
        let body = self.http.get_json(&http_request).await?;

        Ok(rows(&body, FANTASYPROS_WRAPPERS, &source_id)?
            .into_iter()
            .filter_map(|row| {
                Some(RankRow {
                    name: FANTASYPROS_NAME.text(row)?,
                    rank: FANTASYPROS_RANK.number(row),
                })
            })
            .collect())
    }
}

/// Rankings read from stored CSV tables.
pub struct CsvRankSource {
    tables: Arc<dyn TableStore>,
}

impl CsvRankSource {
    pub fn new(tables: Arc<dyn TableStore>) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl RankSource for CsvRankSource {
    fn name(&self) -> &str {
        "tables"
    }

    fn source_id(&self, request: &RankRequest, position: &PositionTag) -> String {
        self.tables.locate(request, position)
    }

    async fn fetch_rows(
        &self,
        request: &RankRequest,
        position: &PositionTag,
    ) -> FantasyResult<Vec<RankRow>> {
        self.tables.read_table(request, position).await
    }
}

/// Merges one source's per-position rows into a single ranking.
pub struct RankAggregator {
    source: Arc<dyn RankSource>,
    positions: Vec<PositionTag>,
}

impl RankAggregator {
    pub fn new(source: Arc<dyn RankSource>, positions: Vec<PositionTag>) -> Self {
        Self { source, positions }
    }

    pub fn with_default_positions(source: Arc<dyn RankSource>) -> Self {
        Self::new(source, DEFAULT_RANK_POSITIONS.to_vec())
    }

    /// Aggregator over the configured rank source.
    pub fn from_config(config: &FantasyDataConfig, http: Arc<dyn HttpFetch>) -> Self {
        let source: Arc<dyn RankSource> = match config.ranks.source {
            RankSourceKind::FantasyPros => {
                let key_env = &config.fantasypros.api_key_env;
                let credentials = CredentialBundle::from_env(FANTASYPROS_KEY_HEADER, key_env);
                if credentials.is_empty() {
                    warn!("{} is not set; FantasyPros rankings will be unavailable", key_env);
                }
                let base_url = config.fantasypros.base_url.clone();
                Arc::new(FantasyProsRankSource::new(http, base_url, credentials))
            }
            RankSourceKind::Tables => {
                let tables = Arc::new(FsTableStore::new(config.tables.root.clone()));
                Arc::new(CsvRankSource::new(tables))
            }
        };

        info!("Rank source: {} over {} positions", source.name(), config.ranks.positions.len());
        Self::new(source, config.ranks.positions.clone())
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn positions(&self) -> &[PositionTag] {
        &self.positions
    }

    pub async fn aggregate(&self, request: &RankRequest) -> FantasyResult<RankReport> {
        let fetches = self.positions.iter().map(|position| async move {
            (position, self.source.fetch_rows(request, position).await)
        });
        let results = join_all(fetches).await;

        let mut ranks = BTreeMap::new();
        let mut missing = Vec::new();
        let mut failures = Vec::new();
        let mut credential_missing = false;

        for (position, result) in results {
            match result {
                Ok(rows) => merge_rows(&mut ranks, position, rows),
                Err(err) => {
                    let source_id = self.source.source_id(request, position);
                    warn!("Rank source {} failed: {}", source_id, err);
                    credential_missing |= matches!(err, FantasyError::Auth(_));
                    failures.push(err.to_string());
                    missing.push(source_id);
                }
            }
        }

        if !self.positions.is_empty() && missing.len() == self.positions.len() {
            let message = failures.join("; ");
            return Err(if credential_missing {
                FantasyError::Auth(message)
            } else {
                FantasyError::upstream(self.source.name(), message)
            });
        }

        info!(
            "Aggregated {} ranks for {} week {} ({}), {} sources missing",
            ranks.len(),
            request.season,
            request.week,
            request.scoring,
            missing.len()
        );

        Ok(RankReport {
            season: request.season,
            week: request.week,
            scoring: request.scoring,
            count: ranks.len(),
            ranks,
            missing,
        })
    }
}

/// Fold `rows` into `ranks`, keeping the lowest rank per canonical key.
///
/// Rows whose rank is missing, non-finite or not positive are dropped.
pub fn merge_rows(ranks: &mut BTreeMap<String, u32>, position: &PositionTag, rows: Vec<RankRow>) {
    for row in rows {
        let Some(rank) = row.rank.and_then(valid_rank) else {
            continue;
        };
        let key = canonical_key(&row.name, "", position.as_str());

        match ranks.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(rank);
            }
            Entry::Occupied(mut slot) => {
                if *slot.get() != rank {
                    debug!("Rank disagreement for {}: {} vs {}", slot.key(), slot.get(), rank);
                }
                if rank < *slot.get() {
                    slot.insert(rank);
                }
            }
        }
    }
}
