//! Defense-vs-position (DvP) matchup difficulty

use crate::error::{FantasyError, FantasyResult};
use crate::extract::{rows, DvpRowMapper, DVP_WRAPPERS};
use crate::http::{CredentialBundle, HttpFetch, HttpRequest};
use crate::models::{DvpReport, RankRequest};
use futures::future::join_all;
use player_identity::{normalize_position, PositionTag};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Resolve caller-supplied position names, rejecting empty or unknown input.
pub fn parse_positions<S: AsRef<str>>(raw: &[S]) -> FantasyResult<Vec<PositionTag>> {
    if raw.is_empty() {
        return Err(FantasyError::Validation("at least one position is required".to_string()));
    }

    let mut positions = Vec::with_capacity(raw.len());
    for name in raw {
        let position = normalize_position(name.as_ref());
        if !position.is_known() {
            return Err(FantasyError::Validation(format!("unknown position '{}'", name.as_ref())));
        }
        if !positions.contains(&position) {
            positions.push(position);
        }
    }
    Ok(positions)
}

/// Per-position matchup difficulty from a configurable provider endpoint.
///
/// The URL template may reference `{season}`, `{week}`, `{position}` and
/// `{scoring}`. `http` is normally a [`crate::http::CachedFetcher`].
pub struct DvpAggregator {
    http: Arc<dyn HttpFetch>,
    url_template: String,
    credentials: CredentialBundle,
    mapper: DvpRowMapper,
}

impl DvpAggregator {
    pub fn new(
        http: Arc<dyn HttpFetch>,
        url_template: impl Into<String>,
        credentials: CredentialBundle,
    ) -> Self {
        Self {
            http,
            url_template: url_template.into(),
            credentials,
            mapper: DvpRowMapper::default(),
        }
    }

    pub fn with_mapper(mut self, mapper: DvpRowMapper) -> Self {
        self.mapper = mapper;
        self
    }

    fn url(&self, request: &RankRequest, position: &PositionTag) -> String {
        self.url_template
            .replace("{season}", &request.season.to_string())
            .replace("{week}", &request.week.to_string())
            .replace("{position}", position.slug())
            .replace("{scoring}", request.scoring.fantasypros_code())
    }

    async fn fetch_position(
        &self,
        request: &RankRequest,
        position: &PositionTag,
    ) -> FantasyResult<Vec<(String, u32)>> {
        let source_id = format!("dvp-{}", position.slug());
        let http_request = HttpRequest::parse(&self.url(request, position), source_id.clone())?
            .with_credentials(self.credentials.clone());
        let body = self.http.get_json(&http_request).await?;

        Ok(rows(&body, DVP_WRAPPERS, &source_id)?
            .into_iter()
            .filter_map(|row| self.mapper.map(row))
            .map(|row| (format!("{}|{}", row.team, position), row.rank))
            .collect())
    }

    pub async fn aggregate(
        &self,
        request: &RankRequest,
        positions: &[PositionTag],
    ) -> FantasyResult<DvpReport> {
        let fetches = positions.iter().map(|position| async move {
            (position, self.fetch_position(request, position).await)
        });
        let results = join_all(fetches).await;

        let mut dvp_map = BTreeMap::new();
        let mut missing = Vec::new();
        let mut failures = Vec::new();

        for (position, result) in results {
            match result {
                Ok(entries) => dvp_map.extend(entries),
                Err(err) => {
                    warn!("DvP fetch for {} failed: {}", position, err);
                    failures.push(err.to_string());
                    missing.push(position.to_string());
                }
            }
        }

        if !positions.is_empty() && missing.len() == positions.len() {
            return Err(FantasyError::upstream("dvp", failures.join("; ")));
        }

        info!(
            "Aggregated {} DvP entries for {} week {}, {} positions missing",
            dvp_map.len(),
            request.season,
            request.week,
            missing.len()
        );

        Ok(DvpReport {
            season: request.season,
            week: request.week,
            scoring: request.scoring,
            count: dvp_map.len(),
            dvp_map,
            missing,
        })
    }
}
