//! Read surface over the aggregators and cache tiers
//!
//! Rankings are served from the durable tier when the refresh job has already
//! stored them; anything else is aggregated live and memoized in-process with
//! single-flight protection.

use crate::config::{FantasyDataConfig, ServiceCacheConfig};
use crate::dvp::{parse_positions, DvpAggregator};
use crate::error::{FantasyError, FantasyResult};
use crate::http::{CachedFetcher, CredentialBundle, HttpFetch};
use crate::models::{validate_season, ByeWeekReport, DvpReport, RankReport, RankRequest};
use crate::ranks::{RankAggregator, FANTASYPROS_KEY_HEADER};
use crate::schedule::{EspnScoreboardFeed, HttpPlayerFeed, ScheduleResolver};
use crate::scheduler::RefreshScheduler;
use cache_layer::{
    CacheStats, Clock, DurableReader, DurableStore, DurableWriter, MemoCache, SystemClock,
};
use player_identity::PositionTag;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// TTLs of the process-local tier
#[derive(Debug, Clone, Copy)]
pub struct ServiceTtls {
    pub ranks: Duration,
    pub byes: Duration,
    pub dvp: Duration,
}

impl From<&ServiceCacheConfig> for ServiceTtls {
    fn from(config: &ServiceCacheConfig) -> Self {
        Self {
            ranks: Duration::from_secs(config.ranks_ttl_secs),
            byes: Duration::from_secs(config.byes_ttl_secs),
            dvp: Duration::from_secs(config.dvp_ttl_secs),
        }
    }
}

/// Fantasy data read service
pub struct FantasyDataService {
    schedule: ScheduleResolver,
    ranks: Arc<RankAggregator>,
    dvp: DvpAggregator,
    durable: DurableReader,
    refresher: Option<Arc<RefreshScheduler>>,
    byes_cache: MemoCache<u16, ByeWeekReport>,
    ranks_cache: MemoCache<RankRequest, RankReport>,
    dvp_cache: MemoCache<(RankRequest, Vec<PositionTag>), DvpReport>,
    ttls: ServiceTtls,
}

impl FantasyDataService {
    pub fn new(
        schedule: ScheduleResolver,
        ranks: Arc<RankAggregator>,
        dvp: DvpAggregator,
        durable: DurableReader,
        ttls: ServiceTtls,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            schedule,
            ranks,
            dvp,
            durable,
            refresher: None,
            byes_cache: MemoCache::new(clock.clone()),
            ranks_cache: MemoCache::new(clock.clone()),
            dvp_cache: MemoCache::new(clock),
            ttls,
        }
    }

    /// Attach the job that [`Self::refresh_all`] delegates to.
    pub fn with_refresher(mut self, refresher: Arc<RefreshScheduler>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Wire every component from configuration.
    ///
    /// `store` backs both the reader held here and the writer handed to the
    /// attached refresh job.
    pub fn from_config(
        config: &FantasyDataConfig,
        http: Arc<dyn HttpFetch>,
        store: Arc<dyn DurableStore>,
    ) -> FantasyResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let fantasypros_key =
            CredentialBundle::from_env(FANTASYPROS_KEY_HEADER, &config.fantasypros.api_key_env);

        let schedule = ScheduleResolver::new(
            Arc::new(HttpPlayerFeed::new(
                http.clone(),
                config.fantasypros.base_url.clone(),
                fantasypros_key,
            )),
            Arc::new(EspnScoreboardFeed::new(
                http.clone(),
                config.espn.scoreboard_url.clone(),
                config.espn.season_type,
            )),
        );

        let ranks = Arc::new(RankAggregator::from_config(config, http.clone()));

        let dvp_credentials = match &config.dvp.api_key_env {
            Some(var) => CredentialBundle::from_env(&config.dvp.api_key_header, var),
            None => CredentialBundle::new(),
        };
        let dvp_http = Arc::new(CachedFetcher::new(
            http,
            Duration::from_secs(config.dvp.http_ttl_secs),
            config.dvp.http_cache_capacity,
            clock.clone(),
        ));
        let dvp = DvpAggregator::new(dvp_http, config.dvp.url_template.clone(), dvp_credentials);

        let refresher = Arc::new(RefreshScheduler::from_config(
            config,
            ranks.clone(),
            DurableWriter::new(store.clone()),
        ));

        info!("Fantasy data service ready (rank source: {})", ranks.source_name());

        Ok(Self::new(
            schedule,
            ranks,
            dvp,
            DurableReader::new(store),
            ServiceTtls::from(&config.cache),
            clock,
        )
        .with_refresher(refresher))
    }

    /// Bye week per team for `season`, with the strategy that produced it.
    pub async fn get_bye_weeks(&self, season: u16) -> FantasyResult<ByeWeekReport> {
        validate_season(season)?;

        let schedule = &self.schedule;
        let report = self
            .byes_cache
            .remember(season, self.ttls.byes, move || async move {
                Ok::<_, FantasyError>(schedule.resolve(season).await)
            })
            .await?;

        // An empty map means every strategy came up dry; let the next call retry.
        if report.bye_weeks.is_empty() {
            self.byes_cache.invalidate(&season);
        }
        Ok(report)
    }

    /// Consensus ranks for one week, durable tier first.
    pub async fn get_ranks(
        &self,
        season: u16,
        week: u8,
        scoring: &str,
    ) -> FantasyResult<RankReport> {
        let request = RankRequest::new(season, week, scoring)?;

        let key = request.durable_key(self.ranks.source_name());
        match self.durable.get::<RankReport>(&key).await {
            Ok(Some(report)) => {
                debug!("Serving {} from the durable tier", key);
                return Ok(report);
            }
            Ok(None) => {}
            Err(e) => warn!("Durable read of {} failed, aggregating live: {}", key, e),
        }

        let ranks = &self.ranks;
        self.ranks_cache
            .remember(request, self.ttls.ranks, move || async move {
                ranks.aggregate(&request).await
            })
            .await
    }

    /// Matchup difficulty keyed `"TEAM|POS"` for the requested positions.
    pub async fn get_dvp<S: AsRef<str>>(
        &self,
        season: u16,
        week: u8,
        scoring: &str,
        positions: &[S],
    ) -> FantasyResult<DvpReport> {
        let request = RankRequest::new(season, week, scoring)?;
        let mut positions = parse_positions(positions)?;
        positions.sort();

        let dvp = &self.dvp;
        let key = (request, positions.clone());
        self.dvp_cache
            .remember(key, self.ttls.dvp, move || async move {
                dvp.aggregate(&request, &positions).await
            })
            .await
    }

    /// Repopulate the durable tier for every week of `season`.
    pub async fn refresh_all(&self, season: u16) {
        match &self.refresher {
            Some(refresher) => refresher.refresh_all(season).await,
            None => warn!("No refresh job attached; skipping refresh of season {}", season),
        }
    }

    /// Hit/miss counters of the process-local tier, per operation.
    pub fn cache_stats(&self) -> [(&'static str, CacheStats); 3] {
        [
            ("byes", self.byes_cache.stats()),
            ("ranks", self.ranks_cache.stats()),
            ("dvp", self.dvp_cache.stats()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::FakeFetch;
    use crate::models::{ByeWeekSource, RankRow, ScoringType};
    use crate::ranks::RankSource;
    use crate::response::ApiResponse;
    use crate::schedule::{PlayerFeed, PlayerRecord, ScheduleFeed};
    use async_trait::async_trait;
    use cache_layer::{ManualClock, MemoryStore};
    use parking_lot::Mutex;
    use player_identity::TeamCode;
    use serde_json::json;
    use std::collections::{BTreeMap, HashSet};

    const DVP_TEMPLATE: &str = "https://dvp.example.com/{season}/{week}?pos={position}";

    /// QB rows only; every other position is unavailable.
    #[derive(Default)]
    struct QbOnly {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl RankSource for QbOnly {
        fn name(&self) -> &str {
            "fake"
        }

        fn source_id(&self, _request: &RankRequest, position: &PositionTag) -> String {
            format!("fake/{}", position.slug())
        }

        async fn fetch_rows(
            &self,
            _request: &RankRequest,
            position: &PositionTag,
        ) -> FantasyResult<Vec<RankRow>> {
            *self.calls.lock() += 1;
            tokio::time::sleep(Duration::from_millis(20)).await;
            match position {
                PositionTag::QB => Ok(vec![
                    RankRow::new("Josh Allen", 1.0),
                    RankRow::new("Lamar Jackson", 2.0),
                ]),
                other => Err(FantasyError::upstream(other.slug(), "status 503")),
            }
        }
    }

    struct TwoPlayers;

    #[async_trait]
    impl PlayerFeed for TwoPlayers {
        async fn player_records(&self, _season: u16) -> FantasyResult<Vec<PlayerRecord>> {
            Ok(vec![PlayerRecord::new("BUF", 7.0), PlayerRecord::new("SF", 14.0)])
        }
    }

    struct NoSchedule;

    #[async_trait]
    impl ScheduleFeed for NoSchedule {
        async fn teams_playing(&self, _season: u16, _week: u8) -> FantasyResult<HashSet<TeamCode>> {
            Err(FantasyError::upstream("espn", "offline"))
        }
    }

    struct Harness {
        service: FantasyDataService,
        source: Arc<QbOnly>,
        store: Arc<MemoryStore>,
        fetch: Arc<FakeFetch>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new());
        let source = Arc::new(QbOnly::default());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let fetch = Arc::new(FakeFetch::default());

        let ranks = Arc::new(RankAggregator::with_default_positions(source.clone()));
        let service = FantasyDataService::new(
            ScheduleResolver::new(Arc::new(TwoPlayers), Arc::new(NoSchedule)),
            ranks.clone(),
            DvpAggregator::new(fetch.clone(), DVP_TEMPLATE, CredentialBundle::new()),
            DurableReader::new(store.clone()),
            ServiceTtls::from(&FantasyDataConfig::default().cache),
            clock,
        )
        .with_refresher(Arc::new(RefreshScheduler::new(
            ranks,
            DurableWriter::new(store.clone()),
            ScoringType::Ppr,
            Duration::from_secs(3600),
        )));

        Harness { service, source, store, fetch }
    }

    #[tokio::test]
    async fn test_get_ranks_end_to_end_with_missing_sources() {
        let h = harness();

        let report = h.service.get_ranks(2025, 1, "ppr").await.unwrap();

        assert_eq!(
            report.ranks,
            BTreeMap::from([("QB:JOSH ALLEN".to_string(), 1), ("QB:LAMAR JACKSON".to_string(), 2)])
        );
        assert_eq!(report.missing, vec!["fake/RB", "fake/WR", "fake/TE", "fake/K"]);
        assert_eq!(report.count, 2);
    }

    #[tokio::test]
    async fn test_get_ranks_is_memoized_and_single_flight() {
        let h = harness();

        let (a, b) = tokio::join!(
            h.service.get_ranks(2025, 2, "ppr"),
            h.service.get_ranks(2025, 2, "PPR")
        );
        assert_eq!(a.unwrap(), b.unwrap());
        h.service.get_ranks(2025, 2, "ppr").await.unwrap();

        // One aggregation: one call per default position.
        assert_eq!(*h.source.calls.lock(), 5);
        let (_, ranks_stats) = h.service.cache_stats()[1];
        assert_eq!(ranks_stats.misses, 1);
    }

    #[tokio::test]
    async fn test_durable_hit_short_circuits_aggregation() {
        let h = harness();
        let stored = RankReport {
            season: 2025,
            week: 3,
            scoring: ScoringType::Ppr,
            ranks: BTreeMap::from([("RB:BIJAN ROBINSON".to_string(), 1)]),
            missing: vec![],
            count: 1,
        };
        DurableWriter::new(h.store.clone())
            .put("ranks:fake-ppr:2025:3", &stored, Duration::from_secs(60))
            .await
            .unwrap();

        let report = h.service.get_ranks(2025, 3, "ppr").await.unwrap();

        assert_eq!(report, stored);
        assert_eq!(*h.source.calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_refresh_all_feeds_later_reads() {
        let h = harness();

        h.service.refresh_all(2025).await;
        assert_eq!(h.store.len(), 18);
        let calls_after_refresh = *h.source.calls.lock();

        h.service.get_ranks(2025, 9, "ppr").await.unwrap();
        assert_eq!(*h.source.calls.lock(), calls_after_refresh);
    }

    #[tokio::test]
    async fn test_invalid_input_is_validation_error() {
        let h = harness();

        let err = h.service.get_ranks(2025, 0, "ppr").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        let err = h.service.get_ranks(2025, 1, "dynasty").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        let err = h.service.get_dvp::<&str>(2025, 1, "ppr", &[]).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        let err = h.service.get_bye_weeks(1899).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_get_dvp_partial_failure_is_success() {
        let h = harness();
        h.fetch.fail("https://dvp.example.com/2025/1?pos=QB", "status 500");
        h.fetch
            .respond("https://dvp.example.com/2025/1?pos=RB", json!([{"team": "SF", "rank": 3}]));

        let (status, response) =
            ApiResponse::from_result(h.service.get_dvp(2025, 1, "ppr", &["QB", "RB"]).await);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(status, 200);
        assert_eq!(json["ok"], true);
        assert_eq!(json["dvpMap"], json!({"SF|RB": 3}));
        assert_eq!(json["missing"], json!(["QB"]));
    }

    #[tokio::test]
    async fn test_get_dvp_shares_cache_across_position_order() {
        let h = harness();
        h.fetch
            .respond("https://dvp.example.com/2025/1?pos=QB", json!([{"team": "KC", "rank": 8}]));
        h.fetch
            .respond("https://dvp.example.com/2025/1?pos=RB", json!([{"team": "SF", "rank": 3}]));

        let first = h.service.get_dvp(2025, 1, "ppr", &["QB", "RB"]).await.unwrap();
        let second = h.service.get_dvp(2025, 1, "ppr", &["rb", "QB"]).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.fetch.call_count(), 2);
        let (_, dvp_stats) = h.service.cache_stats()[2];
        assert_eq!(dvp_stats.hits, 1);
        assert_eq!(dvp_stats.misses, 1);
    }

    #[tokio::test]
    async fn test_get_bye_weeks_uses_player_data() {
        let h = harness();

        let report = h.service.get_bye_weeks(2025).await.unwrap();
        assert_eq!(report.source, ByeWeekSource::Players);
        assert_eq!(report.bye_weeks[&TeamCode::from("SF")], 14);

        h.service.get_bye_weeks(2025).await.unwrap();
        let (_, byes_stats) = h.service.cache_stats()[0];
        assert_eq!(byes_stats.hits, 1);
    }
}
