use crate::config::FantasyDataConfig;
use crate::models::{current_season, RankRequest, ScoringType, MAX_WEEK};
use crate::ranks::RankAggregator;
use cache_layer::DurableWriter;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Keeps the durable tier populated with a season's weekly rankings.
///
/// The only holder of a [`DurableWriter`]; request-serving code reads.
pub struct RefreshScheduler {
    ranks: Arc<RankAggregator>,
    writer: DurableWriter,
    scoring: ScoringType,
    ttl: Duration,
}

impl RefreshScheduler {
    pub fn new(
        ranks: Arc<RankAggregator>,
        writer: DurableWriter,
        scoring: ScoringType,
        ttl: Duration,
    ) -> Self {
        Self { ranks, writer, scoring, ttl }
    }

    /// Scheduler for the configured scoring format and durable TTL.
    pub fn from_config(
        config: &FantasyDataConfig,
        ranks: Arc<RankAggregator>,
        writer: DurableWriter,
    ) -> Self {
        Self::new(ranks, writer, config.refresh.scoring, config.cache.durable.durable_ttl())
    }

    /// Season the job refreshes when none is given on the command line.
    pub fn configured_season(config: &FantasyDataConfig) -> u16 {
        config.refresh.season.unwrap_or_else(current_season)
    }

    /// Durable key prefix for this job, e.g. "fantasypros-ppr".
    pub fn source_label(&self) -> String {
        format!("{}-{}", self.ranks.source_name(), self.scoring)
    }

    /// Refresh every week of `season` concurrently.
    ///
    /// Failed weeks are logged and left untouched; the next run retries them.
    pub async fn refresh_all(&self, season: u16) {
        info!("Starting rank refresh for season {} ({})", season, self.source_label());

        let weeks = (1..=MAX_WEEK).map(|week| self.refresh_week(season, week));
        let stored = join_all(weeks).await.into_iter().filter(|ok| *ok).count();

        info!("Rank refresh for season {} stored {}/{} weeks", season, stored, MAX_WEEK);
    }

    async fn refresh_week(&self, season: u16, week: u8) -> bool {
        let request = RankRequest { season, week, scoring: self.scoring };

        let report = match self.ranks.aggregate(&request).await {
            Ok(report) => report,
            Err(e) => {
                error!("Rank refresh for {} week {} failed: {}", season, week, e);
                return false;
            }
        };

        let key = request.durable_key(self.ranks.source_name());
        match self.writer.put(&key, &report, self.ttl).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to store {}: {}", key, e);
                false
            }
        }
    }

    /// Run [`Self::refresh_all`] immediately and then every `every` (runs indefinitely).
    pub async fn run_periodic(&self, season: u16, every: Duration) {
        info!("Refreshing season {} every {:?}", season, every);

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.refresh_all(season).await;
        }
    }
}
