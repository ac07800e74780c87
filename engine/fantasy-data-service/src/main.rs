//! # Fantasy Refresh Binary
//!
//! Populates the durable tier with a season's weekly rankings, once or on an
//! interval.

use anyhow::{Context, Result};
use cache_layer::{DurableStore, DurableWriter, MemoryStore, RedisStore};
use clap::Parser;
use fantasy_data_service::logging::initialize_logging;
use fantasy_data_service::{FantasyDataConfig, RankAggregator, RefreshScheduler, ReqwestFetcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Refresh weekly rankings into the durable cache
#[derive(Parser)]
#[command(name = "fantasy-refresh")]
#[command(about = "Refresh weekly fantasy rankings into the durable cache")]
struct Cli {
    /// Season to refresh (defaults to the configured or current season)
    #[arg(long)]
    season: Option<u16>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep running and refresh every N minutes
    #[arg(long)]
    every_minutes: Option<u64>,

    /// Keep running on the configured refresh interval
    #[arg(long)]
    periodic: bool,

    /// Redis URL for the durable tier (overrides configuration)
    #[arg(long)]
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let mut config =
        FantasyDataConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(redis_url) = cli.redis_url {
        config.cache.durable.redis_url = Some(redis_url);
    }

    initialize_logging(&config.logging).context("Failed to initialize logging")?;
    info!("Starting fantasy refresh");

    let http = Arc::new(
        ReqwestFetcher::new(config.http_timeout(), &config.http.user_agent)
            .context("Failed to create HTTP client")?,
    );

    let store: Arc<dyn DurableStore> = match &config.cache.durable.redis_url {
        Some(url) => Arc::new(
            RedisStore::connect(url, &config.cache.durable)
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => {
            warn!("No Redis URL configured; refreshed ranks stay in this process only");
            Arc::new(MemoryStore::default())
        }
    };

    let ranks = Arc::new(RankAggregator::from_config(&config, http));
    let scheduler = RefreshScheduler::from_config(&config, ranks, DurableWriter::new(store));
    let season = cli.season.unwrap_or_else(|| RefreshScheduler::configured_season(&config));

    let interval = cli.every_minutes.or(cli.periodic.then_some(config.refresh.interval_minutes));
    match interval {
        Some(minutes) => {
            scheduler.run_periodic(season, Duration::from_secs(minutes.max(1) * 60)).await;
        }
        None => scheduler.refresh_all(season).await,
    }

    info!("Fantasy refresh finished");
    Ok(())
}
