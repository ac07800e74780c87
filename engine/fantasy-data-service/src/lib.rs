//! Fantasy Data Service
//!
//! Aggregates player rankings, defense-vs-position difficulty and bye weeks
//! from several inconsistently shaped providers, reconciles identities through
//! `player-identity`, and serves merged results through the `cache-layer`
//! tiers. A periodic refresh job keeps the durable tier populated with weekly
//! rankings so request handlers rarely reach a provider at all.

pub mod config;
pub mod dvp;
pub mod error;
pub mod extract;
pub mod http;
pub mod logging;
pub mod models;
pub mod ranks;
pub mod response;
pub mod schedule;
pub mod scheduler;
pub mod service;
pub mod tables;

pub use config::{FantasyDataConfig, RankSourceKind};
pub use dvp::DvpAggregator;
pub use error::{ErrorKind, FantasyError, FantasyResult};
pub use http::{CachedFetcher, CredentialBundle, HttpFetch, HttpRequest, ReqwestFetcher};
pub use models::*;
pub use ranks::{CsvRankSource, FantasyProsRankSource, RankAggregator, RankSource};
pub use response::ApiResponse;
pub use schedule::{EspnScoreboardFeed, HttpPlayerFeed, PlayerFeed, ScheduleFeed, ScheduleResolver};
pub use scheduler::RefreshScheduler;
pub use service::{FantasyDataService, ServiceTtls};
pub use tables::{FsTableStore, TableStore};
