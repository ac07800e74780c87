//! Bye-week resolution
//!
//! The primary strategy takes the most common bye week reported across each
//! team's players. When that yields nothing, the fallback walks the season's
//! weekly scoreboards in order and assigns each team the first week it does
//! not appear in.

use crate::error::FantasyResult;
use crate::extract::{rows, FANTASYPROS_WRAPPERS, PLAYER_BYE, PLAYER_TEAM};
use crate::http::{CredentialBundle, HttpFetch, HttpRequest};
use crate::models::{valid_week, ByeWeekReport, ByeWeekSource, MAX_WEEK};
use async_trait::async_trait;
use player_identity::{normalize_team, TeamCode, NFL_TEAMS};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A player's team reference and reported bye week, as the provider sent them.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub team: String,
    pub bye_week: Option<f64>,
}

impl PlayerRecord {
    pub fn new(team: impl Into<String>, bye_week: f64) -> Self {
        Self { team: team.into(), bye_week: Some(bye_week) }
    }
}

/// Source of per-player records for a season.
#[async_trait]
pub trait PlayerFeed: Send + Sync {
    async fn player_records(&self, season: u16) -> FantasyResult<Vec<PlayerRecord>>;
}

/// Source of the teams scheduled in a given week.
#[async_trait]
pub trait ScheduleFeed: Send + Sync {
    async fn teams_playing(&self, season: u16, week: u8) -> FantasyResult<HashSet<TeamCode>>;
}

/// Player records from the FantasyPros draft consensus list.
pub struct HttpPlayerFeed {
    http: Arc<dyn HttpFetch>,
    base_url: String,
    credentials: CredentialBundle,
}

impl HttpPlayerFeed {
    pub fn new(
        http: Arc<dyn HttpFetch>,
        base_url: impl Into<String>,
        credentials: CredentialBundle,
    ) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_string(), credentials }
    }
}

#[async_trait]
impl PlayerFeed for HttpPlayerFeed {
    async fn player_records(&self, season: u16) -> FantasyResult<Vec<PlayerRecord>> {
        let url = format!(
            "{}/{}/consensus-rankings?position=ALL&scoring=PPR&type=draft",
            self.base_url, season
        );
        let request = HttpRequest::parse(&url, "fantasypros-players")?
            .with_credentials(self.credentials.clone());
        let body = self.http.get_json(&request).await?;

        Ok(rows(&body, FANTASYPROS_WRAPPERS, "fantasypros-players")?
            .into_iter()
            .filter_map(|row| {
                Some(PlayerRecord {
                    team: PLAYER_TEAM.text(row)?,
                    bye_week: PLAYER_BYE.number(row),
                })
            })
            .collect())
    }
}

/// Weekly schedules from the ESPN site scoreboard.
pub struct EspnScoreboardFeed {
    http: Arc<dyn HttpFetch>,
    scoreboard_url: String,
    season_type: u8,
}

impl EspnScoreboardFeed {
    pub fn new(
        http: Arc<dyn HttpFetch>,
        scoreboard_url: impl Into<String>,
        season_type: u8,
    ) -> Self {
        Self { http, scoreboard_url: scoreboard_url.into(), season_type }
    }
}

#[async_trait]
impl ScheduleFeed for EspnScoreboardFeed {
    async fn teams_playing(&self, season: u16, week: u8) -> FantasyResult<HashSet<TeamCode>> {
        let url = format!(
            "{}?dates={}&seasontype={}&week={}",
            self.scoreboard_url, season, self.season_type, week
        );
        let request = HttpRequest::parse(&url, format!("espn-scoreboard-week{week}"))?;
        let body = self.http.get_json(&request).await?;
        Ok(scoreboard_teams(&body))
    }
}

/// Team codes of every competitor in an ESPN scoreboard body.
pub fn scoreboard_teams(body: &Value) -> HashSet<TeamCode> {
    let as_list = |value: &Value, key: &str| {
        value.get(key).and_then(Value::as_array).cloned().unwrap_or_default()
    };

    as_list(body, "events")
        .iter()
        .flat_map(|event| as_list(event, "competitions"))
        .flat_map(|competition| as_list(&competition, "competitors"))
        .filter_map(|competitor| {
            let abbreviation = competitor.get("team")?.get("abbreviation")?.as_str()?;
            let team = normalize_team(abbreviation);
            (!team.is_empty()).then_some(team)
        })
        .collect()
}

/// Per-team mode of valid bye weeks; ties go to the week seen first.
///
/// Records with a non-league team or a bye outside 1-18 are ignored.
pub fn bye_weeks_from_players(records: &[PlayerRecord]) -> BTreeMap<TeamCode, u8> {
    // Per team: (week, votes) in first-seen order.
    let mut tallies: HashMap<TeamCode, Vec<(u8, usize)>> = HashMap::new();

    for record in records {
        let team = normalize_team(&record.team);
        if !team.is_canonical() {
            continue;
        }
        let Some(week) = record.bye_week.and_then(valid_week) else {
            continue;
        };

        let tally = tallies.entry(team).or_default();
        match tally.iter_mut().find(|(seen, _)| *seen == week) {
            Some((_, votes)) => *votes += 1,
            None => tally.push((week, 1)),
        }
    }

    tallies
        .into_iter()
        .filter_map(|(team, tally)| {
            let mut best: Option<(u8, usize)> = None;
            for (week, votes) in tally {
                if best.map_or(true, |(_, top)| votes > top) {
                    best = Some((week, votes));
                }
            }
            best.map(|(week, _)| (team, week))
        })
        .collect()
}

/// The 32 league teams as [`TeamCode`]s.
pub fn nfl_league() -> Vec<TeamCode> {
    NFL_TEAMS.iter().map(|code| TeamCode::from(*code)).collect()
}

/// Assign each `league` team the first week, scanning 1-18 in order, in which
/// it does not play.
///
/// A week that fails to load or reports no games is skipped. Teams still
/// unassigned after week 18 are left out.
pub async fn bye_weeks_by_elimination(
    feed: &dyn ScheduleFeed,
    season: u16,
    league: &[TeamCode],
) -> BTreeMap<TeamCode, u8> {
    let mut remaining: BTreeSet<TeamCode> = league.iter().cloned().collect();
    let mut byes = BTreeMap::new();

    for week in 1..=MAX_WEEK {
        if remaining.is_empty() {
            break;
        }

        let playing = match feed.teams_playing(season, week).await {
            Ok(playing) if !playing.is_empty() => playing,
            Ok(_) => {
                warn!("Scoreboard for {} week {} lists no games, skipping", season, week);
                continue;
            }
            Err(e) => {
                warn!("Scoreboard for {} week {} unavailable: {}", season, week, e);
                continue;
            }
        };

        let idle: Vec<TeamCode> =
            remaining.iter().filter(|team| !playing.contains(*team)).cloned().collect();
        for team in idle {
            debug!("{} on bye in week {}", team, week);
            remaining.remove(&team);
            byes.insert(team, week);
        }
    }

    if !remaining.is_empty() {
        warn!("No bye week found for {} teams in {}", remaining.len(), season);
    }
    byes
}

/// Resolves a season's bye weeks, falling back from player data to schedules.
pub struct ScheduleResolver {
    players: Arc<dyn PlayerFeed>,
    schedule: Arc<dyn ScheduleFeed>,
    league: Vec<TeamCode>,
}

impl ScheduleResolver {
    pub fn new(players: Arc<dyn PlayerFeed>, schedule: Arc<dyn ScheduleFeed>) -> Self {
        Self { players, schedule, league: nfl_league() }
    }

    /// Replace the team set the schedule scan assigns byes to.
    pub fn with_league(mut self, league: Vec<TeamCode>) -> Self {
        self.league = league;
        self
    }

    /// Never fails; a partial or empty map is a valid answer.
    pub async fn resolve(&self, season: u16) -> ByeWeekReport {
        match self.players.player_records(season).await {
            Ok(records) => {
                let bye_weeks = bye_weeks_from_players(&records);
                if !bye_weeks.is_empty() {
                    info!("Resolved {} bye weeks for {} from player data", bye_weeks.len(), season);
                    return ByeWeekReport { season, bye_weeks, source: ByeWeekSource::Players };
                }
                warn!("Player data for {} carried no usable bye weeks, scanning schedules", season);
            }
            Err(e) => warn!("Player data for {} unavailable, scanning schedules: {}", season, e),
        }

        let bye_weeks =
            bye_weeks_by_elimination(self.schedule.as_ref(), season, &self.league).await;
        info!("Resolved {} bye weeks for {} from schedules", bye_weeks.len(), season);
        ByeWeekReport { season, bye_weeks, source: ByeWeekSource::Scoreboard }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FantasyError;
    use parking_lot::Mutex;
    use serde_json::json;

    struct FixedPlayers(FantasyResult<Vec<PlayerRecord>>);

    #[async_trait]
    impl PlayerFeed for FixedPlayers {
        async fn player_records(&self, _season: u16) -> FantasyResult<Vec<PlayerRecord>> {
            match &self.0 {
                Ok(records) => Ok(records.clone()),
                Err(e) => Err(FantasyError::upstream("players", e.to_string())),
            }
        }
    }

    /// League where team `i` (in NFL_TEAMS order) has its bye in week 5 + i / 4.
    #[derive(Default)]
    struct FakeSchedule {
        failing_weeks: Vec<u8>,
        requested: Mutex<Vec<u8>>,
    }

    impl FakeSchedule {
        fn bye_of(index: usize) -> u8 {
            5 + (index / 4) as u8
        }
    }

    #[async_trait]
    impl ScheduleFeed for FakeSchedule {
        async fn teams_playing(&self, _season: u16, week: u8) -> FantasyResult<HashSet<TeamCode>> {
            self.requested.lock().push(week);
            if self.failing_weeks.contains(&week) {
                return Err(FantasyError::upstream("espn", "status 503"));
            }
            Ok(NFL_TEAMS
                .iter()
                .enumerate()
                .filter(|(i, _)| Self::bye_of(*i) != week)
                .map(|(_, code)| TeamCode::from(*code))
                .collect())
        }
    }

    fn team(code: &str) -> TeamCode {
        TeamCode::from(code)
    }

    #[test]
    fn test_mode_with_first_seen_tie_break() {
        let records = vec![
            PlayerRecord::new("BUF", 7.0),
            PlayerRecord::new("BUF", 7.0),
            PlayerRecord::new("BUF", 9.0),
            PlayerRecord::new("KC", 10.0),
            PlayerRecord::new("KC", 6.0),
            PlayerRecord::new("KC", 6.0),
            PlayerRecord::new("KC", 10.0),
        ];

        let byes = bye_weeks_from_players(&records);
        assert_eq!(byes[&team("BUF")], 7);
        assert_eq!(byes[&team("KC")], 10);
    }

    #[test]
    fn test_mode_beats_minority_value() {
        let mut records = vec![PlayerRecord::new("DET", 14.0); 9];
        records.insert(4, PlayerRecord::new("DET", 5.0));

        assert_eq!(bye_weeks_from_players(&records), BTreeMap::from([(team("DET"), 14)]));
    }

    #[test]
    fn test_invalid_records_are_discarded_before_counting() {
        let records = vec![
            PlayerRecord::new("jac", 8.0),
            PlayerRecord::new("JAX", 0.0),
            PlayerRecord::new("JAX", 19.0),
            PlayerRecord::new("JAX", 19.0),
            PlayerRecord::new("JAX", 8.5),
            PlayerRecord { team: "JAX".to_string(), bye_week: None },
            PlayerRecord::new("FA", 5.0),
            PlayerRecord::new("", 5.0),
        ];

        let byes = bye_weeks_from_players(&records);
        assert_eq!(byes.len(), 1);
        assert_eq!(byes[&team("JAX")], 8);
    }

    #[tokio::test]
    async fn test_elimination_assigns_every_team() {
        let feed = FakeSchedule::default();
        let byes = bye_weeks_by_elimination(&feed, 2025, &nfl_league()).await;

        assert_eq!(byes.len(), 32);
        for (i, code) in NFL_TEAMS.iter().enumerate() {
            assert_eq!(byes[&team(code)], FakeSchedule::bye_of(i));
        }
        // Byes end in week 12, so later weeks are never requested.
        assert_eq!(*feed.requested.lock(), (1..=12).collect::<Vec<u8>>());
    }

    #[tokio::test]
    async fn test_elimination_skips_failing_week() {
        let feed = FakeSchedule { failing_weeks: vec![2, 6], ..Default::default() };
        let byes = bye_weeks_by_elimination(&feed, 2025, &nfl_league()).await;

        // Teams idle only in week 6 are never observed.
        assert_eq!(byes.len(), 28);
        assert_eq!(byes[&team("ARI")], 5);
        assert_eq!(byes[&team("BUF")], 5);
        assert!(!byes.contains_key(&team("CHI")));
        assert_eq!(byes[&team("DAL")], 7);
        assert!(byes.values().all(|week| (1..=18).contains(week)));
        assert_eq!(*feed.requested.lock(), (1..=18).collect::<Vec<u8>>());
    }

    /// Three-team league where only C sits out, in week 4.
    struct TinyLeague;

    #[async_trait]
    impl ScheduleFeed for TinyLeague {
        async fn teams_playing(&self, _season: u16, week: u8) -> FantasyResult<HashSet<TeamCode>> {
            let mut playing = HashSet::from([team("A"), team("B")]);
            if week != 4 {
                playing.insert(team("C"));
            }
            Ok(playing)
        }
    }

    #[tokio::test]
    async fn test_elimination_on_custom_league() {
        let league = vec![team("A"), team("B"), team("C")];
        let byes = bye_weeks_by_elimination(&TinyLeague, 2025, &league).await;

        assert_eq!(byes, BTreeMap::from([(team("C"), 4)]));
    }

    #[tokio::test]
    async fn test_resolver_prefers_player_data() {
        let resolver = ScheduleResolver::new(
            Arc::new(FixedPlayers(Ok(vec![PlayerRecord::new("BUF", 7.0)]))),
            Arc::new(FakeSchedule::default()),
        );

        let report = resolver.resolve(2025).await;
        assert_eq!(report.source, ByeWeekSource::Players);
        assert_eq!(report.bye_weeks, BTreeMap::from([(team("BUF"), 7)]));
    }

    #[tokio::test]
    async fn test_resolver_falls_back_on_failure_or_empty_result() {
        for players in [
            FixedPlayers(Err(FantasyError::upstream("players", "status 500"))),
            FixedPlayers(Ok(vec![PlayerRecord::new("BUF", 0.0)])),
        ] {
            let resolver =
                ScheduleResolver::new(Arc::new(players), Arc::new(FakeSchedule::default()));
            let report = resolver.resolve(2025).await;

            assert_eq!(report.source, ByeWeekSource::Scoreboard);
            assert_eq!(report.bye_weeks.len(), 32);
        }
    }

    #[test]
    fn test_scoreboard_teams_from_espn_payload() {
        let body = json!({
            "leagues": [],
            "events": [
                {"competitions": [{"competitors": [
                    {"homeAway": "home", "team": {"abbreviation": "KC"}},
                    {"homeAway": "away", "team": {"abbreviation": "WSH"}}
                ]}]},
                {"competitions": [{"competitors": [
                    {"team": {"abbreviation": "JAC"}},
                    {"team": {}}
                ]}]}
            ]
        });

        let teams = scoreboard_teams(&body);
        assert_eq!(teams, HashSet::from([team("KC"), team("WSH"), team("JAX")]));
        assert!(scoreboard_teams(&json!({})).is_empty());
    }

    #[tokio::test]
    async fn test_http_player_feed_reads_fantasypros_rows() {
        use crate::http::tests::FakeFetch;

        let fake = Arc::new(FakeFetch::default());
        fake.respond(
            concat!(
                "https://api.fantasypros.com/public/v2/json/nfl/2025/consensus-rankings",
                "?position=ALL&scoring=PPR&type=draft"
            ),
            json!({"players": [
                {"player_name": "Josh Allen", "player_team_id": "BUF", "player_bye_week": "7"},
                {"player_name": "Free Agent", "player_bye_week": 5}
            ]}),
        );
        let feed = HttpPlayerFeed::new(
            fake,
            "https://api.fantasypros.com/public/v2/json/nfl",
            CredentialBundle::new().with_header("x-api-key", "key"),
        );

        let records = feed.player_records(2025).await.unwrap();
        assert_eq!(records, vec![PlayerRecord::new("BUF", 7.0)]);
    }
}
