//! Ranking tables stored as CSV files
//!
//! Tables are laid out as `<root>/<season>/week<week>/<POS>.csv`, one file per
//! position, with D/ST stored as `DST.csv`. Header spellings vary between
//! exports, so the name and rank columns are located by candidate list.

use crate::error::{FantasyError, FantasyResult};
use crate::models::{RankRequest, RankRow};
use async_trait::async_trait;
use player_identity::PositionTag;
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

const NAME_HEADERS: &[&str] = &["player name", "player", "name", "player_name"];
const RANK_HEADERS: &[&str] = &["rk", "rank", "ecr", "rank_ecr"];

/// Read access to per-position ranking tables.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Identifier of the table for `position`, used in `missing` manifests.
    fn locate(&self, request: &RankRequest, position: &PositionTag) -> String;

    async fn read_table(
        &self,
        request: &RankRequest,
        position: &PositionTag,
    ) -> FantasyResult<Vec<RankRow>>;
}

/// Tables on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsTableStore {
    root: PathBuf,
}

impl FsTableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, request: &RankRequest, position: &PositionTag) -> PathBuf {
        self.root
            .join(request.season.to_string())
            .join(format!("week{}", request.week))
            .join(format!("{}.csv", position.slug()))
    }
}

#[async_trait]
impl TableStore for FsTableStore {
    fn locate(&self, request: &RankRequest, position: &PositionTag) -> String {
        self.path(request, position).display().to_string()
    }

    async fn read_table(
        &self,
        request: &RankRequest,
        position: &PositionTag,
    ) -> FantasyResult<Vec<RankRow>> {
        let path = self.path(request, position);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| FantasyError::upstream(path.display().to_string(), e.to_string()))?;

        let rows = parse_rank_table(bytes.as_slice())?;
        debug!("Read {} rows from {}", rows.len(), path.display());
        Ok(rows)
    }
}

/// Parse a ranking table. Rows without a name are skipped; an unparseable
/// rank is kept as `None` and dropped later by rank validation.
pub fn parse_rank_table<R: Read>(source: R) -> FantasyResult<Vec<RankRow>> {
    let mut reader =
        csv::ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_reader(source);

    let headers = reader.headers()?.clone();
    let column = |candidates: &[&str]| {
        headers.iter().position(|h| candidates.iter().any(|c| h.eq_ignore_ascii_case(c)))
    };
    let name_col = column(NAME_HEADERS).ok_or_else(|| {
        FantasyError::Validation("ranking table has no player name column".to_string())
    })?;
    let rank_col = column(RANK_HEADERS)
        .ok_or_else(|| FantasyError::Validation("ranking table has no rank column".to_string()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let name = match record.get(name_col) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };
        let rank = record.get(rank_col).and_then(|r| r.parse::<f64>().ok());
        rows.push(RankRow { name, rank });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoringType;

    const SAMPLE: &str = "\
RK,TIERS,PLAYER NAME,TEAM,OPP
1,1,Josh Allen,BUF,vs MIA
2,1,Lamar Jackson,BAL,at CLE
,,,,
3,2,Jalen Hurts,PHI
X,2,Joe Burrow,CIN,vs PIT
";

    #[test]
    fn test_parse_fantasypros_export() {
        let rows = parse_rank_table(SAMPLE.as_bytes()).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], RankRow::new("Josh Allen", 1.0));
        assert_eq!(rows[2], RankRow::new("Jalen Hurts", 3.0));
        assert_eq!(rows[3].rank, None);
    }

    #[test]
    fn test_header_matching_is_case_insensitive() {
        let rows = parse_rank_table("name,Rank\nBijan Robinson,2\n".as_bytes()).unwrap();
        assert_eq!(rows, vec![RankRow::new("Bijan Robinson", 2.0)]);
    }

    #[test]
    fn test_missing_columns_are_rejected() {
        let err = parse_rank_table("team,points\nBUF,20\n".as_bytes()).unwrap_err();
        assert!(matches!(err, FantasyError::Validation(_)));
    }

    #[tokio::test]
    async fn test_fs_store_layout() {
        let dir = tempfile::tempdir().unwrap();
        let week_dir = dir.path().join("2025").join("week3");
        std::fs::create_dir_all(&week_dir).unwrap();
        std::fs::write(week_dir.join("DST.csv"), "Rank,Player\n1,Bills D/ST\n").unwrap();

        let store = FsTableStore::new(dir.path());
        let request = RankRequest { season: 2025, week: 3, scoring: ScoringType::Ppr };

        let rows = store.read_table(&request, &PositionTag::DST).await.unwrap();
        assert_eq!(rows, vec![RankRow::new("Bills D/ST", 1.0)]);

        let err = store.read_table(&request, &PositionTag::K).await.unwrap_err();
        assert!(matches!(err, FantasyError::Upstream { .. }));
        assert!(store.locate(&request, &PositionTag::K).ends_with("K.csv"));
    }
}
