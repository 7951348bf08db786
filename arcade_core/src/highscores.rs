//! Persisted game results and the leaderboard artifact built from them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LeaderboardConfig;
use crate::scoring::{parse_detail_rows, DetailRow};

/// One finished arcade session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub alias: String,
    pub permanent_id: String,
    pub plane: String,
    pub score: i64,
    /// Detail block of the score breakdown.
    pub scoring_detail: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ResultStoreError {
    #[error("failed to read results from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("results file {path:?} is corrupt: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write results to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Append-only storage of game results.
pub trait ResultStore {
    fn load(&self) -> Result<Vec<GameResult>, ResultStoreError>;

    /// Stores `result` and returns the full updated list.
    fn append(&mut self, result: GameResult) -> Result<Vec<GameResult>, ResultStoreError>;
}

/// Whole-file JSON list, replaced atomically on every append.
#[derive(Debug, Clone)]
pub struct JsonResultStore {
    path: PathBuf,
}

impl JsonResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_all(&self, results: &[GameResult]) -> Result<(), ResultStoreError> {
        let json = serde_json::to_string_pretty(results)?;
        let write_err = |source| ResultStoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)
    }
}

impl ResultStore for JsonResultStore {
    fn load(&self) -> Result<Vec<GameResult>, ResultStoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ResultStoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents).map_err(|source| ResultStoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn append(&mut self, result: GameResult) -> Result<Vec<GameResult>, ResultStoreError> {
        let mut results = self.load()?;
        backfill_aliases(&mut results, &result);
        tracing::info!(
            target: "arcade::highscores",
            alias = %result.alias,
            plane = %result.plane,
            score = result.score,
            total = results.len() + 1,
            "highscores.result_appended"
        );
        results.push(result);
        self.write_all(&results)?;
        Ok(results)
    }
}

/// Renames older results of the same account to its newest alias.
pub fn backfill_aliases(results: &mut [GameResult], latest: &GameResult) {
    for result in results
        .iter_mut()
        .filter(|r| r.permanent_id == latest.permanent_id && r.alias != latest.alias)
    {
        result.alias = latest.alias.clone();
    }
}

/// Newest result of each of the last `limit` distinct aliases.
pub fn recent_unique_players(results: &[GameResult], limit: usize) -> Vec<&GameResult> {
    let mut newest_first: Vec<&GameResult> = results.iter().collect();
    newest_first.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let mut seen: Vec<&str> = Vec::new();
    let mut picked = Vec::new();
    for result in newest_first {
        if picked.len() >= limit {
            break;
        }
        if seen.contains(&result.alias.as_str()) {
            continue;
        }
        seen.push(&result.alias);
        picked.push(result);
    }
    picked
}

/// Best `limit` scores for `plane` that are above `minimum`.
pub fn top_scores_for_plane<'a>(
    results: &'a [GameResult],
    plane: &str,
    limit: usize,
    minimum: i64,
) -> Vec<&'a GameResult> {
    let mut scores: Vec<&GameResult> = results
        .iter()
        .filter(|r| r.plane == plane && r.score > minimum)
        .collect();
    scores.sort_by(|a, b| b.score.cmp(&a.score));
    scores.truncate(limit);
    scores
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize leaderboard: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write leaderboard to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Regenerates whatever presents the results to players.
pub trait LeaderboardPublisher {
    fn publish(&mut self, results: &[GameResult]) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardRow {
    pub rank: Option<usize>,
    pub alias: String,
    pub plane: String,
    pub score: i64,
    pub date: String,
    pub tooltip: Vec<DetailRow>,
}

impl LeaderboardRow {
    fn new(rank: Option<usize>, result: &GameResult) -> Self {
        Self {
            rank,
            alias: result.alias.clone(),
            plane: result.plane.clone(),
            score: result.score,
            date: result.timestamp.format("%Y-%m-%d").to_string(),
            tooltip: parse_detail_rows(&result.scoring_detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaneTable {
    pub plane: String,
    pub rows: Vec<LeaderboardRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leaderboard {
    pub recent_players: Vec<LeaderboardRow>,
    pub planes: Vec<PlaneTable>,
}

pub fn build_leaderboard(
    results: &[GameResult],
    planes: &[String],
    config: &LeaderboardConfig,
) -> Leaderboard {
    let recent_players = recent_unique_players(results, config.recent_players)
        .into_iter()
        .map(|result| LeaderboardRow::new(None, result))
        .collect();
    let planes = planes
        .iter()
        .map(|plane| PlaneTable {
            plane: plane.clone(),
            rows: top_scores_for_plane(results, plane, config.high_scores, config.minimum_score)
                .into_iter()
                .enumerate()
                .map(|(idx, result)| LeaderboardRow::new(Some(idx + 1), result))
                .collect(),
        })
        .collect();
    Leaderboard {
        recent_players,
        planes,
    }
}

/// Writes the leaderboard as a JSON file for a static page to render.
#[derive(Debug, Clone)]
pub struct StaticLeaderboard {
    output: PathBuf,
    planes: Vec<String>,
    config: LeaderboardConfig,
}

impl StaticLeaderboard {
    pub fn new(output: impl Into<PathBuf>, planes: Vec<String>, config: LeaderboardConfig) -> Self {
        Self {
            output: output.into(),
            planes,
            config,
        }
    }
}

impl LeaderboardPublisher for StaticLeaderboard {
    fn publish(&mut self, results: &[GameResult]) -> Result<(), PublishError> {
        let board = build_leaderboard(results, &self.planes, &self.config);
        let json = serde_json::to_string_pretty(&board)?;
        let write_err = |source| PublishError::Write {
            path: self.output.clone(),
            source,
        };
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(&self.output, json).map_err(write_err)?;
        tracing::info!(
            target: "arcade::highscores",
            path = %self.output.display(),
            results = results.len(),
            "highscores.leaderboard_written"
        );
        Ok(())
    }
}
