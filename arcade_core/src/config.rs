use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use remote_console::ConsoleSettings;
use serde::Deserialize;
use thiserror::Error;

use crate::scoring::ScoringRules;

pub const BUILTIN_ARCADE_CONFIG: &str = include_str!("data/arcade_config.json");

pub const CONFIG_PATH_ENV: &str = "ARCADE_CONFIG_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArcadeConfig {
    pub paths: PathsConfig,
    pub console: ConsoleSettings,
    pub timing: TimingConfig,
    pub rules: ArcadeRules,
    pub scoring: ScoringRules,
    pub leaderboard: LeaderboardConfig,
}

impl ArcadeConfig {
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN_ARCADE_CONFIG).expect("builtin arcade config should parse")
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ArcadeConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ArcadeConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = ArcadeConfig::from_json_str(&contents)?;
        Ok(config)
    }
}

#[derive(Debug, Error)]
pub enum ArcadeConfigError {
    #[error("failed to parse arcade config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read arcade config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Glob matching the simulator's per-mission report files.
    pub mission_logs: String,
    pub backup_dir: PathBuf,
    pub archive_logs: bool,
    pub mission_file: PathBuf,
    pub briefing_file: PathBuf,
    pub description_file: PathBuf,
    pub scores_db: PathBuf,
    pub leaderboard_output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            mission_logs: "data/logs/mission/missionReport*.txt".to_string(),
            backup_dir: PathBuf::from("data/logs/mission/bak"),
            archive_logs: true,
            mission_file: PathBuf::from("mission/arcade.Mission"),
            briefing_file: PathBuf::from("mission/arcade.eng"),
            description_file: PathBuf::from("mission/arcade.txt"),
            scores_db: PathBuf::from("highscores/highscores.json"),
            leaderboard_output: PathBuf::from("highscores/leaderboard.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_ms: u64,
    pub status_interval_secs: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
            status_interval_secs: 45,
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn status_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.status_interval_secs)
    }
}

/// An extra spawn unlocked once the score reaches `threshold`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LadderStep {
    pub spawn: String,
    pub threshold: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SoundCues {
    pub killed: String,
    pub excellent: String,
    pub good: String,
    pub poor: String,
}

impl Default for SoundCues {
    fn default() -> Self {
        Self {
            killed: "sound_killed".to_string(),
            excellent: "sound_excellent".to_string(),
            good: "sound_good".to_string(),
            poor: "sound_poor".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArcadeRules {
    pub start_objective: String,
    pub game_over_objective: String,
    pub spawn_radius: f64,
    pub objective_radius: f64,
    pub spawn_ladder: Vec<LadderStep>,
    pub close_airfields_trigger: String,
    pub sound_cues: SoundCues,
    pub excellent_threshold: i64,
    pub leaderboard_url: String,
    pub arcade_planes: Vec<String>,
}

impl Default for ArcadeRules {
    fn default() -> Self {
        Self {
            start_objective: "PlayerStart".to_string(),
            game_over_objective: "gameover".to_string(),
            spawn_radius: 50.0,
            objective_radius: 150.0,
            spawn_ladder: vec![
                LadderStep {
                    spawn: "spawn2".to_string(),
                    threshold: 600,
                },
                LadderStep {
                    spawn: "spawn3".to_string(),
                    threshold: 1400,
                },
                LadderStep {
                    spawn: "spawn4".to_string(),
                    threshold: 2400,
                },
            ],
            close_airfields_trigger: "close_airfields".to_string(),
            sound_cues: SoundCues::default(),
            excellent_threshold: 2400,
            leaderboard_url: "https://il2arcade.neocities.org".to_string(),
            arcade_planes: vec!["Ju 87 D-3".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    pub recent_players: usize,
    pub high_scores: usize,
    /// Scores at or below this never reach a per-plane table.
    pub minimum_score: i64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            recent_players: 5,
            high_scores: 20,
            minimum_score: 0,
        }
    }
}

/// Loads from `ARCADE_CONFIG_PATH` when set, falling back to the builtin table.
/// Returns the path the config came from, if any.
pub fn load_arcade_config_from_env() -> (ArcadeConfig, Option<PathBuf>) {
    if let Some(path) = env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from) {
        match ArcadeConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "arcade::config",
                    path = %path.display(),
                    "arcade_config.loaded=file"
                );
                return (config, Some(path));
            }
            Err(err) => {
                tracing::warn!(
                    target: "arcade::config",
                    path = %path.display(),
                    error = %err,
                    "arcade_config.load_failed"
                );
            }
        }
    }

    tracing::info!(target: "arcade::config", "arcade_config.loaded=builtin");
    (ArcadeConfig::builtin(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_parses_with_points_table() {
        let config = ArcadeConfig::builtin();
        assert_eq!(config.scoring.points.get("kv1-42"), Some(&1000));
        assert_eq!(config.scoring.points.get("m3a1"), Some(&100));
        assert_eq!(config.rules.spawn_ladder.len(), 3);
        assert_eq!(config.console.port, 8991);
        assert_eq!(config.timing.poll_interval(), Duration::from_secs(3));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            ArcadeConfig::from_json_str(r#"{ "rules": { "spawn_radius": 25.0 } }"#).unwrap();
        assert_eq!(config.rules.spawn_radius, 25.0);
        assert_eq!(config.rules.objective_radius, 150.0);
        assert_eq!(config.timing.status_interval_secs, 45);
        assert_eq!(config.scoring.score_multiplier, 1);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ArcadeConfig::from_file(Path::new("/nonexistent/arcade.json")).unwrap_err();
        assert!(matches!(err, ArcadeConfigError::Read { .. }));
        assert!(err.to_string().contains("arcade.json"));
    }
}
