//! Arcade minigame daemon core for IL-2 dedicated servers.
//!
//! Mission report lines are parsed into [`LogEvent`]s and applied in order to
//! an [`ArcadeMission`]. The [`ArcadeSession`] polls the report directory,
//! turns state transitions into console commands through [`OutcomeEffects`]
//! and records finished games in a [`ResultStore`].

pub mod arcade;
pub mod config;
pub mod effects;
pub mod geometry;
pub mod highscores;
pub mod log_event;
pub mod log_source;
pub mod objectives;
pub mod player;
pub mod registry;
pub mod scenario;
pub mod scoring;
pub mod session;

pub use arcade::{ArcadeMission, ArcadeNotice, ArcadePhase, GameOverReason, SpawnUnlock};
pub use config::{
    load_arcade_config_from_env, ArcadeConfig, ArcadeConfigError, ArcadeRules, LadderStep,
    LeaderboardConfig, PathsConfig, TimingConfig,
};
pub use effects::{select_sound_cue, ConsoleSink, LoggingConsole, OutcomeEffects, SoundCue};
pub use geometry::Point3;
pub use highscores::{
    GameResult, JsonResultStore, LeaderboardPublisher, PublishError, ResultStore,
    ResultStoreError, StaticLeaderboard,
};
pub use log_event::{parse_line, EventKind, EventParseError, LogEvent, PlayerSpawn};
pub use log_source::{LogLines, LogSourceError, RetirePolicy};
pub use objectives::{MissionObjective, ObjectiveSet};
pub use player::ArcadePlayer;
pub use registry::{Vehicle, VehicleRegistry, SENTINEL_ATTACKER_ID};
pub use scenario::{Scenario, ScenarioError, ScenarioVehicle};
pub use scoring::{compute_score, ScoreReport, ScoringRules};
pub use session::{ArcadeSession, PollReport, SessionError};
