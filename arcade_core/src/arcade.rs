//! The arcade session aggregate.
//!
//! [`ArcadeMission`] owns every piece of per-session state and is the only
//! thing that mutates it. Events are applied strictly in log order; once the
//! session reaches [`ArcadePhase::GameOver`] nothing changes any more.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::config::{ArcadeConfig, ArcadeRules, LadderStep};
use crate::log_event::{LogEvent, PlayerSpawn};
use crate::objectives::ObjectiveSet;
use crate::player::ArcadePlayer;
use crate::registry::{DamageSource, VehicleRegistry, SENTINEL_ATTACKER_ID};
use crate::scenario::{Scenario, ScenarioVehicle};
use crate::scoring::{compute_score, ScoreReport, ScoringRules};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcadePhase {
    NotStarted,
    Started,
    GameOver,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOverReason {
    PlayerExited,
    ObjectiveReached,
    PilotEjected,
    PlaneDestroyed,
    PilotKilled,
    /// A different account spawned into the running session.
    IdentityViolation { expected: String, found: String },
}

impl GameOverReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameOverReason::PlayerExited => "player_exited",
            GameOverReason::ObjectiveReached => "objective_reached",
            GameOverReason::PilotEjected => "pilot_ejected",
            GameOverReason::PlaneDestroyed => "plane_destroyed",
            GameOverReason::PilotKilled => "pilot_killed",
            GameOverReason::IdentityViolation { .. } => "identity_violation",
        }
    }
}

/// Non-terminal transitions the caller may want to announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArcadeNotice {
    Started,
    Respawned { lives_remaining: u32 },
    Exited { lives_remaining: u32 },
    IdentityViolation { expected: String, found: String },
}

/// A ladder step that was just reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnUnlock {
    pub spawn: String,
    pub threshold: i64,
    pub score: i64,
    pub extra_lives: u32,
}

#[derive(Debug, Clone)]
pub struct ArcadeMission {
    objectives: ObjectiveSet,
    registry: VehicleRegistry,
    rules: ArcadeRules,
    scoring: ScoringRules,
    player: Option<ArcadePlayer>,
    plane_id_history: Vec<i64>,
    phase: ArcadePhase,
    player_exited: bool,
    extra_lives: u32,
    spawn_ladder: VecDeque<LadderStep>,
    airfields_unlocked: u32,
    score: i64,
    last_status_broadcast: Option<DateTime<Utc>>,
    game_over_reason: Option<GameOverReason>,
    game_over_taken: bool,
}

impl ArcadeMission {
    pub fn new(
        objectives: ObjectiveSet,
        vehicles: &[ScenarioVehicle],
        rules: &ArcadeRules,
        scoring: &ScoringRules,
    ) -> Self {
        if objectives.get(&rules.start_objective).is_none() {
            tracing::error!(
                target: "arcade::state",
                objective = %rules.start_objective,
                "arcade.start_objective_missing"
            );
        }
        let mut ladder = rules.spawn_ladder.clone();
        ladder.sort_by_key(|step| step.threshold);
        Self {
            objectives,
            registry: VehicleRegistry::from_scenario(vehicles, &scoring.points),
            rules: rules.clone(),
            scoring: scoring.clone(),
            player: None,
            plane_id_history: Vec::new(),
            phase: ArcadePhase::NotStarted,
            player_exited: false,
            extra_lives: 0,
            spawn_ladder: ladder.into(),
            airfields_unlocked: 0,
            score: 0,
            last_status_broadcast: None,
            game_over_reason: None,
            game_over_taken: false,
        }
    }

    pub fn from_scenario(scenario: &Scenario, config: &ArcadeConfig) -> Self {
        Self::new(
            scenario.objectives.clone(),
            &scenario.vehicles,
            &config.rules,
            &config.scoring,
        )
    }

    /// Applies one event in log order.
    pub fn apply(&mut self, event: &LogEvent) -> Option<ArcadeNotice> {
        match self.phase {
            ArcadePhase::GameOver => None,
            ArcadePhase::NotStarted => self.apply_before_start(event),
            ArcadePhase::Started => self.apply_started(event),
        }
    }

    fn apply_before_start(&mut self, event: &LogEvent) -> Option<ArcadeNotice> {
        match event {
            LogEvent::PlayerSpawn(spawn) => self.try_start(spawn),
            LogEvent::VehicleSpawn {
                runtime_id,
                display_type,
                design_name,
            } => {
                self.registry
                    .register_spawn(*runtime_id, design_name, display_type);
                None
            }
            _ => None,
        }
    }

    fn try_start(&mut self, spawn: &PlayerSpawn) -> Option<ArcadeNotice> {
        let start = self.objectives.get(&self.rules.start_objective)?;
        if !spawn.position.is_near(&start.coordinates, self.rules.spawn_radius) {
            tracing::debug!(
                target: "arcade::state",
                alias = %spawn.alias,
                position = %spawn.position,
                "arcade.spawn_outside_start"
            );
            return None;
        }
        tracing::info!(
            target: "arcade::state",
            alias = %spawn.alias,
            plane = %spawn.plane_type,
            plane_id = spawn.plane_id,
            "arcade.player.started"
        );
        self.player = Some(ArcadePlayer::from_spawn(spawn));
        self.plane_id_history.push(spawn.plane_id);
        self.phase = ArcadePhase::Started;
        Some(ArcadeNotice::Started)
    }

    fn apply_started(&mut self, event: &LogEvent) -> Option<ArcadeNotice> {
        match event {
            LogEvent::MissionStart => None,
            LogEvent::PlayerSpawn(spawn) => self.respawn(spawn),
            LogEvent::PlayerExit { pilot_id, .. } => self.player_exit(*pilot_id),
            LogEvent::ObjectiveTrigger {
                objective_id,
                position,
            } => {
                let reached = self
                    .objectives
                    .nearest_within(position, self.rules.objective_radius)
                    .map(|objective| objective.name.clone());
                tracing::debug!(
                    target: "arcade::state",
                    objective_id,
                    objective = reached.as_deref().unwrap_or("-"),
                    "arcade.objective_triggered"
                );
                if reached.as_deref() == Some(self.rules.game_over_objective.as_str()) {
                    self.end(GameOverReason::ObjectiveReached);
                }
                None
            }
            LogEvent::PilotEject { bot_id, .. } => {
                let player = self.player.as_mut()?;
                if *bot_id == player.pilot_runtime_id {
                    player.ejected = true;
                    player.plane_destroyed = true;
                    self.end(GameOverReason::PilotEjected);
                }
                None
            }
            LogEvent::VehicleSpawn {
                runtime_id,
                display_type,
                design_name,
            } => {
                self.registry
                    .register_spawn(*runtime_id, design_name, display_type);
                None
            }
            LogEvent::Damage {
                amount,
                attacker_id,
                target_id,
            } => {
                self.damage(*amount, *attacker_id, *target_id);
                None
            }
            LogEvent::Kill {
                attacker_id,
                target_id,
            } => {
                self.kill(*attacker_id, *target_id);
                None
            }
        }
    }

    fn respawn(&mut self, spawn: &PlayerSpawn) -> Option<ArcadeNotice> {
        let player = self.player.as_mut()?;
        if spawn.permanent_id != player.permanent_id {
            let expected = player.permanent_id.clone();
            tracing::warn!(
                target: "arcade::state",
                expected = %expected,
                found = %spawn.permanent_id,
                alias = %spawn.alias,
                "arcade.identity_violation"
            );
            let reason = GameOverReason::IdentityViolation {
                expected: expected.clone(),
                found: spawn.permanent_id.clone(),
            };
            self.end(reason);
            return Some(ArcadeNotice::IdentityViolation {
                expected,
                found: spawn.permanent_id.clone(),
            });
        }
        player.respawn(spawn);
        self.plane_id_history.push(spawn.plane_id);
        self.extra_lives = self.extra_lives.saturating_sub(1);
        self.player_exited = false;
        tracing::info!(
            target: "arcade::state",
            alias = %spawn.alias,
            plane_id = spawn.plane_id,
            lives_remaining = self.extra_lives,
            "arcade.player.respawned"
        );
        Some(ArcadeNotice::Respawned {
            lives_remaining: self.extra_lives,
        })
    }

    fn player_exit(&mut self, pilot_id: i64) -> Option<ArcadeNotice> {
        let player = self.player.as_ref()?;
        if pilot_id != player.pilot_runtime_id {
            return None;
        }
        self.player_exited = true;
        tracing::info!(
            target: "arcade::state",
            alias = %player.alias,
            lives_remaining = self.extra_lives,
            "arcade.player.exited"
        );
        if self.extra_lives == 0 {
            self.end(GameOverReason::PlayerExited);
        }
        Some(ArcadeNotice::Exited {
            lives_remaining: self.extra_lives,
        })
    }

    fn damage_source(&self, attacker_id: i64) -> DamageSource {
        if self.plane_id_history.contains(&attacker_id) {
            DamageSource::Player
        } else if attacker_id == SENTINEL_ATTACKER_ID {
            DamageSource::SelfInflicted
        } else {
            DamageSource::Other
        }
    }

    fn damage(&mut self, amount: f64, attacker_id: i64, target_id: i64) {
        let exited = self.player_exited;
        let source = self.damage_source(attacker_id);
        let Some(player) = self.player.as_mut() else {
            return;
        };
        if target_id == player.plane_runtime_id {
            if !exited {
                player.plane_damage += amount;
            }
            return;
        }
        if target_id == player.pilot_runtime_id {
            if !exited {
                player.pilot_damage += amount;
            }
            return;
        }
        match self.registry.by_runtime_mut(target_id) {
            Some(vehicle) => vehicle.apply_damage(amount, source),
            None => tracing::debug!(
                target: "arcade::state",
                target_id,
                attacker_id,
                entity = self
                    .registry
                    .other(target_id)
                    .map_or("-", |other| other.display_type.as_str()),
                "arcade.damage_untracked"
            ),
        }
    }

    fn kill(&mut self, attacker_id: i64, target_id: i64) {
        let exited = self.player_exited;
        let by_player_plane = self.plane_id_history.contains(&attacker_id);
        let Some(player) = self.player.as_mut() else {
            return;
        };
        if target_id == player.plane_runtime_id {
            if !exited {
                player.plane_destroyed = true;
                self.end(GameOverReason::PlaneDestroyed);
            }
            return;
        }
        if target_id == player.pilot_runtime_id {
            if !exited {
                player.killed = true;
                self.end(GameOverReason::PilotKilled);
            }
            return;
        }
        match self.registry.by_runtime_mut(target_id) {
            Some(vehicle) => {
                vehicle.destroyed = true;
                let self_destroyed_after_hits =
                    attacker_id == SENTINEL_ATTACKER_ID && vehicle.player_damaged;
                if by_player_plane || self_destroyed_after_hits {
                    vehicle.killed_by_player = true;
                }
                tracing::info!(
                    target: "arcade::state",
                    vehicle = %vehicle.full_name,
                    count_id = vehicle.count_id,
                    killed_by_player = vehicle.killed_by_player,
                    "arcade.vehicle.destroyed"
                );
            }
            None => tracing::debug!(
                target: "arcade::state",
                target_id,
                attacker_id,
                "arcade.kill_untracked"
            ),
        }
    }

    fn end(&mut self, reason: GameOverReason) {
        if self.phase == ArcadePhase::GameOver {
            return;
        }
        tracing::info!(
            target: "arcade::state",
            reason = reason.as_str(),
            "arcade.game_over"
        );
        self.phase = ArcadePhase::GameOver;
        self.game_over_reason = Some(reason);
    }

    /// Hands out the game-over transition exactly once.
    pub fn take_game_over(&mut self) -> Option<GameOverReason> {
        if self.phase != ArcadePhase::GameOver || self.game_over_taken {
            return None;
        }
        self.game_over_taken = true;
        self.game_over_reason.clone()
    }

    pub fn refresh_score(&mut self) -> i64 {
        self.score = self.final_report().map_or(0, |report| report.score);
        self.score
    }

    pub fn final_report(&self) -> Option<ScoreReport> {
        self.player
            .as_ref()
            .map(|player| compute_score(player, self.registry.vehicles(), &self.scoring))
    }

    /// Unlocks every ladder step the current score has reached, lowest first.
    pub fn check_milestones(&mut self) -> Vec<SpawnUnlock> {
        let eligible = self.phase == ArcadePhase::Started
            && self
                .player
                .as_ref()
                .is_some_and(ArcadePlayer::is_flying_intact);
        if !eligible {
            return Vec::new();
        }
        let score = self.refresh_score();
        let mut unlocks = Vec::new();
        while self
            .spawn_ladder
            .front()
            .is_some_and(|step| step.threshold <= score)
        {
            let Some(step) = self.spawn_ladder.pop_front() else {
                break;
            };
            self.extra_lives += 1;
            self.airfields_unlocked += 1;
            tracing::info!(
                target: "arcade::state",
                spawn = %step.spawn,
                threshold = step.threshold,
                score,
                "arcade.spawn_unlocked"
            );
            unlocks.push(SpawnUnlock {
                spawn: step.spawn,
                threshold: step.threshold,
                score,
                extra_lives: self.extra_lives,
            });
        }
        unlocks
    }

    /// A status broadcast is due once `interval` has passed since the last one.
    pub fn status_due(&self, now: DateTime<Utc>, interval: chrono::Duration) -> bool {
        self.phase == ArcadePhase::Started
            && self
                .last_status_broadcast
                .map_or(true, |last| now - last >= interval)
    }

    pub fn record_status_broadcast(&mut self, now: DateTime<Utc>) {
        self.last_status_broadcast = Some(now);
    }

    pub fn phase(&self) -> ArcadePhase {
        self.phase
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == ArcadePhase::GameOver
    }

    pub fn player(&self) -> Option<&ArcadePlayer> {
        self.player.as_ref()
    }

    pub fn registry(&self) -> &VehicleRegistry {
        &self.registry
    }

    pub fn plane_id_history(&self) -> &[i64] {
        &self.plane_id_history
    }

    pub fn player_exited(&self) -> bool {
        self.player_exited
    }

    pub fn extra_lives(&self) -> u32 {
        self.extra_lives
    }

    pub fn airfields_unlocked(&self) -> u32 {
        self.airfields_unlocked
    }

    /// Score as of the last refresh.
    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn game_over_reason(&self) -> Option<&GameOverReason> {
        self.game_over_reason.as_ref()
    }
}
