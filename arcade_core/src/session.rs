//! The polling session: one explicit context tying log files, the arcade
//! state machine and its effects together.

use std::{
    collections::{BTreeMap, VecDeque},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use remote_console::ConsoleError;
use thiserror::Error;

use crate::arcade::{ArcadeMission, ArcadeNotice, ArcadePhase, GameOverReason, SpawnUnlock};
use crate::config::ArcadeConfig;
use crate::effects::{ConsoleSink, OutcomeEffects};
use crate::highscores::{LeaderboardPublisher, ResultStore};
use crate::log_event::{parse_line, LogEvent};
use crate::log_source::{
    pending_log_files, read_log_lines, retire_log_file, LogLines, LogSourceError, RetirePolicy,
};
use crate::scenario::{Scenario, ScenarioError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    LogSource(#[from] LogSourceError),
}

/// What one [`ArcadeSession::poll`] cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub files_processed: usize,
    pub events_applied: usize,
    pub parse_errors: usize,
    /// Events read while no game could change: after game over or before a
    /// mission was loaded.
    pub drained: usize,
    pub games_finished: usize,
    pub console_down: bool,
}

pub struct ArcadeSession<C, S, P> {
    config: ArcadeConfig,
    effects: OutcomeEffects<C, S, P>,
    scenario: Scenario,
    mission: Option<ArcadeMission>,
    /// Lines already applied from files the simulator still holds open.
    applied_lines: BTreeMap<PathBuf, usize>,
    /// Unlocks the console has not confirmed yet, oldest first.
    pending_unlocks: VecDeque<SpawnUnlock>,
}

impl<C, S, P> ArcadeSession<C, S, P>
where
    C: ConsoleSink,
    S: ResultStore,
    P: LeaderboardPublisher,
{
    pub fn new(config: ArcadeConfig, console: C, store: S, publisher: P) -> Self {
        let effects = OutcomeEffects::new(
            console,
            store,
            publisher,
            config.rules.clone(),
            config.scoring.title.clone(),
        );
        Self {
            config,
            effects,
            scenario: Scenario::default(),
            mission: None,
            applied_lines: BTreeMap::new(),
            pending_unlocks: VecDeque::new(),
        }
    }

    /// Reads the scenario files named in the config.
    pub fn load_mission(&mut self) -> Result<(), SessionError> {
        let scenario = Scenario::load(&self.config.paths)?;
        self.with_scenario(scenario);
        Ok(())
    }

    pub fn with_scenario(&mut self, scenario: Scenario) {
        if scenario.is_arcade {
            tracing::info!(
                target: "arcade::session",
                vehicles = scenario.vehicles.len(),
                objectives = scenario.objectives.len(),
                "session.mission_loaded"
            );
            self.mission = Some(ArcadeMission::from_scenario(&scenario, &self.config));
        } else {
            tracing::info!(target: "arcade::session", "session.not_arcade");
            self.mission = None;
        }
        self.scenario = scenario;
        self.pending_unlocks.clear();
    }

    pub fn config(&self) -> &ArcadeConfig {
        &self.config
    }

    pub fn mission(&self) -> Option<&ArcadeMission> {
        self.mission.as_ref()
    }

    pub fn is_arcade(&self) -> bool {
        self.scenario.is_arcade
    }

    pub fn effects(&self) -> &OutcomeEffects<C, S, P> {
        &self.effects
    }

    pub fn console_mut(&mut self) -> &mut C {
        self.effects.console_mut()
    }

    /// One cycle: every pending report in mtime order, then the status
    /// broadcast if one is due.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Result<PollReport, SessionError> {
        let files = pending_log_files(&self.config.paths.mission_logs)?;
        let policy = RetirePolicy {
            archive: self.config.paths.archive_logs,
            backup_dir: self.config.paths.backup_dir.clone(),
        };
        let mut report = PollReport::default();

        self.applied_lines.retain(|path, _| files.contains(path));

        for path in files {
            if !self.scenario.is_arcade {
                report.files_processed += 1;
                self.retire(&path, &policy);
                continue;
            }
            let log = match read_log_lines(&path) {
                Ok(log) => log,
                Err(err) => {
                    tracing::warn!(
                        target: "arcade::session",
                        error = %err,
                        "session.log_read_failed"
                    );
                    continue;
                }
            };
            self.apply_new_lines(&path, &log, now, &mut report);
            report.files_processed += 1;
            let still_open = self.retire(&path, &policy);
            self.settle_file(path, &log, still_open, now, &mut report);
        }

        if !report.console_down {
            // Unlocks that failed in an earlier cycle.
            self.check_milestones(&mut report);
        }
        self.broadcast_status_if_due(now, &mut report);
        if report.files_processed > 0 {
            tracing::debug!(
                target: "arcade::session",
                files = report.files_processed,
                events = report.events_applied,
                parse_errors = report.parse_errors,
                drained = report.drained,
                "session.poll_complete"
            );
        }
        Ok(report)
    }

    /// Applies the complete lines of `log` not applied in an earlier cycle.
    fn apply_new_lines(
        &mut self,
        path: &Path,
        log: &LogLines,
        now: DateTime<Utc>,
        report: &mut PollReport,
    ) {
        let already = self.applied_lines.get(path).copied().unwrap_or(0);
        let skip = if already <= log.complete.len() { already } else { 0 };
        for line in &log.complete[skip..] {
            self.apply_line(line, now, report);
        }
    }

    /// Returns whether the file is still on disk.
    fn retire(&self, path: &Path, policy: &RetirePolicy) -> bool {
        match retire_log_file(path, policy) {
            Ok(retired) => !retired.is_gone(),
            Err(err) => {
                tracing::warn!(
                    target: "arcade::session",
                    error = %err,
                    "session.log_retire_failed"
                );
                true
            }
        }
    }

    /// A file left open keeps its unterminated tail for the next cycle. Once
    /// the file is gone the tail is all there will ever be.
    fn settle_file(
        &mut self,
        path: PathBuf,
        log: &LogLines,
        still_open: bool,
        now: DateTime<Utc>,
        report: &mut PollReport,
    ) {
        if still_open {
            self.applied_lines.insert(path, log.complete.len());
        } else {
            self.applied_lines.remove(&path);
            if let Some(tail) = &log.partial {
                self.apply_line(tail, now, report);
            }
        }
        self.check_milestones(report);
    }

    fn apply_line(&mut self, line: &str, now: DateTime<Utc>, report: &mut PollReport) {
        let event = match parse_line(line) {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(err) => {
                report.parse_errors += 1;
                tracing::warn!(
                    target: "arcade::parser",
                    error = %err,
                    line,
                    "parser.line_skipped"
                );
                return;
            }
        };
        report.events_applied += 1;

        if matches!(event, LogEvent::MissionStart) {
            self.restart_mission();
            return;
        }

        let Some(mission) = self.mission.as_mut() else {
            report.drained += 1;
            return;
        };
        if mission.is_game_over() {
            report.drained += 1;
            return;
        }

        if let Some(notice) = mission.apply(&event) {
            let result = dispatch_notice(&mut self.effects, mission, notice, now);
            note_console(result, report);
        }
        if let Some(reason) = mission.take_game_over() {
            report.games_finished += 1;
            self.pending_unlocks.clear();
            let result = finish_game(&mut self.effects, mission, &reason, now);
            note_console(result, report);
        }
    }

    /// A simulator mission reload discards the running game.
    fn restart_mission(&mut self) {
        if !self.scenario.is_arcade {
            return;
        }
        if let Some(previous) = &self.mission {
            if previous.phase() == ArcadePhase::Started {
                tracing::warn!(
                    target: "arcade::session",
                    score = previous.score(),
                    "session.game_abandoned"
                );
            }
        }
        tracing::info!(target: "arcade::session", "session.mission_restarted");
        self.pending_unlocks.clear();
        self.mission = Some(ArcadeMission::from_scenario(&self.scenario, &self.config));
    }

    fn check_milestones(&mut self, report: &mut PollReport) {
        let Some(mission) = self.mission.as_mut() else {
            return;
        };
        self.pending_unlocks.extend(mission.check_milestones());
        while let Some(unlock) = self.pending_unlocks.front() {
            if let Err(err) = self.effects.on_milestone(unlock) {
                tracing::warn!(
                    target: "arcade::session",
                    spawn = %unlock.spawn,
                    pending = self.pending_unlocks.len(),
                    "session.unlock_deferred"
                );
                note_console(Err(err), report);
                return;
            }
            self.pending_unlocks.pop_front();
        }
    }

    fn broadcast_status_if_due(&mut self, now: DateTime<Utc>, report: &mut PollReport) {
        let interval = self.config.timing.status_interval();
        let Some(mission) = self.mission.as_mut() else {
            return;
        };
        if !mission.status_due(now, interval) {
            return;
        }
        let score = mission.refresh_score();
        mission.record_status_broadcast(now);
        if let Some(player) = mission.player() {
            let result = self.effects.on_status(player, score);
            note_console(result, report);
        }
    }
}

fn dispatch_notice<C, S, P>(
    effects: &mut OutcomeEffects<C, S, P>,
    mission: &mut ArcadeMission,
    notice: ArcadeNotice,
    now: DateTime<Utc>,
) -> Result<(), ConsoleError>
where
    C: ConsoleSink,
    S: ResultStore,
    P: LeaderboardPublisher,
{
    match notice {
        ArcadeNotice::Started => {
            mission.record_status_broadcast(now);
            match mission.player() {
                Some(player) => effects.on_start(player),
                None => Ok(()),
            }
        }
        ArcadeNotice::Respawned { lives_remaining } => match mission.player() {
            Some(player) => effects.on_respawn(player, lives_remaining),
            None => Ok(()),
        },
        ArcadeNotice::Exited { lives_remaining } => match mission.player() {
            Some(player) => effects.on_exit(player, lives_remaining),
            None => Ok(()),
        },
        ArcadeNotice::IdentityViolation { expected, found } => {
            effects.on_identity_violation(&expected, &found)
        }
    }
}

fn finish_game<C, S, P>(
    effects: &mut OutcomeEffects<C, S, P>,
    mission: &mut ArcadeMission,
    reason: &GameOverReason,
    now: DateTime<Utc>,
) -> Result<(), ConsoleError>
where
    C: ConsoleSink,
    S: ResultStore,
    P: LeaderboardPublisher,
{
    mission.refresh_score();
    let (Some(report), Some(player)) = (mission.final_report(), mission.player()) else {
        return Ok(());
    };
    tracing::info!(
        target: "arcade::session",
        reason = reason.as_str(),
        alias = %player.alias,
        score = report.score,
        "session.game_over"
    );
    effects.on_game_over(&report, player, now)
}

fn note_console(result: Result<(), ConsoleError>, report: &mut PollReport) {
    if let Err(err) = result {
        tracing::warn!(target: "arcade::session", error = %err, "session.console_failed");
        report.console_down = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3;
    use crate::highscores::{GameResult, PublishError, ResultStoreError};
    use crate::objectives::{MissionObjective, ObjectiveSet};
    use chrono::TimeZone;
    use remote_console::ConsoleCommand;

    const VERSION: &str = "T:1 AType:15 VER:17";
    const SPAWN: &str = "T:20 AType:10 PLID:2001 PID:2002 BUL:1200 SH:0 BOMB:1 RCT:0 \
        (1010.000,80.000,2005.000) IDS:perm-limbo LOGIN:profile-limbo NAME:Limbo \
        TYPE:Ju 87 D-3 COUNTRY:201 FORM:0 FIELD:0 INAIR:2 PARENT:-1 ISPL:1 ISTSTART:1 \
        PAYLOAD:0 FUEL:1.000 SKIN: WM:1";
    const EXIT: &str =
        "T:300 AType:4 PLID:2001 PID:2002 BUL:850 SH:0 BOMB:0 RCT:0 (1010.000,80.000,2005.000)";

    #[derive(Default)]
    struct Console(Vec<String>);

    impl ConsoleSink for Console {
        fn send_command(&mut self, command: &ConsoleCommand) -> Result<(), ConsoleError> {
            self.0.push(command.to_wire());
            Ok(())
        }

        fn broadcast(&mut self, message: &str) -> Result<(), ConsoleError> {
            self.send_command(&ConsoleCommand::chat_to_all(message))
        }
    }

    #[derive(Default)]
    struct MemoryStore(Vec<GameResult>);

    impl ResultStore for MemoryStore {
        fn load(&self) -> Result<Vec<GameResult>, ResultStoreError> {
            Ok(self.0.clone())
        }

        fn append(&mut self, result: GameResult) -> Result<Vec<GameResult>, ResultStoreError> {
            self.0.push(result);
            Ok(self.0.clone())
        }
    }

    struct NoBoard;

    impl LeaderboardPublisher for NoBoard {
        fn publish(&mut self, _results: &[GameResult]) -> Result<(), PublishError> {
            Ok(())
        }
    }

    fn session(mission_logs: String) -> ArcadeSession<Console, MemoryStore, NoBoard> {
        let mut config = ArcadeConfig::builtin();
        config.paths.mission_logs = mission_logs;
        let mut session =
            ArcadeSession::new(config, Console::default(), MemoryStore::default(), NoBoard);
        session.with_scenario(Scenario {
            vehicles: Vec::new(),
            objectives: ObjectiveSet::new(vec![MissionObjective {
                name: "PlayerStart".into(),
                index: 3,
                coordinates: Point3::new(1000.0, 80.0, 2000.0),
            }]),
            is_arcade: true,
        });
        session
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 20, 0, 0).unwrap()
    }

    fn phase<C, S, P>(session: &ArcadeSession<C, S, P>) -> Option<ArcadePhase> {
        session.mission.as_ref().map(ArcadeMission::phase)
    }

    #[test]
    fn open_file_resumes_at_the_half_written_line() {
        let mut session = session("unused/missionReport*.txt".into());
        let path = PathBuf::from("missionReport(2024-03-05_20-00-00)[0].txt");

        let first = LogLines::split(&format!("{VERSION}\n{}", &SPAWN[..40]));
        let mut report = PollReport::default();
        session.apply_new_lines(&path, &first, now(), &mut report);
        session.settle_file(path.clone(), &first, true, now(), &mut report);
        assert_eq!(report.events_applied, 1);
        assert_eq!(report.parse_errors, 0);
        assert_eq!(session.applied_lines.get(&path), Some(&1));
        assert_eq!(phase(&session), Some(ArcadePhase::NotStarted));

        let second = LogLines::split(&format!("{VERSION}\n{SPAWN}\n"));
        let mut report = PollReport::default();
        session.apply_new_lines(&path, &second, now(), &mut report);
        session.settle_file(path.clone(), &second, true, now(), &mut report);
        assert_eq!(report.events_applied, 1);
        assert_eq!(session.applied_lines.get(&path), Some(&2));
        assert_eq!(phase(&session), Some(ArcadePhase::Started));
        assert_eq!(
            session
                .mission()
                .and_then(|m| m.player())
                .map(|p| p.alias.as_str()),
            Some("Limbo")
        );
    }

    #[test]
    fn retired_file_applies_its_unterminated_tail() {
        let mut session = session("unused/missionReport*.txt".into());
        let path = PathBuf::from("missionReport(2024-03-05_20-00-00)[0].txt");

        let open = LogLines::split(&format!("{VERSION}\n{SPAWN}\n"));
        let mut report = PollReport::default();
        session.apply_new_lines(&path, &open, now(), &mut report);
        session.settle_file(path.clone(), &open, true, now(), &mut report);

        let closed = LogLines::split(&format!("{VERSION}\n{SPAWN}\n{EXIT}"));
        let mut report = PollReport::default();
        session.apply_new_lines(&path, &closed, now(), &mut report);
        assert_eq!(report.events_applied, 0);
        session.settle_file(path.clone(), &closed, false, now(), &mut report);

        assert_eq!(report.events_applied, 1);
        assert_eq!(report.games_finished, 1);
        assert!(session.applied_lines.is_empty());
        assert_eq!(phase(&session), Some(ArcadePhase::GameOver));
        assert_eq!(session.effects().store().0.len(), 1);
    }

    #[test]
    fn vanished_open_files_are_forgotten() {
        let dir = std::env::temp_dir().join(format!(
            "arcade_session_vanished_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let pattern = dir.join("missionReport*.txt").to_string_lossy().into_owned();
        let mut session = session(pattern);
        session
            .applied_lines
            .insert(dir.join("missionReport(2024-03-05_20-00-00)[0].txt"), 12);

        let report = session.poll(now()).unwrap();

        assert_eq!(report.files_processed, 0);
        assert!(session.applied_lines.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
