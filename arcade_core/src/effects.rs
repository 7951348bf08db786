//! Side effects of arcade transitions: console triggers, chat broadcasts and
//! persisted results.

use chrono::{DateTime, Utc};
use remote_console::{ConsoleCommand, ConsoleError, RemoteConsole};

use crate::arcade::SpawnUnlock;
use crate::config::ArcadeRules;
use crate::highscores::{GameResult, LeaderboardPublisher, ResultStore};
use crate::player::ArcadePlayer;
use crate::scoring::ScoreReport;

/// Where console commands and chat go.
pub trait ConsoleSink {
    fn send_command(&mut self, command: &ConsoleCommand) -> Result<(), ConsoleError>;

    fn broadcast(&mut self, message: &str) -> Result<(), ConsoleError>;

    /// Drops any connection so the next call starts fresh.
    fn reset(&mut self) {}
}

impl ConsoleSink for RemoteConsole {
    fn send_command(&mut self, command: &ConsoleCommand) -> Result<(), ConsoleError> {
        self.send(command).map(|_| ())
    }

    fn broadcast(&mut self, message: &str) -> Result<(), ConsoleError> {
        RemoteConsole::broadcast(self, message)
    }

    fn reset(&mut self) {
        RemoteConsole::reset(self);
    }
}

/// Dry-run sink that only logs.
#[derive(Debug, Default)]
pub struct LoggingConsole;

impl ConsoleSink for LoggingConsole {
    fn send_command(&mut self, command: &ConsoleCommand) -> Result<(), ConsoleError> {
        tracing::info!(target: "arcade::effects", command = %command, "console.dry_run.command");
        Ok(())
    }

    fn broadcast(&mut self, message: &str) -> Result<(), ConsoleError> {
        tracing::info!(target: "arcade::effects", message, "console.dry_run.broadcast");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    Killed,
    Excellent,
    Good,
    Poor,
}

impl SoundCue {
    pub fn trigger<'a>(&self, rules: &'a ArcadeRules) -> &'a str {
        match self {
            SoundCue::Killed => &rules.sound_cues.killed,
            SoundCue::Excellent => &rules.sound_cues.excellent,
            SoundCue::Good => &rules.sound_cues.good,
            SoundCue::Poor => &rules.sound_cues.poor,
        }
    }
}

pub fn select_sound_cue(score: i64, player: &ArcadePlayer, rules: &ArcadeRules) -> SoundCue {
    if player.killed {
        SoundCue::Killed
    } else if score >= rules.excellent_threshold && player.is_flying_intact() {
        SoundCue::Excellent
    } else if score > 0 {
        SoundCue::Good
    } else {
        SoundCue::Poor
    }
}

/// Turns arcade transitions into console traffic and stored results.
pub struct OutcomeEffects<C, S, P> {
    console: C,
    store: S,
    publisher: P,
    rules: ArcadeRules,
    title: String,
}

impl<C, S, P> OutcomeEffects<C, S, P>
where
    C: ConsoleSink,
    S: ResultStore,
    P: LeaderboardPublisher,
{
    pub fn new(console: C, store: S, publisher: P, rules: ArcadeRules, title: String) -> Self {
        Self {
            console,
            store,
            publisher,
            rules,
            title,
        }
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn on_start(&mut self, player: &ArcadePlayer) -> Result<(), ConsoleError> {
        let first_goal = self
            .rules
            .spawn_ladder
            .iter()
            .map(|step| step.threshold)
            .min();
        let mut message = format!(
            "{} has started {} flying a {}.",
            player.alias, self.title, player.plane_type
        );
        if let Some(goal) = first_goal {
            message.push_str(&format!(
                "\nScore {goal} points to unlock an extra airfield."
            ));
        }
        self.console.broadcast(&message)
    }

    pub fn on_respawn(
        &mut self,
        player: &ArcadePlayer,
        lives_remaining: u32,
    ) -> Result<(), ConsoleError> {
        self.console.broadcast(&format!(
            "{} is back in the air. Extra lives remaining: {lives_remaining}",
            player.alias
        ))
    }

    pub fn on_exit(
        &mut self,
        player: &ArcadePlayer,
        lives_remaining: u32,
    ) -> Result<(), ConsoleError> {
        if lives_remaining == 0 {
            return Ok(());
        }
        self.console.broadcast(&format!(
            "{} landed or left the plane. Spawn at an unlocked airfield to continue ({lives_remaining} extra lives).",
            player.alias
        ))
    }

    /// Opens the unlocked spawn. The trigger is sent twice because the server
    /// occasionally drops the first one.
    pub fn on_milestone(&mut self, unlock: &SpawnUnlock) -> Result<(), ConsoleError> {
        tracing::info!(
            target: "arcade::effects",
            spawn = %unlock.spawn,
            score = unlock.score,
            "effects.milestone"
        );
        let trigger = ConsoleCommand::server_input(unlock.spawn.as_str());
        self.console.send_command(&trigger)?;
        self.console.send_command(&trigger)?;
        self.console.broadcast(&format!(
            "{} points reached! Airfield {} is now open. Extra lives: {}",
            unlock.score, unlock.spawn, unlock.extra_lives
        ))
    }

    pub fn on_status(&mut self, player: &ArcadePlayer, score: i64) -> Result<(), ConsoleError> {
        self.console
            .broadcast(&format!("{} score: {score} points", player.alias))
    }

    pub fn on_identity_violation(
        &mut self,
        expected: &str,
        found: &str,
    ) -> Result<(), ConsoleError> {
        tracing::warn!(
            target: "arcade::effects",
            expected,
            found,
            "effects.identity_violation"
        );
        self.console.broadcast(
            "ARCADE ERROR: a different pilot took the arcade spawn. The game is over; reset the mission to play again.",
        )
    }

    /// Closes the airfields, plays the verdict, announces and stores the
    /// result. The result is stored even when the console is unreachable;
    /// the first console failure is returned afterwards.
    pub fn on_game_over(
        &mut self,
        report: &ScoreReport,
        player: &ArcadePlayer,
        now: DateTime<Utc>,
    ) -> Result<(), ConsoleError> {
        let console_result = self.announce_game_over(report, player);
        if let Err(err) = &console_result {
            tracing::warn!(
                target: "arcade::effects",
                error = %err,
                "effects.game_over_console_failed"
            );
        }
        self.persist(report, player, now);
        console_result
    }

    fn announce_game_over(
        &mut self,
        report: &ScoreReport,
        player: &ArcadePlayer,
    ) -> Result<(), ConsoleError> {
        let close = ConsoleCommand::server_input(self.rules.close_airfields_trigger.as_str());
        self.console.send_command(&close)?;
        self.console.send_command(&close)?;

        let cue = select_sound_cue(report.score, player, &self.rules);
        let sound = ConsoleCommand::server_input(cue.trigger(&self.rules));
        self.console.send_command(&sound)?;

        self.console.broadcast(&format!(
            "{}\nLeaderboard: {}",
            report.render(),
            self.rules.leaderboard_url
        ))
    }

    fn persist(&mut self, report: &ScoreReport, player: &ArcadePlayer, now: DateTime<Utc>) {
        let result = GameResult {
            alias: player.alias.clone(),
            permanent_id: player.permanent_id.clone(),
            plane: player.plane_type.clone(),
            score: report.score,
            scoring_detail: report.detail_text(),
            timestamp: now,
        };
        let results = match self.store.append(result) {
            Ok(results) => results,
            Err(err) => {
                tracing::error!(
                    target: "arcade::effects",
                    error = %err,
                    alias = %player.alias,
                    score = report.score,
                    "effects.result_store_failed"
                );
                return;
            }
        };
        if let Err(err) = self.publisher.publish(&results) {
            tracing::warn!(
                target: "arcade::effects",
                error = %err,
                "effects.leaderboard_publish_failed"
            );
        }
    }
}
