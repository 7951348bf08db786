#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use arcade_core::{
    ArcadeConfig, ArcadeSession, ConsoleSink, JsonResultStore, StaticLeaderboard,
};
use remote_console::{ConsoleCommand, ConsoleError};

pub type TestSession = ArcadeSession<RecordingConsole, JsonResultStore, StaticLeaderboard>;

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Records every command in wire form instead of talking to a server.
#[derive(Debug, Default)]
pub struct RecordingConsole {
    pub sent: Vec<String>,
    pub resets: usize,
    /// When set every command fails as if the server stopped answering.
    pub offline: bool,
}

impl RecordingConsole {
    pub fn triggers(&self) -> Vec<&str> {
        self.sent
            .iter()
            .filter_map(|wire| wire.strip_prefix("serverinput "))
            .collect()
    }

    pub fn chat(&self) -> Vec<&str> {
        self.sent
            .iter()
            .filter_map(|wire| wire.strip_prefix("chatmsg 0 0 "))
            .collect()
    }
}

impl ConsoleSink for RecordingConsole {
    fn send_command(&mut self, command: &ConsoleCommand) -> Result<(), ConsoleError> {
        if self.offline {
            return Err(ConsoleError::Exhausted {
                command: command.to_string(),
                attempts: 8,
            });
        }
        self.sent.push(command.to_wire());
        Ok(())
    }

    fn broadcast(&mut self, message: &str) -> Result<(), ConsoleError> {
        self.send_command(&ConsoleCommand::chat_to_all(message))
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

/// A scratch server directory holding scenario files, reports and results.
pub struct Workspace {
    pub root: PathBuf,
    next_mtime: u64,
}

impl Workspace {
    pub fn new(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "arcade_it_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("logs")).expect("create logs dir");
        fs::create_dir_all(root.join("mission")).expect("create mission dir");
        for file in ["arcade.Mission", "arcade.eng", "arcade.txt"] {
            fs::copy(
                fixtures_dir().join("mission").join(file),
                root.join("mission").join(file),
            )
            .expect("copy scenario fixture");
        }
        Self {
            root,
            next_mtime: 1_700_000_000,
        }
    }

    pub fn config(&self) -> ArcadeConfig {
        let mut config = ArcadeConfig::builtin();
        let paths = &mut config.paths;
        paths.mission_logs = self
            .root
            .join("logs")
            .join("missionReport*.txt")
            .to_string_lossy()
            .into_owned();
        paths.backup_dir = self.root.join("logs").join("bak");
        paths.mission_file = self.root.join("mission").join("arcade.Mission");
        paths.briefing_file = self.root.join("mission").join("arcade.eng");
        paths.description_file = self.root.join("mission").join("arcade.txt");
        paths.scores_db = self.root.join("highscores").join("highscores.json");
        paths.leaderboard_output = self.root.join("highscores").join("leaderboard.json");
        config
    }

    pub fn session(&self) -> TestSession {
        let config = self.config();
        let store = JsonResultStore::new(&config.paths.scores_db);
        let publisher = StaticLeaderboard::new(
            &config.paths.leaderboard_output,
            config.rules.arcade_planes.clone(),
            config.leaderboard.clone(),
        );
        let mut session = ArcadeSession::new(config, RecordingConsole::default(), store, publisher);
        session.load_mission().expect("load fixture scenario");
        session
    }

    /// Drops fixture logs into the report directory, each one newer than the last.
    pub fn drop_logs(&mut self, fixtures: &[&str]) {
        for fixture in fixtures {
            let source = fixtures_dir().join("logs").join(format!("{fixture}.txt"));
            let target = self.root.join("logs").join(format!(
                "missionReport(2024-03-05_20-00-00)[{}].txt",
                self.next_mtime
            ));
            fs::copy(&source, &target).expect("copy log fixture");
            set_mtime(&target, self.next_mtime);
            self.next_mtime += 1;
        }
    }

    pub fn pending_logs(&self) -> usize {
        fs::read_dir(self.root.join("logs"))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|entry| entry.path().is_file())
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn backups(&self) -> usize {
        fs::read_dir(self.root.join("logs").join("bak"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub fn results_json(&self) -> serde_json::Value {
        read_json(&self.root.join("highscores").join("highscores.json"))
    }

    pub fn leaderboard_json(&self) -> serde_json::Value {
        read_json(&self.root.join("highscores").join("leaderboard.json"))
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn set_mtime(path: &Path, secs: u64) {
    let file = fs::File::options()
        .write(true)
        .open(path)
        .expect("open log fixture");
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .expect("set log mtime");
}

fn read_json(path: &Path) -> serde_json::Value {
    let text = fs::read_to_string(path).expect("read json output");
    serde_json::from_str(&text).expect("parse json output")
}
