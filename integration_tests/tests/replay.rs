mod common;

use arcade_core::{ArcadePhase, GameOverReason};
use chrono::{TimeZone, Utc};
use common::Workspace;

#[test]
fn full_game_replay_scores_and_records_result() {
    let mut workspace = Workspace::new("full_game");
    let mut session = workspace.session();
    assert!(session.is_arcade());

    workspace.drop_logs(&["start", "attack", "gameover"]);
    let now = Utc.with_ymd_and_hms(2024, 3, 5, 20, 0, 0).unwrap();
    let report = session.poll(now).expect("poll");

    assert_eq!(report.files_processed, 3);
    assert_eq!(report.parse_errors, 1);
    assert_eq!(report.games_finished, 1);
    assert_eq!(report.drained, 2);
    assert!(!report.console_down);

    let mission = session.mission().expect("arcade mission");
    assert_eq!(mission.phase(), ArcadePhase::GameOver);
    assert_eq!(
        mission.game_over_reason(),
        Some(&GameOverReason::ObjectiveReached)
    );
    assert_eq!(mission.score(), 925);
    assert_eq!(mission.extra_lives(), 1);

    let console = session.effects().console();
    assert_eq!(
        console.triggers(),
        vec![
            "spawn2",
            "spawn2",
            "close_airfields",
            "close_airfields",
            "sound_good"
        ]
    );
    let chat = console.chat();
    assert!(chat[0].starts_with("Limbo has started STUKA ATTACK! flying a Ju 87 D-3."));
    assert!(chat[1].starts_with("925 points reached! Airfield spawn2 is now open."));
    let final_text = chat.last().expect("final broadcast");
    assert!(final_text.contains("T-34-76 STZ (#01): 500 points"));
    assert!(final_text.contains("KV-1 mod.1942 (#02) 50%: 250 points"));
    assert!(final_text.contains("BT-7M (#03): 200 points"));
    assert!(final_text.contains("Ju 87 D-3 10%: -25 points"));
    assert!(final_text.contains("TOTAL SCORE: 925 points"));

    let results = workspace.results_json();
    assert_eq!(results.as_array().map(Vec::len), Some(1));
    assert_eq!(results[0]["alias"], "Limbo");
    assert_eq!(results[0]["permanent_id"], "perm-limbo");
    assert_eq!(results[0]["score"], 925);

    let board = workspace.leaderboard_json();
    assert_eq!(board["recent_players"][0]["alias"], "Limbo");
    assert_eq!(board["planes"][0]["plane"], "Ju 87 D-3");
    assert_eq!(board["planes"][0]["rows"][0]["rank"], 1);
    assert_eq!(board["planes"][0]["rows"][0]["date"], "2024-03-05");

    assert_eq!(workspace.pending_logs(), 0);
    assert_eq!(workspace.backups(), 3);
}

#[test]
fn logs_after_game_over_are_drained_silently() {
    let mut workspace = Workspace::new("drain");
    let mut session = workspace.session();
    let now = Utc.with_ymd_and_hms(2024, 3, 5, 20, 0, 0).unwrap();

    workspace.drop_logs(&["start", "gameover"]);
    session.poll(now).expect("first poll");
    let sent_after_game = session.effects().console().sent.len();

    workspace.drop_logs(&["attack", "exit"]);
    let later = now + chrono::Duration::minutes(5);
    let report = session.poll(later).expect("second poll");

    assert_eq!(report.files_processed, 2);
    assert_eq!(report.games_finished, 0);
    assert!(report.drained > 0);
    assert_eq!(session.effects().console().sent.len(), sent_after_game);
    assert_eq!(session.mission().map(|m| m.score()), Some(0));
    assert_eq!(workspace.pending_logs(), 0);
}

#[test]
fn unlocked_life_allows_one_respawn() {
    let mut workspace = Workspace::new("respawn");
    let mut session = workspace.session();
    let now = Utc.with_ymd_and_hms(2024, 3, 5, 20, 0, 0).unwrap();

    workspace.drop_logs(&["start", "attack", "exit"]);
    session.poll(now).expect("poll before respawn");
    assert_eq!(
        session.mission().map(|m| m.phase()),
        Some(ArcadePhase::Started)
    );

    workspace.drop_logs(&["respawn"]);
    session.poll(now).expect("poll after respawn");

    let mission = session.mission().expect("arcade mission");
    assert_eq!(
        mission.game_over_reason(),
        Some(&GameOverReason::PlayerExited)
    );
    assert_eq!(mission.plane_id_history(), &[2001, 2101]);
    assert_eq!(mission.score(), 1675);

    let chat = session.effects().console().chat();
    assert!(chat
        .iter()
        .any(|line| line.contains("Extra lives remaining: 0")));
    assert_eq!(workspace.results_json()[0]["score"], 1675);
}

#[test]
fn identity_violation_ends_game_with_error_broadcast() {
    let mut workspace = Workspace::new("identity");
    let mut session = workspace.session();
    let now = Utc.with_ymd_and_hms(2024, 3, 5, 20, 0, 0).unwrap();

    workspace.drop_logs(&["start", "intruder"]);
    let report = session.poll(now).expect("poll");
    assert_eq!(report.games_finished, 1);

    let mission = session.mission().expect("arcade mission");
    assert!(matches!(
        mission.game_over_reason(),
        Some(GameOverReason::IdentityViolation { expected, found })
            if expected == "perm-limbo" && found == "perm-intruder"
    ));
    assert_eq!(mission.player().map(|p| p.alias.as_str()), Some("Limbo"));

    let console = session.effects().console();
    assert!(console
        .chat()
        .iter()
        .any(|line| line.starts_with("ARCADE ERROR")));
    assert_eq!(
        console.triggers(),
        vec!["close_airfields", "close_airfields", "sound_poor"]
    );
    assert_eq!(workspace.results_json()[0]["alias"], "Limbo");
}

#[test]
fn crash_before_milestone_never_unlocks_airfields() {
    let mut workspace = Workspace::new("crash");
    let mut session = workspace.session();
    let now = Utc.with_ymd_and_hms(2024, 3, 5, 20, 0, 0).unwrap();

    workspace.drop_logs(&["start", "crash", "attack"]);
    session.poll(now).expect("poll");

    let mission = session.mission().expect("arcade mission");
    assert_eq!(
        mission.game_over_reason(),
        Some(&GameOverReason::PlaneDestroyed)
    );
    assert_eq!(mission.airfields_unlocked(), 0);
    let triggers = session.effects().console().triggers();
    assert!(!triggers.contains(&"spawn2"));
    assert_eq!(triggers.last(), Some(&"sound_poor"));
}
