//! End-to-end runs of the shipped scenario files.

use std::path::PathBuf;

use tactics_core::replay::{Replay, ReplayPlayer};
use tactics_core::unit::Team;
use tactics_headless::{BattleRunner, InteractiveRunner, PlayerStrategy, Response, Scenario};

fn scenario_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(format!("{name}.ron"))
}

#[test]
fn test_every_shipped_scenario_finishes() {
    for name in ["duel", "skirmish", "gauntlet"] {
        let scenario = Scenario::load(scenario_path(name)).unwrap();
        let report = BattleRunner::new(scenario).run().unwrap();
        assert_eq!(report.rejected, 0, "{name}: strategy produced a rejected intent");
        if !report.timed_out {
            assert!(report.outcome.is_some(), "{name} ended without an outcome");
        }
    }
}

#[test]
fn test_aggressive_party_wins_the_skirmish() {
    let scenario = Scenario::load(scenario_path("skirmish")).unwrap();
    let report = BattleRunner::new(scenario).run().unwrap();
    assert_eq!(report.winner, Some(Team::Player));
    assert_eq!(report.fallen.iter().filter(|&&id| id >= 10).count(), 3);
    assert!(report.survivors.iter().all(|u| u.team == Team::Player));
}

#[test]
fn test_replay_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skirmish.replay");

    let runner = BattleRunner::new(Scenario::skirmish()).with_strategy(PlayerStrategy::Cautious);
    let (report, replay) = runner.run_recorded().unwrap();
    replay.save(&path).unwrap();

    let loaded = Replay::load(&path).unwrap();
    assert_eq!(loaded, replay);
    assert_eq!(loaded.intent_count(), report.intents);
    assert!(loaded.verify().unwrap());

    let mut playback = ReplayPlayer::new(loaded).unwrap();
    while playback.advance() {}
    assert_eq!(playback.session().state_hash(), report.final_hash);
}

#[test]
fn test_interactive_auto_play_matches_scripted_run() {
    let scenario = Scenario::duel();
    let report = BattleRunner::new(scenario.clone()).run().unwrap();

    let mut input = String::new();
    for _ in 0..10 {
        input.push_str("{\"cmd\":\"auto\"}\n{\"cmd\":\"arrived\",\"unit\":1}\n");
    }
    input.push_str("{\"cmd\":\"hash\"}\n{\"cmd\":\"quit\"}\n");

    let mut output = Vec::new();
    InteractiveRunner::new(&scenario)
        .unwrap()
        .run(input.as_bytes(), &mut output)
        .unwrap();

    let responses: Vec<Response> = std::str::from_utf8(&output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert!(responses
        .iter()
        .any(|r| matches!(r, Response::CombatOver { outcome, .. } if Some(*outcome) == report.outcome)));
    assert!(responses
        .iter()
        .any(|r| matches!(r, Response::StateHash { hash, .. } if *hash == report.final_hash)));
    assert_eq!(responses.last(), Some(&Response::Bye));
}
