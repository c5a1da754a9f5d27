mod common;

use common::*;
use serde_json::json;
use tapestry_engine::{AudioEvent, EngineConfig, NullInput, Point};

fn sound_effects(h: &Harness) -> Vec<AudioEvent> {
    h.audio
        .events()
        .into_iter()
        .filter(|event| matches!(event, AudioEvent::SfxPlay { .. }))
        .collect()
}

fn hall_with(entries: serde_json::Value) -> Harness {
    let mut h = harness_with(
        pack_with_hall_script(json!({ "entry_points": entries })),
        EngineConfig::default(),
        Box::new(NullInput),
    );
    h.enter(SCENE_A, Point::new(160, 100));
    h
}

#[test]
fn suspended_slots_are_never_resumed_by_the_scheduler() {
    let mut h = harness();
    h.enter(SCENE_A, Point::new(160, 100));
    h.ticks(20);

    assert_eq!(h.engine.scheduler().is_suspended(2), Ok(true));
    assert!(!h.audio.events().contains(&AudioEvent::SfxPlay { sound: 99 }));
}

#[test]
fn ambient_waits_defer_only_their_own_slot() {
    let mut h = harness();
    h.enter(SCENE_A, Point::new(160, 100));
    let report = h.engine.tick().expect("tick");

    assert!(report.ambient.executed.contains(&0));
    assert!(report.ambient.executed.contains(&1));
    let resume_at = h.engine.scheduler().next_run_at(0).expect("slot 0");
    assert!(resume_at > h.clock.peek(), "slot 0 should be cooling down");
    assert_eq!(h.engine.scheduler().next_run_at(1), Some(0));

    let report = h.engine.tick().expect("tick");
    assert!(!report.ambient.executed.contains(&0));
    assert!(report.ambient.executed.contains(&1));
}

#[test]
fn every_slot_is_visited_once_per_pass() {
    let mut entries = serde_json::Map::new();
    for entry in 9..19 {
        entries.insert(
            entry.to_string(),
            json!([{"op": "play_sfx", "sound": entry}, {"op": "yield"}]),
        );
    }
    let mut h = hall_with(serde_json::Value::Object(entries));
    let report = h.engine.tick().expect("tick");

    assert_eq!(report.ambient.visited, (0..10).collect::<Vec<_>>());
    assert_eq!(report.ambient.executed.len(), 10);
    assert!(!report.ambient.overrun);
    let sounds: Vec<AudioEvent> = (9..19).map(|sound| AudioEvent::SfxPlay { sound }).collect();
    assert_eq!(sound_effects(&h), sounds);
}

#[test]
fn overruns_resume_with_the_next_slot() {
    let mut entries = serde_json::Map::new();
    for entry in 9..19 {
        entries.insert(entry.to_string(), json!([{"op": "yield"}]));
    }
    let mut h = hall_with(serde_json::Value::Object(entries));
    h.clock.set_advance_per_read(40);

    let first = h.engine.tick().expect("tick");
    assert!(first.ambient.overrun);
    assert!(first.ambient.visited.len() < 10);
    let last = *first.ambient.visited.last().expect("visited a slot");

    let second = h.engine.tick().expect("tick");
    assert_eq!(second.ambient.visited.first(), Some(&((last + 1) % 10)));
    assert!(h.engine.events().matching("ambient.overrun").next().is_some());
}

#[test]
fn runaway_ambient_loops_are_cut_off() {
    let mut h = hall_with(json!({
        "9": [{"op": "jump", "target": 0}],
        "10": [{"op": "play_sfx", "sound": 7}, {"op": "yield"}]
    }));
    let report = h.engine.tick().expect("tick");

    assert_eq!(report.ambient.runaway, vec![0]);
    assert!(report.ambient.executed.contains(&1));
    assert!(h.audio.events().contains(&AudioEvent::SfxPlay { sound: 7 }));
    assert!(h
        .engine
        .events()
        .entries()
        .iter()
        .any(|entry| entry == "ambient.runaway 0"));
}

#[test]
fn bad_commands_are_logged_and_ignored() {
    let mut h = hall_with(json!({
        "3": [
            {"op": "set_frame", "object": 99, "frame": 1},
            {"op": "play_sfx", "sound": 12}
        ],
        "9": [
            {"op": "resume", "slot": 42},
            {"op": "wait", "ticks": 1000}
        ]
    }));
    h.ticks(1);

    let faults: Vec<&str> = h.engine.events().matching("script.fault").collect();
    assert!(
        faults.iter().any(|entry| entry.starts_with("script.fault main set_frame")),
        "{faults:?}"
    );
    assert!(
        faults.iter().any(|entry| entry.starts_with("script.fault ambient.0 resume")),
        "{faults:?}"
    );
    assert!(h.audio.events().contains(&AudioEvent::SfxPlay { sound: 12 }));
}

#[test]
fn extreme_coordinates_fault_without_disturbing_the_frame() {
    let (far, near) = (i32::MAX, i32::MIN);
    let mut script = hall_script();
    script["entry_points"]["18"] = json!([
        {"op": "move_object", "object": 1, "x": far, "y": 60},
        {"op": "set_player_position", "x": near, "y": far},
        {"op": "wait", "ticks": 1000}
    ]);
    let mut h = harness_with(
        pack_with_hall_script(script),
        EngineConfig::default(),
        Box::new(NullInput),
    );
    h.enter(SCENE_A, Point::new(160, 100));
    let report = h.engine.tick().expect("tick");
    assert!(report.ambient.executed.contains(&9));
    h.ticks(3);

    let faults: Vec<&str> = h.engine.events().matching("script.fault ambient.9").collect();
    assert_eq!(faults.len(), 2, "{faults:?}");
    assert!(faults[0].contains("move_object"), "{faults:?}");
    assert!(faults[1].contains("set_player_position"), "{faults:?}");
    assert_eq!(h.engine.player_position(), Point::new(160, 100));
}

#[test]
fn init_can_suspend_ambient_slots_before_they_run() {
    let mut h = hall_with(json!({
        "0": [{"op": "suspend", "slot": 0}],
        "9": [{"op": "play_sfx", "sound": 3}, {"op": "yield"}]
    }));
    h.ticks(3);
    assert!(sound_effects(&h).is_empty());
    assert_eq!(h.engine.scheduler().is_suspended(0), Ok(true));
}
