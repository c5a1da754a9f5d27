mod common;

use std::fs;
use std::process::Command;

use anyhow::{Context, Result};
use serde_json::Value;
use tempfile::tempdir;

#[test]
fn headless_run_writes_event_log_and_snapshot() -> Result<()> {
    let data = tempdir().context("creating fixture directory")?;
    common::write_fixture(data.path()).context("writing fixture assets")?;
    let out = tempdir().context("creating output directory")?;
    let events_path = out.path().join("events.json");
    let snapshot_path = out.path().join("snapshot.json");
    let audio_path = out.path().join("audio.json");
    let input_path = out.path().join("input.json");
    fs::write(
        &input_path,
        r#"[{"poll": 2, "kind": "use_exit", "edge": "east"}]"#,
    )
    .context("writing input script")?;

    let output = Command::new(env!("CARGO_BIN_EXE_tapestry_engine"))
        .arg("--data-root")
        .arg(data.path())
        .args(["--scene", "1", "--facing", "west", "--ticks", "40", "--fast"])
        .arg("--input-json")
        .arg(&input_path)
        .arg("--event-log-json")
        .arg(&events_path)
        .arg("--snapshot-json")
        .arg(&snapshot_path)
        .arg("--audio-log-json")
        .arg(&audio_path)
        .output()
        .context("running tapestry_engine")?;

    assert!(
        output.status.success(),
        "tapestry_engine failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let events: Vec<String> = serde_json::from_slice(&fs::read(&events_path)?)
        .context("parsing event log")?;
    assert!(events.iter().any(|entry| entry == "scene.ready 1"), "{events:?}");
    assert!(events.iter().any(|entry| entry == "scene.ready 2"), "{events:?}");

    let snapshot: Value = serde_json::from_slice(&fs::read(&snapshot_path)?)
        .context("parsing snapshot")?;
    assert_eq!(snapshot["scene"], 2);
    assert_eq!(snapshot["player"]["x"], 16);
    assert_eq!(snapshot["phase"], "steady_state");

    let audio: Vec<Value> =
        serde_json::from_slice(&fs::read(&audio_path)?).context("parsing audio log")?;
    assert_eq!(audio.first().map(|event| &event["kind"]), Some(&Value::from("music_play")));
    Ok(())
}

#[test]
fn unknown_start_scene_is_reported() -> Result<()> {
    let data = tempdir().context("creating fixture directory")?;
    common::write_fixture(data.path()).context("writing fixture assets")?;

    let output = Command::new(env!("CARGO_BIN_EXE_tapestry_engine"))
        .arg("--data-root")
        .arg(data.path())
        .args(["--scene", "42", "--ticks", "1", "--fast"])
        .output()
        .context("running tapestry_engine")?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("scene 42"), "{stderr}");
    Ok(())
}
