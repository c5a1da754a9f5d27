use std::{fs, path::Path, rc::Rc};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tapestry_assets::AssetPack;
use tapestry_engine::{
    AudioCallback, Clock, EngineConfig, EngineServices, HeadlessEngine, InputProvider,
    ListingInterpreter, ManualClock, NullInput, RecordingAudioCallback, ScriptedInput,
    SystemClock, TickReport, TransitionFlags, TransitionOutcome,
};

use crate::cli::RunArgs;

#[derive(Debug, Default, Serialize)]
struct RunSummary {
    ticks: u64,
    ambient_steps: u64,
    ambient_overruns: u64,
    runaway_slots: u64,
    transitions: u64,
    rejected_transitions: u64,
    redrawn_objects: u64,
}

impl RunSummary {
    fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.ambient_steps += report.ambient.steps;
        self.ambient_overruns += u64::from(report.ambient.overrun);
        self.runaway_slots += report.ambient.runaway.len() as u64;
        match report.transition {
            Some(TransitionOutcome::Entered) => self.transitions += 1,
            Some(TransitionOutcome::Rejected) => self.rejected_transitions += 1,
            Some(TransitionOutcome::Aborted) | None => {}
        }
        if let Some(compose) = report.compose.as_ref() {
            self.redrawn_objects += compose.drawn.len() as u64;
        }
    }
}

pub fn execute(args: RunArgs) -> Result<()> {
    let RunArgs {
        data_root,
        config,
        scene,
        facing,
        ticks,
        input_json,
        event_log_json,
        audio_log_json,
        snapshot_json,
        fast,
        verbose,
    } = args;

    let mut config = EngineConfig::from_json_file(config.as_deref())?;
    if let Some(scene) = scene {
        config.start_scene = scene;
    }
    if let Some(facing) = facing {
        config.start_facing = facing;
    }
    config.validate()?;

    let pack = AssetPack::load_from_dir(&data_root)
        .with_context(|| format!("indexing assets under {}", data_root.display()))?;
    eprintln!(
        "[tapestry_engine] info: indexed {} assets under {}",
        pack.len(),
        data_root.display()
    );

    let input: Box<dyn InputProvider> = match input_json.as_ref() {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading input script {}", path.display()))?;
            let scripted = ScriptedInput::from_json(&raw)
                .with_context(|| format!("parsing input script {}", path.display()))?;
            eprintln!(
                "[tapestry_engine] info: replaying {} input events from {}",
                scripted.remaining(),
                path.display()
            );
            Box::new(scripted)
        }
        None => Box::new(NullInput),
    };

    let clock: Box<dyn Clock> = if fast {
        Box::new(ManualClock::new())
    } else {
        Box::new(SystemClock::new())
    };

    let recorder = RecordingAudioCallback::new();
    let audio: Rc<dyn AudioCallback> = Rc::new(recorder.clone());

    let width = u16::try_from(config.screen_width).context("screen width out of range")?;
    let height = u16::try_from(config.screen_height).context("screen height out of range")?;
    let start_scene = config.start_scene;
    let start_facing = config.start_facing;

    let mut engine = HeadlessEngine::new(
        config,
        EngineServices {
            resources: Box::new(pack),
            interpreter: Box::new(ListingInterpreter::new()),
            clock,
            input,
            audio,
            canvas: tapestry_engine::FrameBuffer::new(width, height),
        },
    )
    .context("starting scene engine")?;

    let outcome = engine
        .enter_scene(start_scene, start_facing, TransitionFlags::default())
        .with_context(|| format!("entering start scene {start_scene}"))?;
    if outcome != TransitionOutcome::Entered {
        bail!("start scene {start_scene} was not entered: {outcome:?}");
    }

    let mut summary = RunSummary::default();
    for _ in 0..ticks {
        let report = engine
            .tick()
            .with_context(|| format!("running tick {}", summary.ticks))?;
        if report.exit_requested {
            eprintln!("[tapestry_engine] info: exit requested");
            break;
        }
        summary.record(&report);
        if verbose {
            println!(
                "tick {:>5} scene {:?} player {},{} ambient {:?} drawn {:?}",
                report.tick,
                engine.current_scene_id(),
                engine.player_position().x,
                engine.player_position().y,
                report.ambient.executed,
                report.compose.as_ref().map(|compose| compose.drawn.len()),
            );
        }
    }

    if let Some(path) = event_log_json.as_ref() {
        write_json(path, engine.events(), "engine event log")?;
    }
    if let Some(path) = audio_log_json.as_ref() {
        write_json(path, &recorder.events(), "audio event log")?;
    }
    if let Some(path) = snapshot_json.as_ref() {
        write_json(path, &engine.snapshot(), "engine snapshot")?;
    }

    println!(
        "Ran {} ticks: {} ambient steps, {} overruns, {} scene changes ({} rejected), now in scene {:?}",
        summary.ticks,
        summary.ambient_steps,
        summary.ambient_overruns,
        summary.transitions,
        summary.rejected_transitions,
        engine.current_scene_id(),
    );
    if verbose {
        let json = serde_json::to_string_pretty(&summary).context("serializing run summary")?;
        println!("{json}");
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, what: &str) -> Result<()> {
    let json =
        serde_json::to_string_pretty(value).with_context(|| format!("serializing {what} to JSON"))?;
    fs::write(path, &json).with_context(|| format!("writing {what} to {}", path.display()))?;
    println!("Saved {what} to {}", path.display());
    Ok(())
}
