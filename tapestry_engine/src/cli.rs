use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tapestry_engine::Facing;

#[derive(Parser, Debug)]
#[command(
    about = "Headless host that runs the scene core against an asset directory",
    version
)]
pub struct Args {
    /// Directory holding the scene table, art and script listings
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    /// Optional JSON engine config; missing fields keep their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Scene to enter first (overrides the config's start scene)
    #[arg(long)]
    pub scene: Option<u16>,

    /// Facing for the first scene, e.g. `north` or `sw`
    #[arg(long)]
    pub facing: Option<String>,

    /// Number of ticks to run before exiting
    #[arg(long, default_value_t = 600)]
    pub ticks: u64,

    /// JSON list of `{ "poll": n, "kind": ... }` input events to replay
    #[arg(long)]
    pub input_json: Option<PathBuf>,

    /// Path to write the engine event log as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Path to write the audio event log as JSON
    #[arg(long)]
    pub audio_log_json: Option<PathBuf>,

    /// Path to write the final engine snapshot as JSON
    #[arg(long)]
    pub snapshot_json: Option<PathBuf>,

    /// Run on a simulated clock instead of pacing ticks in real time
    #[arg(long)]
    pub fast: bool,

    /// Print a line per tick instead of the final summary only
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug)]
pub struct RunArgs {
    pub data_root: PathBuf,
    pub config: Option<PathBuf>,
    pub scene: Option<u16>,
    pub facing: Option<Facing>,
    pub ticks: u64,
    pub input_json: Option<PathBuf>,
    pub event_log_json: Option<PathBuf>,
    pub audio_log_json: Option<PathBuf>,
    pub snapshot_json: Option<PathBuf>,
    pub fast: bool,
    pub verbose: bool,
}

pub fn parse() -> Result<RunArgs> {
    let args = Args::parse();
    args.into_run_args()
}

impl Args {
    fn into_run_args(self) -> Result<RunArgs> {
        if self.ticks == 0 {
            bail!("--ticks must be at least 1");
        }
        if !self.data_root.is_dir() {
            bail!(
                "--data-root {} is not a directory",
                self.data_root.display()
            );
        }
        let facing = self
            .facing
            .as_deref()
            .map(|value| {
                Facing::parse(value).with_context(|| format!("unknown --facing `{value}`"))
            })
            .transpose()?;

        Ok(RunArgs {
            data_root: self.data_root,
            config: self.config,
            scene: self.scene,
            facing,
            ticks: self.ticks,
            input_json: self.input_json,
            event_log_json: self.event_log_json,
            audio_log_json: self.audio_log_json,
            snapshot_json: self.snapshot_json,
            fast: self.fast,
            verbose: self.verbose,
        })
    }
}
