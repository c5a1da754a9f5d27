//! Script interpreter seam.
//!
//! The core owns execution contexts; the interpreter owns programs and
//! instruction semantics. Anything a script wants the engine to do leaves
//! the interpreter as a [`ScriptCommand`] pushed onto a [`CommandQueue`].

mod listing;

pub use listing::{Instruction, Listing, ListingInterpreter};

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use tapestry_assets::ProgramImage;

use crate::geometry::Point;
use crate::overlays::SceneOverlay;
use crate::scene::{Direction, Facing};

/// Entry point run synchronously while a scene loads.
pub const ENTRY_INIT: u16 = 0;
/// Entry point run when the player clicks inside the playfield.
pub const ENTRY_CLICK: u16 = 1;
/// Entry point run once the scene is on screen.
pub const ENTRY_SHOWN: u16 = 3;

pub const REGISTER_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ProgramId(pub u32);

/// Execution state of one script thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptContext {
    pub label: String,
    pub program: Option<ProgramId>,
    pub entry: Option<u16>,
    /// Next instruction; `None` once the thread finished or was never started.
    pub ip: Option<usize>,
    pub regs: [i32; REGISTER_COUNT],
    pub reply: i32,
    pub steps: u64,
}

impl ScriptContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

/// Where a command came from, so faults and yields can be attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    Init,
    Main,
    Ambient(usize),
}

impl fmt::Display for CommandOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOrigin::Init => f.write_str("init"),
            CommandOrigin::Main => f.write_str("main"),
            CommandOrigin::Ambient(slot) => write!(f, "ambient.{slot}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptCommand {
    DefineOverlay {
        slot: usize,
        overlay: SceneOverlay,
    },
    InsertOverlay {
        slot: usize,
    },
    RemoveOverlay {
        slot: usize,
    },
    SetFrame {
        object: usize,
        frame: u16,
    },
    MoveObject {
        object: usize,
        x: i32,
        y: i32,
    },
    SetScale {
        object: usize,
        scale: u16,
    },
    SetPaletteLayer {
        object: usize,
        layer: u8,
    },
    PlaceItem {
        item: u16,
        x: i32,
        y: i32,
    },
    RemoveItem {
        item: u16,
    },
    SetCooldown {
        slot: usize,
        ticks: u32,
    },
    Suspend {
        slot: usize,
    },
    Resume {
        slot: usize,
    },
    QuerySuspended {
        slot: usize,
    },
    Yield,
    DefineEntrance {
        edge: Direction,
        x: i32,
        y: i32,
    },
    SetSceneFlags {
        flags: u16,
    },
    EnterScene {
        scene: u16,
        facing: Facing,
        #[serde(default)]
        silent: bool,
        #[serde(default)]
        walk_in: bool,
        #[serde(default)]
        position: Option<Point>,
    },
    SetPlayerPosition {
        x: i32,
        y: i32,
    },
    SetPlayerFacing {
        facing: Facing,
    },
    WalkPlayerTo {
        x: i32,
        y: i32,
    },
    ShowMessage {
        text: String,
        ticks: u32,
    },
    HideMessage,
    SetPanelVisible {
        visible: bool,
    },
    Wait {
        ticks: u32,
    },
    PlayMusic {
        track: u16,
    },
    PlaySfx {
        sound: u16,
    },
    ForceRedraw,
}

impl ScriptCommand {
    /// Short name used in event log entries.
    pub fn name(&self) -> &'static str {
        match self {
            ScriptCommand::DefineOverlay { .. } => "define_overlay",
            ScriptCommand::InsertOverlay { .. } => "insert_overlay",
            ScriptCommand::RemoveOverlay { .. } => "remove_overlay",
            ScriptCommand::SetFrame { .. } => "set_frame",
            ScriptCommand::MoveObject { .. } => "move_object",
            ScriptCommand::SetScale { .. } => "set_scale",
            ScriptCommand::SetPaletteLayer { .. } => "set_palette_layer",
            ScriptCommand::PlaceItem { .. } => "place_item",
            ScriptCommand::RemoveItem { .. } => "remove_item",
            ScriptCommand::SetCooldown { .. } => "set_cooldown",
            ScriptCommand::Suspend { .. } => "suspend",
            ScriptCommand::Resume { .. } => "resume",
            ScriptCommand::QuerySuspended { .. } => "query_suspended",
            ScriptCommand::Yield => "yield",
            ScriptCommand::DefineEntrance { .. } => "define_entrance",
            ScriptCommand::SetSceneFlags { .. } => "set_scene_flags",
            ScriptCommand::EnterScene { .. } => "enter_scene",
            ScriptCommand::SetPlayerPosition { .. } => "set_player_position",
            ScriptCommand::SetPlayerFacing { .. } => "set_player_facing",
            ScriptCommand::WalkPlayerTo { .. } => "walk_player_to",
            ScriptCommand::ShowMessage { .. } => "show_message",
            ScriptCommand::HideMessage => "hide_message",
            ScriptCommand::SetPanelVisible { .. } => "set_panel_visible",
            ScriptCommand::Wait { .. } => "wait",
            ScriptCommand::PlayMusic { .. } => "play_music",
            ScriptCommand::PlaySfx { .. } => "play_sfx",
            ScriptCommand::ForceRedraw => "force_redraw",
        }
    }
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<ScriptCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: ScriptCommand) {
        self.pending.push_back(command);
    }

    pub fn pop(&mut self) -> Option<ScriptCommand> {
        self.pending.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLoadError {
    pub reason: String,
}

pub trait ScriptInterpreter {
    fn load_program(&mut self, image: &ProgramImage) -> Result<ProgramId, ProgramLoadError>;

    fn release_program(&mut self, program: ProgramId);

    /// Binds `ctx` to `program` without starting it.
    fn init_context(&mut self, ctx: &mut ScriptContext, program: ProgramId);

    /// Positions `ctx` at `entry`; false when the program has no such entry.
    fn start_entry_point(&mut self, ctx: &mut ScriptContext, entry: u16) -> bool;

    /// Executes one instruction. Returns whether the thread is still running.
    fn step_one(&mut self, ctx: &mut ScriptContext, out: &mut CommandQueue) -> bool;

    fn is_valid(&self, ctx: &ScriptContext) -> bool;

    fn unload(&mut self, ctx: &mut ScriptContext);

    /// Delivers the answer to a query command back to the script.
    fn set_reply(&mut self, ctx: &mut ScriptContext, value: i32) {
        ctx.reply = value;
    }
}
