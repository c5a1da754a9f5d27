//! Scene animation and script scheduling core.
//!
//! [`SceneEngine`] owns the animated object pool, the ambient script
//! scheduler, scene transitions and the dirty-rectangle compositor. Scripts,
//! assets, time, input and the display are reached through traits so a host
//! can run the core headless ([`HeadlessEngine`]) or against real devices.

pub mod animation;
pub mod audio;
pub mod compositor;
pub mod config;
mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod framebuffer;
pub mod geometry;
pub mod input;
pub mod items;
pub mod modal;
pub mod overlays;
pub mod registry;
pub mod resources;
pub mod scene;
pub mod scheduler;
pub mod script;
pub mod shapes;
pub mod timing;
pub mod transition;
pub mod zorder;

pub use audio::{AudioCallback, AudioEvent, RecordingAudioCallback, SilentAudio};
pub use compositor::{Canvas, ComposeReport, Compositor};
pub use config::{EngineConfig, IdleDelay};
pub use dispatch::{Banner, UiState};
pub use engine::{EngineServices, EngineSnapshot, SceneEngine, TickReport};
pub use error::{EngineError, ResourceKind, ScriptFault};
pub use events::EventLog;
pub use framebuffer::FrameBuffer;
pub use geometry::{Point, Rect};
pub use input::{InputEvent, InputProvider, NullInput, ScriptedInput};
pub use registry::Registry;
pub use resources::ResourceProvider;
pub use scene::{Direction, Facing, SceneDescriptor, SceneTable, TransitionFlags};
pub use scheduler::{AmbientPass, AmbientScheduler};
pub use script::{ListingInterpreter, ScriptCommand, ScriptInterpreter};
pub use timing::{Clock, ManualClock, SystemClock};
pub use transition::{TransitionOutcome, TransitionPhase};

pub type HeadlessEngine = SceneEngine<FrameBuffer>;
