use std::fmt;

use tapestry_assets::AssetError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    SceneTable,
    Palette,
    Bitmap,
    ShapeAtlas,
    ScriptProgram,
    RemapTable,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::SceneTable => "scene table",
            ResourceKind::Palette => "palette",
            ResourceKind::Bitmap => "bitmap",
            ResourceKind::ShapeAtlas => "shape atlas",
            ResourceKind::ScriptProgram => "script program",
            ResourceKind::RemapTable => "remap table",
        };
        f.write_str(label)
    }
}

/// Failures that end the session. Every resource load failure is fatal.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load {kind} `{name}`")]
    ResourceLoad {
        kind: ResourceKind,
        name: String,
        #[source]
        source: AssetError,
    },
    #[error("scene {0} is not present in the scene table")]
    UnknownScene(u16),
    #[error("chapter {0} is not present in the scene table")]
    UnknownChapter(u8),
    #[error("script program `{name}` rejected: {reason}")]
    ScriptProgram { name: String, reason: String },
    #[error("invalid engine config: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn load(kind: ResourceKind, name: &str) -> impl FnOnce(AssetError) -> Self + '_ {
        move |source| EngineError::ResourceLoad {
            kind,
            name: name.to_string(),
            source,
        }
    }
}

/// A script asked for something that does not exist. The offending command
/// is dropped and execution continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptFault {
    #[error("object index {0} is outside the animation pool")]
    InvalidObject(usize),
    #[error("ambient slot {0} does not exist")]
    InvalidSlot(usize),
    #[error("overlay slot {0} does not exist")]
    InvalidOverlay(usize),
    #[error("overlay slot {0} has no descriptor")]
    UndefinedOverlay(usize),
    #[error("object {0} has no shape source")]
    NoShapeSource(usize),
    #[error("no free item slot for item {0}")]
    ItemCapacity(u16),
    #[error("item {0} is not placed in this scene")]
    UnknownItem(u16),
    #[error("no scene is loaded")]
    NoScene,
    #[error("`{0}` is only valid during scene initialisation")]
    InitOnly(&'static str),
    #[error("script did not finish within {0} steps")]
    Runaway(usize),
    #[error("position {0},{1} is outside the reachable area")]
    InvalidPosition(i32, i32),
}
