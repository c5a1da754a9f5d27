use serde::{Deserialize, Serialize};

use crate::error::ScriptFault;
use crate::geometry::Point;

/// Number of overlay descriptors a scene may define.
pub const OVERLAY_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayFlags {
    /// Enabled as soon as the scene finishes loading.
    pub visible: bool,
    /// Redraw every tick even when the frame did not change.
    pub always_refresh: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Playback {
    Loop,
    OneShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlaySource {
    Shape {
        frame: u16,
    },
    Sequence {
        first_frame: u16,
        last_frame: u16,
        /// Ticks each frame stays on screen.
        frame_ticks: u32,
    },
}

impl OverlaySource {
    pub fn initial_frame(&self) -> u16 {
        match *self {
            OverlaySource::Shape { frame } => frame,
            OverlaySource::Sequence { first_frame, .. } => first_frame,
        }
    }
}

/// Static description of one scene overlay, emitted by the scene's init
/// script and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneOverlay {
    #[serde(default)]
    pub flags: OverlayFlags,
    pub anchor: Point,
    #[serde(default)]
    pub draw_offset: Point,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
    #[serde(default)]
    pub inflate_x: i32,
    #[serde(default)]
    pub inflate_y: i32,
    pub source: OverlaySource,
    #[serde(default = "default_playback")]
    pub playback: Playback,
}

fn default_playback() -> Playback {
    Playback::Loop
}

#[derive(Debug, Clone, Default)]
pub struct OverlayTable {
    entries: Vec<Option<SceneOverlay>>,
}

impl OverlayTable {
    pub fn new() -> Self {
        Self {
            entries: vec![None; OVERLAY_CAPACITY],
        }
    }

    pub fn define(&mut self, slot: usize, overlay: SceneOverlay) -> Result<(), ScriptFault> {
        let entry = self
            .entries
            .get_mut(slot)
            .ok_or(ScriptFault::InvalidOverlay(slot))?;
        *entry = Some(overlay);
        Ok(())
    }

    pub fn get(&self, slot: usize) -> Option<&SceneOverlay> {
        self.entries.get(slot).and_then(Option::as_ref)
    }

    pub fn clear(&mut self) {
        self.entries.iter_mut().for_each(|entry| *entry = None);
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &SceneOverlay)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|overlay| (slot, overlay)))
    }

    pub fn defined(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torch() -> SceneOverlay {
        SceneOverlay {
            flags: OverlayFlags {
                visible: true,
                always_refresh: false,
            },
            anchor: Point::new(40, 60),
            draw_offset: Point::default(),
            width: 8,
            height: 16,
            inflate_x: 0,
            inflate_y: 0,
            source: OverlaySource::Sequence {
                first_frame: 2,
                last_frame: 5,
                frame_ticks: 3,
            },
            playback: Playback::Loop,
        }
    }

    #[test]
    fn define_rejects_slots_past_capacity() {
        let mut table = OverlayTable::new();
        assert_eq!(
            table.define(OVERLAY_CAPACITY, torch()),
            Err(ScriptFault::InvalidOverlay(OVERLAY_CAPACITY))
        );
        table.define(3, torch()).expect("slot 3 valid");
        assert_eq!(table.defined(), 1);
        assert_eq!(table.get(3).map(|o| o.source.initial_frame()), Some(2));
    }

    #[test]
    fn descriptors_deserialize_with_defaults() {
        let overlay: SceneOverlay = serde_json::from_str(
            r#"{"anchor": {"x": 1, "y": 2}, "source": {"kind": "shape", "frame": 7}}"#,
        )
        .expect("parse overlay");
        assert_eq!(overlay.playback, Playback::Loop);
        assert!(!overlay.flags.visible);
        assert_eq!(overlay.source, OverlaySource::Shape { frame: 7 });
    }
}
