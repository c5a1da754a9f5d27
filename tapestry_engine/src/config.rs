use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::scene::Facing;

/// Engine tunables. Every field has a default so a config file only needs
/// to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub screen_width: i32,
    pub screen_height: i32,
    /// Area the character may walk in; leaving it through an edge with an
    /// exit changes scene.
    pub playfield: Rect,
    pub tick_length_ms: u64,
    /// Entry point of ambient slot 0; slot `n` starts at `base + n`.
    pub ambient_entry_base: u16,
    /// Pixels per tick.
    pub walk_speed: i32,
    pub entrance_walk_distance: i32,
    pub idle_delay_secs: IdleDelay,
    /// Palette indices owned by the character and kept across scenes.
    pub character_palette_band: (u8, u8),
    pub scene_table: String,
    pub items_atlas: String,
    pub start_scene: u16,
    pub start_facing: Facing,
    pub rng_seed: u64,
    pub max_init_steps: usize,
    pub max_steps_per_visit: usize,
    pub max_main_steps_per_tick: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleDelay {
    pub min: u32,
    pub max: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            screen_width: 320,
            screen_height: 200,
            playfield: Rect::new(0, 0, 320, 144),
            tick_length_ms: 16,
            ambient_entry_base: 9,
            walk_speed: 4,
            entrance_walk_distance: 24,
            idle_delay_secs: IdleDelay { min: 10, max: 15 },
            character_palette_band: (0, 15),
            scene_table: "scenes.json".to_string(),
            items_atlas: "items.shp".to_string(),
            start_scene: 0,
            start_facing: Facing::South,
            rng_seed: 0x7a9e_57e1,
            max_init_steps: 10_000,
            max_steps_per_visit: 256,
            max_main_steps_per_tick: 1_000,
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config file, or returns the defaults when no path is given.
    pub fn from_json_file(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config json: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config: {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.screen_width > 0 && self.screen_height > 0,
            "screen size must be positive"
        );
        let screen = self.screen();
        ensure!(
            !self.playfield.is_empty()
                && screen.intersection(&self.playfield) == Some(self.playfield),
            "playfield {:?} must lie inside the {}x{} screen",
            self.playfield,
            self.screen_width,
            self.screen_height
        );
        ensure!(self.tick_length_ms > 0, "tick_length_ms must be positive");
        ensure!(self.walk_speed > 0, "walk_speed must be positive");
        ensure!(
            self.idle_delay_secs.min <= self.idle_delay_secs.max,
            "idle_delay_secs.min exceeds max"
        );
        ensure!(
            self.character_palette_band.0 <= self.character_palette_band.1,
            "character_palette_band is reversed"
        );
        ensure!(
            self.max_init_steps > 0
                && self.max_steps_per_visit > 0
                && self.max_main_steps_per_tick > 0,
            "step caps must be positive"
        );
        Ok(())
    }

    pub fn screen(&self) -> Rect {
        Rect::new(0, 0, self.screen_width, self.screen_height)
    }
}
