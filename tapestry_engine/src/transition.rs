//! Scene transitions: unload the current scene, load the next one and
//! place the character at its entrance.

use serde::{Deserialize, Serialize};
use tapestry_assets::Palette;

use crate::animation::{clamp_to, entrance_start};
use crate::compositor::Canvas;
use crate::engine::SceneEngine;
use crate::error::{EngineError, ScriptFault};
use crate::geometry::Point;
use crate::modal::Modal;
use crate::overlays::OverlayTable;
use crate::registry::{AtlasKind, ObjectSetup, ShapeRef, CHARACTER_SLOT};
use crate::scene::{Facing, SceneDescriptor, TransitionFlags, TransitionRequest};
use crate::script::{
    CommandOrigin, CommandQueue, ProgramId, ScriptCommand, ENTRY_INIT, ENTRY_SHOWN,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPhase {
    #[default]
    Idle,
    Unloading,
    Loading,
    Entering,
    SteadyState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Entered,
    /// Another transition holds the lock; nothing changed.
    Rejected,
    /// An exit request arrived mid-transition.
    Aborted,
}

/// Everything loaded for the scene on screen.
#[derive(Debug, Clone)]
pub struct LoadedScene {
    pub descriptor: SceneDescriptor,
    pub palette: Palette,
    pub program: Option<ProgramId>,
    pub overlays: OverlayTable,
    /// Indexed by [`crate::scene::Direction::index`].
    pub entrances: [Option<Point>; 4],
    pub flags: u16,
}

#[derive(Debug, Clone, Default)]
pub struct TransitionController {
    phase: TransitionPhase,
    active: Option<TransitionRequest>,
}

impl TransitionController {
    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn is_locked(&self) -> bool {
        matches!(
            self.phase,
            TransitionPhase::Unloading | TransitionPhase::Loading | TransitionPhase::Entering
        )
    }

    pub fn active(&self) -> Option<&TransitionRequest> {
        self.active.as_ref()
    }

    fn begin(&mut self, request: TransitionRequest) -> bool {
        if self.is_locked() {
            return false;
        }
        self.phase = TransitionPhase::Unloading;
        self.active = Some(request);
        true
    }

    fn advance(&mut self, phase: TransitionPhase) {
        log::trace!("transition {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn finish(&mut self) -> Option<TransitionRequest> {
        self.phase = TransitionPhase::SteadyState;
        self.active.take()
    }

    fn abandon(&mut self) {
        self.phase = TransitionPhase::Idle;
        self.active = None;
    }
}

impl<C: Canvas> SceneEngine<C> {
    /// Switches to `scene`. Rejected without side effects while another
    /// transition is in progress; resource failures are fatal.
    pub fn enter_scene(
        &mut self,
        scene: u16,
        facing: Facing,
        flags: TransitionFlags,
    ) -> Result<TransitionOutcome, EngineError> {
        if self.transition.is_locked() {
            log::debug!("enter_scene({scene}) rejected: transition in progress");
            self.world
                .events
                .push(format!("scene.enter.rejected {scene}"));
            return Ok(TransitionOutcome::Rejected);
        }
        let descriptor = self
            .table
            .scene(scene)
            .cloned()
            .ok_or(EngineError::UnknownScene(scene))?;
        let request = TransitionRequest {
            scene,
            facing,
            flags,
        };
        self.transition.begin(request);
        self.world.events.push(format!("scene.enter {scene}"));

        self.unload_scene(&descriptor);
        if self.abort {
            return Ok(self.abandon_transition());
        }

        self.transition.advance(TransitionPhase::Loading);
        self.load_scene(descriptor)?;
        if self.abort {
            return Ok(self.abandon_transition());
        }

        self.transition.advance(TransitionPhase::Entering);
        self.place_entry(request);
        if !self.world.modals.has_entrance_walk() {
            self.finish_entry();
        }
        Ok(TransitionOutcome::Entered)
    }

    fn abandon_transition(&mut self) -> TransitionOutcome {
        self.transition.abandon();
        self.world.events.push("scene.enter.aborted");
        TransitionOutcome::Aborted
    }

    fn unload_scene(&mut self, target: &SceneDescriptor) {
        self.world.ui.input_enabled = false;
        self.world.hide_message();
        self.world.modals.clear();
        self.world.pending_transition = None;

        if self.world.music.is_some() && self.world.music != target.music {
            self.world.audio.music_fade_out();
            self.world.music = None;
            self.world.events.push("audio.fade_out");
        }

        self.scheduler.clear(self.vm.as_mut());
        if let Some(old) = self.world.scene.take() {
            self.vm.unload(&mut self.main);
            if let Some(program) = old.program {
                self.vm.release_program(program);
            }
            self.world
                .events
                .push(format!("scene.unload {}", old.descriptor.id));
        }
        self.world.shapes.free_scene();
        self.world.registry.reset();
        self.world.character.stop();
        self.idle.disarm();
    }

    fn switch_chapter(&mut self, number: u8) -> Result<(), EngineError> {
        let chapter = self
            .table
            .chapter(number)
            .cloned()
            .ok_or(EngineError::UnknownChapter(number))?;
        let atlas = self.resources.load_shape_atlas(&chapter.character_shapes)?;
        let palette = self.resources.load_palette(&chapter.character_palette)?;
        self.world.shapes.set_atlas(AtlasKind::Character, atlas);
        self.character_palette = palette;
        self.chapter = Some(number);
        self.world.events.push(format!("chapter.enter {number}"));
        Ok(())
    }

    fn load_scene(&mut self, descriptor: SceneDescriptor) -> Result<(), EngineError> {
        if self.chapter != Some(descriptor.chapter) {
            self.switch_chapter(descriptor.chapter)?;
        }

        let mut palette = self.resources.load_palette(&descriptor.palette)?;
        let (low, high) = self.world.config.character_palette_band;
        palette.merge_band(&self.character_palette, low..=high);
        let background = self.resources.load_bitmap(&descriptor.background)?;
        let shapes = self.resources.load_shape_atlas(&descriptor.shapes)?;
        let layers = descriptor
            .palette_layers
            .iter()
            .map(|name| self.resources.load_remap_table(name))
            .collect::<Result<Vec<_>, _>>()?;
        let image = self.resources.load_script_program(&descriptor.script)?;
        let program = self
            .vm
            .load_program(&image)
            .map_err(|err| EngineError::ScriptProgram {
                name: descriptor.script.clone(),
                reason: err.reason,
            })?;

        self.canvas.set_palette(&palette);
        self.canvas.set_layer_tables(&layers);
        self.canvas.load_background(&background);
        self.world.shapes.set_atlas(AtlasKind::Scene, shapes);

        let id = descriptor.id;
        let music = descriptor.music;
        self.world.scene = Some(LoadedScene {
            flags: descriptor.flags,
            descriptor,
            palette,
            program: Some(program),
            overlays: OverlayTable::new(),
            entrances: [None; 4],
        });

        // Ambient slots are bound first so init can suspend or delay them.
        self.scheduler.bind(self.vm.as_mut(), program);
        self.run_init_script(program);
        self.restore_items(id);
        if let Some(scene) = self.world.scene.as_ref() {
            self.world.animator.reset(&scene.overlays);
        }
        if let Some(track) = music {
            self.world.play_music(track);
        }
        Ok(())
    }

    /// Runs the init entry point to completion, ignoring yields.
    fn run_init_script(&mut self, program: ProgramId) {
        let now = self.clock.now_millis();
        let mut context = std::mem::take(&mut self.main);
        self.vm.init_context(&mut context, program);
        if !self.vm.start_entry_point(&mut context, ENTRY_INIT) {
            self.main = context;
            return;
        }

        let limit = self.world.config.max_init_steps;
        let mut queue = CommandQueue::new();
        let mut steps = 0usize;
        while self.vm.is_valid(&context) {
            if steps >= limit {
                self.world
                    .fault(CommandOrigin::Init, "init", ScriptFault::Runaway(limit));
                self.vm.init_context(&mut context, program);
                break;
            }
            self.vm.step_one(&mut context, &mut queue);
            steps += 1;
            while let Some(command) = queue.pop() {
                if command == ScriptCommand::Yield {
                    continue;
                }
                if let Some(reply) = self.route(CommandOrigin::Init, command, now) {
                    self.vm.set_reply(&mut context, reply);
                }
            }
        }
        self.main = context;
    }

    fn restore_items(&mut self, scene: u16) {
        let placements: Vec<(u16, Point)> = self.world.items.in_scene(scene).collect();
        for (item, position) in placements {
            if let Err(fault) = self.world.place_item(item, position) {
                self.world.fault(CommandOrigin::Init, "place_item", fault);
            }
        }
    }

    fn place_entry(&mut self, request: TransitionRequest) {
        let playfield = self.world.config.playfield;
        let defined = self.world.scene.as_ref().and_then(|scene| {
            request
                .facing
                .entry_edge()
                .and_then(|edge| scene.entrances[edge.index()])
        });
        let anchor = request
            .flags
            .position
            .or(defined)
            .unwrap_or(self.world.character.position);
        let entry = clamp_to(clamp_to(anchor, playfield).grid_aligned(), playfield);

        let character = &mut self.world.character;
        character.facing = request.facing;
        if request.flags.walk_in {
            let start = entrance_start(
                entry,
                request.facing,
                self.world.config.entrance_walk_distance,
            );
            character.place(start);
            character.unconfined = true;
            character.walk_to(entry);
            if character.is_walking() {
                self.world.modals.push(Modal::EntranceWalk { target: entry });
            }
        } else {
            character.place(entry);
        }

        let atlas_len = self.world.shapes.atlas(AtlasKind::Character).len();
        let source = ShapeRef {
            atlas: AtlasKind::Character,
            frame: self.world.character.frame(atlas_len),
        };
        let setup = ObjectSetup::at(self.world.character.position, Some(source));
        let placed = self
            .world
            .registry
            .populate(CHARACTER_SLOT, setup)
            .and_then(|_| self.world.registry.enable(CHARACTER_SLOT));
        if let Err(fault) = placed {
            log::warn!("character placement failed: {fault}");
        }
        self.world.registry.rebuild_zorder();
        self.world.compositor.invalidate_all();
        self.compose(true);
        self.world.events.push(format!(
            "scene.entered {} @ {},{}",
            request.scene, entry.x, entry.y
        ));
    }

    /// Completes the transition once the character stands at the entrance.
    pub(crate) fn finish_entry(&mut self) {
        let request = self.transition.finish();
        self.world.character.unconfined = false;
        let silent = request.map(|request| request.flags.silent).unwrap_or(true);
        if !silent && !self.vm.start_entry_point(&mut self.main, ENTRY_SHOWN) {
            log::debug!("scene has no shown entry point");
        }
        let now = self.clock.now_millis();
        self.idle
            .reset(now, self.world.config.idle_delay_secs, &mut self.rng);
        self.world.ui.input_enabled = true;
        let scene = request.map(|request| request.scene).unwrap_or_default();
        self.world.events.push(format!("scene.ready {scene}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_lock_covers_every_intermediate_phase() {
        let mut controller = TransitionController::default();
        let request = TransitionRequest {
            scene: 1,
            facing: Facing::South,
            flags: TransitionFlags::default(),
        };
        assert!(controller.begin(request));
        for phase in [
            TransitionPhase::Unloading,
            TransitionPhase::Loading,
            TransitionPhase::Entering,
        ] {
            controller.advance(phase);
            assert!(controller.is_locked());
            assert!(!controller.begin(request));
        }
        assert_eq!(controller.finish(), Some(request));
        assert!(!controller.is_locked());
        assert_eq!(controller.phase(), TransitionPhase::SteadyState);
        assert!(controller.begin(request));
    }
}
