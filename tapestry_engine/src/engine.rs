use std::rc::Rc;

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use tapestry_assets::Palette;

use crate::animation::{walk_target_for_click, IdleCountdown, WalkStep};
use crate::audio::AudioCallback;
use crate::compositor::{Canvas, ComposeReport, Decorations};
use crate::config::EngineConfig;
use crate::dispatch::{Banner, Dispatch, World};
use crate::error::{EngineError, ScriptFault};
use crate::events::EventLog;
use crate::geometry::Point;
use crate::input::{InputEvent, InputProvider};
use crate::items::ItemLedger;
use crate::modal::{Modal, ModalStack};
use crate::registry::{AtlasKind, Registry, CHARACTER_SLOT};
use crate::resources::ResourceProvider;
use crate::scene::{
    Direction, Facing, SceneDescriptor, SceneTable, TransitionFlags, TransitionRequest,
};
use crate::scheduler::{AmbientPass, AmbientScheduler};
use crate::script::{
    CommandOrigin, CommandQueue, ScriptCommand, ScriptContext, ScriptInterpreter, ENTRY_CLICK,
};
use crate::timing::Clock;
use crate::transition::{TransitionController, TransitionOutcome, TransitionPhase};

/// Collaborators the engine drives but does not own the semantics of.
pub struct EngineServices<C: Canvas> {
    pub resources: Box<dyn ResourceProvider>,
    pub interpreter: Box<dyn ScriptInterpreter>,
    pub clock: Box<dyn Clock>,
    pub input: Box<dyn InputProvider>,
    pub audio: Rc<dyn AudioCallback>,
    pub canvas: C,
}

/// What happened during one [`SceneEngine::tick`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub ambient: AmbientPass,
    pub compose: Option<ComposeReport>,
    pub transition: Option<TransitionOutcome>,
    pub exit_requested: bool,
}

/// State an external save system needs to restore a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub scene: Option<u16>,
    pub chapter: Option<u8>,
    pub phase: TransitionPhase,
    pub player: Point,
    pub facing: Facing,
    pub scene_flags: u16,
    pub music: Option<u16>,
    pub items: ItemLedger,
    pub tick: u64,
}

/// The scene animation and script scheduling core.
pub struct SceneEngine<C: Canvas> {
    pub(crate) resources: Box<dyn ResourceProvider>,
    pub(crate) vm: Box<dyn ScriptInterpreter>,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) input: Box<dyn InputProvider>,
    pub(crate) canvas: C,
    pub(crate) table: SceneTable,
    pub(crate) world: World,
    pub(crate) scheduler: AmbientScheduler,
    pub(crate) transition: TransitionController,
    pub(crate) main: ScriptContext,
    pub(crate) idle: IdleCountdown,
    pub(crate) rng: StdRng,
    pub(crate) chapter: Option<u8>,
    pub(crate) character_palette: Palette,
    pub(crate) abort: bool,
    pub(crate) ticks: u64,
}

impl<C: Canvas> SceneEngine<C> {
    /// Loads the scene table and the item atlas. No scene is entered yet.
    pub fn new(config: EngineConfig, services: EngineServices<C>) -> Result<Self, EngineError> {
        let EngineServices {
            resources,
            interpreter,
            clock,
            input,
            audio,
            canvas,
        } = services;

        config
            .validate()
            .map_err(|err| EngineError::Config(format!("{err:#}")))?;
        let table = resources.load_scene_table(&config.scene_table)?;
        let items = resources.load_shape_atlas(&config.items_atlas)?;
        log::info!(
            "scene table `{}`: {} scenes",
            config.scene_table,
            table.len()
        );

        let scheduler = AmbientScheduler::new(
            config.ambient_entry_base,
            config.tick_length_ms,
            config.max_steps_per_visit,
        );
        let rng = StdRng::seed_from_u64(config.rng_seed);
        let mut world = World::new(config, audio);
        world.shapes.set_atlas(AtlasKind::Items, items);

        Ok(Self {
            resources,
            vm: interpreter,
            clock,
            input,
            canvas,
            table,
            world,
            scheduler,
            transition: TransitionController::default(),
            main: ScriptContext::new("main"),
            idle: IdleCountdown::default(),
            rng,
            chapter: None,
            character_palette: Palette::black(),
            abort: false,
            ticks: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.world.config
    }

    pub fn request_exit(&mut self) {
        if !self.abort {
            self.world.events.push("engine.exit_requested");
        }
        self.abort = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.abort
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_locked()
    }

    pub fn phase(&self) -> TransitionPhase {
        self.transition.phase()
    }

    pub fn current_scene_id(&self) -> Option<u16> {
        self.world.scene.as_ref().map(|scene| scene.descriptor.id)
    }

    pub fn current_descriptor(&self) -> Option<&SceneDescriptor> {
        self.world.scene.as_ref().map(|scene| &scene.descriptor)
    }

    pub fn scene_flags(&self) -> Option<u16> {
        self.world.scene.as_ref().map(|scene| scene.flags)
    }

    pub fn entrance(&self, edge: Direction) -> Option<Point> {
        self.world
            .scene
            .as_ref()
            .and_then(|scene| scene.entrances[edge.index()])
    }

    pub fn player_position(&self) -> Point {
        self.world.character.position
    }

    pub fn player_facing(&self) -> Facing {
        self.world.character.facing
    }

    pub fn player_walking(&self) -> bool {
        self.world.character.is_walking()
    }

    pub fn message(&self) -> Option<&Banner> {
        self.world.ui.message.as_ref()
    }

    pub fn input_enabled(&self) -> bool {
        self.world.ui.input_enabled
    }

    pub fn events(&self) -> &EventLog {
        &self.world.events
    }

    pub fn registry(&self) -> &Registry {
        &self.world.registry
    }

    pub fn scheduler(&self) -> &AmbientScheduler {
        &self.scheduler
    }

    pub fn modals(&self) -> &ModalStack {
        &self.world.modals
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn main_script_running(&self) -> bool {
        self.vm.is_valid(&self.main)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            scene: self.current_scene_id(),
            chapter: self.chapter,
            phase: self.transition.phase(),
            player: self.world.character.position,
            facing: self.world.character.facing,
            scene_flags: self.scene_flags().unwrap_or_default(),
            music: self.world.music,
            items: self.world.items.clone(),
            tick: self.ticks,
        }
    }

    /// Runs one frame: input, ambient scripts, main script, animation,
    /// composition, then sleeps out the rest of the tick.
    pub fn tick(&mut self) -> Result<TickReport, EngineError> {
        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };
        if self.abort {
            report.exit_requested = true;
            return Ok(report);
        }
        self.ticks += 1;
        let started = self.clock.now_millis();

        self.poll_input();
        if self.abort {
            report.exit_requested = true;
            return Ok(report);
        }

        report.ambient = self.run_ambient();
        if self.abort {
            report.exit_requested = true;
            return Ok(report);
        }

        let now = self.clock.now_millis();
        self.resolve_modals(now);
        if !self.world.modals.blocks_main_script() {
            self.run_main_script(now);
        }
        if self.abort {
            report.exit_requested = true;
            return Ok(report);
        }

        self.animate(self.clock.now_millis());
        if let Some(request) = self.world.pending_transition.take() {
            report.transition =
                Some(self.enter_scene(request.scene, request.facing, request.flags)?);
        }
        if self.abort {
            report.exit_requested = true;
            return Ok(report);
        }

        report.compose = Some(self.compose(false));
        self.clock
            .sleep_until(started + self.world.config.tick_length_ms);
        Ok(report)
    }

    pub(crate) fn compose(&mut self, force_all: bool) -> ComposeReport {
        let decorations = Decorations {
            message: self.world.ui.message.as_ref().map(|banner| banner.text.as_str()),
            panel_visible: self.world.ui.panel_visible,
        };
        self.world.compositor.compose(
            force_all,
            &mut self.world.registry,
            &self.world.shapes,
            decorations,
            &mut self.canvas,
        )
    }

    /// Sends a command to the scheduler when it owns it, otherwise to the
    /// scene state.
    pub(crate) fn route(
        &mut self,
        origin: CommandOrigin,
        command: ScriptCommand,
        now: u64,
    ) -> Option<i32> {
        match self.scheduler.apply_control(&command, now) {
            Some(Ok(reply)) => reply,
            Some(Err(fault)) => {
                self.world.fault(origin, command.name(), fault);
                None
            }
            None => self.world.execute(origin, command, now),
        }
    }

    fn poll_input(&mut self) {
        for event in self.input.poll() {
            match event {
                InputEvent::Quit => self.request_exit(),
                _ if !self.world.ui.input_enabled || self.is_transitioning() => {
                    log::debug!("input {event:?} dropped while input is suppressed");
                }
                InputEvent::Click { x, y } => self.click(Point::new(x, y)),
                InputEvent::UseExit { edge } => self.leave_through(edge),
            }
        }
    }

    fn click(&mut self, point: Point) {
        let playfield = self.world.config.playfield;
        if !playfield.contains(point) {
            return;
        }
        let exits = self
            .world
            .scene
            .as_ref()
            .map(|scene| scene.descriptor.exits)
            .unwrap_or_default();
        self.world
            .character
            .walk_to(walk_target_for_click(point, playfield, &exits));
        self.world
            .events
            .push(format!("input.click {},{}", point.x, point.y));

        if !self.vm.is_valid(&self.main) && self.vm.start_entry_point(&mut self.main, ENTRY_CLICK) {
            self.main.regs[0] = point.x;
            self.main.regs[1] = point.y;
        }
    }

    fn leave_through(&mut self, edge: Direction) {
        let target = self
            .world
            .scene
            .as_ref()
            .and_then(|scene| scene.descriptor.exits.target(edge));
        let Some(scene) = target else {
            self.world.events.push(format!("scene.no_exit {edge:?}"));
            return;
        };
        self.world
            .events
            .push(format!("scene.exit {edge:?} -> {scene}"));
        self.world.pending_transition = Some(TransitionRequest {
            scene,
            facing: edge.outward(),
            flags: TransitionFlags {
                walk_in: true,
                ..TransitionFlags::default()
            },
        });
    }

    fn run_ambient(&mut self) -> AmbientPass {
        let now = self.clock.now_millis();
        let mut sink = Dispatch {
            world: &mut self.world,
            now,
        };
        let pass = self
            .scheduler
            .update(self.vm.as_mut(), self.clock.as_ref(), &mut sink);
        if pass.overrun {
            self.world.events.push(format!(
                "ambient.overrun {}",
                self.scheduler.last_processed()
            ));
        }
        for slot in &pass.runaway {
            self.world.events.push(format!("ambient.runaway {slot}"));
        }
        pass
    }

    fn resolve_modals(&mut self, now: u64) {
        let walking = self.world.character.is_walking();
        for modal in self.world.modals.resolve(now, walking) {
            match modal {
                Modal::EntranceWalk { .. } => self.finish_entry(),
                Modal::Message { .. } => self.world.hide_message(),
                Modal::Delay { .. } => {}
            }
        }
    }

    /// Steps the main script until it yields, finishes, blocks on a modal
    /// or requests a scene change.
    fn run_main_script(&mut self, now: u64) {
        if !self.vm.is_valid(&self.main) {
            return;
        }
        let mut context = std::mem::take(&mut self.main);
        let limit = self.world.config.max_main_steps_per_tick;
        let mut queue = CommandQueue::new();
        let mut steps = 0usize;
        loop {
            if steps >= limit {
                self.world
                    .fault(CommandOrigin::Main, "tick", ScriptFault::Runaway(limit));
                break;
            }
            let running = self.vm.step_one(&mut context, &mut queue);
            steps += 1;
            let mut yielded = false;
            while let Some(command) = queue.pop() {
                if command == ScriptCommand::Yield {
                    yielded = true;
                    continue;
                }
                if let Some(reply) = self.route(CommandOrigin::Main, command, now) {
                    self.vm.set_reply(&mut context, reply);
                }
            }
            if !running
                || yielded
                || self.abort
                || self.world.modals.blocks_main_script()
                || self.world.pending_transition.is_some()
            {
                break;
            }
        }
        self.main = context;
    }

    fn animate(&mut self, now: u64) {
        let playfield = self.world.config.playfield;
        let speed = self.world.config.walk_speed;
        let exits = self
            .world
            .scene
            .as_ref()
            .map(|scene| scene.descriptor.exits)
            .unwrap_or_default();
        match self.world.character.step(speed, playfield, &exits) {
            WalkStep::Exited(edge) => self.leave_through(edge),
            WalkStep::Arrived => {
                let position = self.world.character.position;
                self.world
                    .events
                    .push(format!("character.arrived {},{}", position.x, position.y));
                self.idle
                    .reset(now, self.world.config.idle_delay_secs, &mut self.rng);
            }
            WalkStep::Moved | WalkStep::Standing => {}
        }
        self.sync_character();

        if let Some(scene) = self.world.scene.as_ref() {
            self.world
                .animator
                .advance(&scene.overlays, &mut self.world.registry);
        }

        if !self.world.character.is_walking() && self.idle.expired(now) {
            self.world.events.push("character.idle");
            self.idle
                .reset(now, self.world.config.idle_delay_secs, &mut self.rng);
        }

        let expired = self
            .world
            .ui
            .message
            .as_ref()
            .is_some_and(|banner| now >= banner.until);
        if expired {
            self.world.hide_message();
        }
    }

    fn sync_character(&mut self) {
        let registered = self
            .world
            .registry
            .get(CHARACTER_SLOT)
            .is_some_and(|object| object.source.is_some());
        if !registered {
            return;
        }
        let atlas_len = self.world.shapes.atlas(AtlasKind::Character).len();
        let frame = self.world.character.frame(atlas_len);
        let position = self.world.character.position;
        let synced = self
            .world
            .registry
            .move_to(CHARACTER_SLOT, position)
            .and_then(|_| self.world.registry.set_frame(CHARACTER_SLOT, frame));
        if let Err(fault) = synced {
            log::warn!("character sync failed: {fault}");
        }
    }
}
