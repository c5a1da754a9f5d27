//! Applies script commands to the scene state.

use std::rc::Rc;

use serde::Serialize;

use crate::animation::{Character, OverlayAnimator};
use crate::audio::AudioCallback;
use crate::compositor::Compositor;
use crate::config::EngineConfig;
use crate::error::ScriptFault;
use crate::events::EventLog;
use crate::geometry::Point;
use crate::items::ItemLedger;
use crate::modal::{Modal, ModalStack};
use crate::overlays::SceneOverlay;
use crate::registry::{
    overlay_object, AtlasKind, ObjectSetup, Registry, ShapeRef, CHARACTER_SLOT,
};
use crate::scene::{Facing, TransitionFlags, TransitionRequest};
use crate::scheduler::CommandSink;
use crate::script::{CommandOrigin, ScriptCommand};
use crate::shapes::ShapeBank;
use crate::transition::LoadedScene;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub text: String,
    pub until: u64,
}

#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub message: Option<Banner>,
    pub panel_visible: bool,
    pub input_enabled: bool,
}

/// Scene state reachable from script commands.
#[derive(Debug)]
pub(crate) struct World {
    pub(crate) config: EngineConfig,
    pub(crate) audio: Rc<dyn AudioCallback>,
    pub(crate) scene: Option<LoadedScene>,
    pub(crate) registry: Registry,
    pub(crate) shapes: ShapeBank,
    pub(crate) character: Character,
    pub(crate) modals: ModalStack,
    pub(crate) ui: UiState,
    pub(crate) items: ItemLedger,
    pub(crate) events: EventLog,
    pub(crate) pending_transition: Option<TransitionRequest>,
    pub(crate) compositor: Compositor,
    pub(crate) animator: OverlayAnimator,
    pub(crate) music: Option<u16>,
}

impl World {
    pub(crate) fn new(config: EngineConfig, audio: Rc<dyn AudioCallback>) -> Self {
        let compositor = Compositor::new(config.screen(), config.playfield);
        Self {
            character: Character::new(Point::default(), config.start_facing),
            config,
            audio,
            scene: None,
            registry: Registry::new(),
            shapes: ShapeBank::default(),
            modals: ModalStack::new(),
            ui: UiState::default(),
            items: ItemLedger::new(),
            events: EventLog::new(),
            pending_transition: None,
            compositor,
            animator: OverlayAnimator::new(),
            music: None,
        }
    }

    fn ticks_to_millis(&self, ticks: u32) -> u64 {
        ticks as u64 * self.config.tick_length_ms
    }

    /// Applies `command`, turning a fault into a log entry. Returns the
    /// reply for query commands.
    pub(crate) fn execute(
        &mut self,
        origin: CommandOrigin,
        command: ScriptCommand,
        now: u64,
    ) -> Option<i32> {
        let name = command.name();
        match self.apply(origin, command, now) {
            Ok(reply) => reply,
            Err(fault) => {
                self.fault(origin, name, fault);
                None
            }
        }
    }

    pub(crate) fn fault(&mut self, origin: CommandOrigin, name: &str, fault: ScriptFault) {
        log::warn!("{origin} script: {name} ignored: {fault}");
        self.events
            .push(format!("script.fault {origin} {name}: {fault}"));
    }

    /// Script coordinates may reach one screen beyond each edge.
    fn reachable(&self, x: i32, y: i32) -> Result<Point, ScriptFault> {
        let screen = self.config.screen();
        let area = screen.inflate(screen.width, screen.height);
        let point = Point::new(x, y);
        if area.contains(point) {
            Ok(point)
        } else {
            Err(ScriptFault::InvalidPosition(x, y))
        }
    }

    pub(crate) fn apply(
        &mut self,
        origin: CommandOrigin,
        command: ScriptCommand,
        now: u64,
    ) -> Result<Option<i32>, ScriptFault> {
        match command {
            ScriptCommand::DefineOverlay { slot, overlay } => {
                require_init(origin, "define_overlay")?;
                self.define_overlay(slot, overlay)?;
            }
            ScriptCommand::InsertOverlay { slot } => {
                self.defined_overlay(slot)?;
                self.registry.enable(overlay_object(slot))?;
            }
            ScriptCommand::RemoveOverlay { slot } => {
                self.defined_overlay(slot)?;
                self.registry.disable(overlay_object(slot))?;
            }
            ScriptCommand::SetFrame { object, frame } => self.registry.set_frame(object, frame)?,
            ScriptCommand::MoveObject { object, x, y } => {
                let position = self.reachable(x, y)?;
                self.registry.move_to(object, position)?;
                if object == CHARACTER_SLOT {
                    self.character.place(position);
                }
            }
            ScriptCommand::SetScale { object, scale } => self.registry.set_scale(object, scale)?,
            ScriptCommand::SetPaletteLayer { object, layer } => {
                self.registry.set_palette_layer(object, layer)?
            }
            ScriptCommand::PlaceItem { item, x, y } => {
                let position = self.reachable(x, y)?;
                self.place_item(item, position)?;
                self.events.push(format!("item.place {item} @ {x},{y}"));
            }
            ScriptCommand::RemoveItem { item } => {
                self.remove_item(item)?;
                self.events.push(format!("item.remove {item}"));
            }
            // Routed to the ambient scheduler before reaching the world.
            ScriptCommand::SetCooldown { .. }
            | ScriptCommand::Suspend { .. }
            | ScriptCommand::Resume { .. }
            | ScriptCommand::QuerySuspended { .. }
            | ScriptCommand::Yield => {}
            ScriptCommand::DefineEntrance { edge, x, y } => {
                require_init(origin, "define_entrance")?;
                let position = self.reachable(x, y)?;
                let scene = self.scene.as_mut().ok_or(ScriptFault::NoScene)?;
                scene.entrances[edge.index()] = Some(position);
            }
            ScriptCommand::SetSceneFlags { flags } => {
                let scene = self.scene.as_mut().ok_or(ScriptFault::NoScene)?;
                scene.flags = flags;
                self.events.push(format!("scene.flags {flags:#06x}"));
            }
            ScriptCommand::EnterScene {
                scene,
                facing,
                silent,
                walk_in,
                position,
            } => {
                if let Some(point) = position {
                    self.reachable(point.x, point.y)?;
                }
                self.events
                    .push(format!("scene.request {scene} from {origin}"));
                self.pending_transition = Some(TransitionRequest {
                    scene,
                    facing,
                    flags: TransitionFlags {
                        silent,
                        walk_in,
                        position,
                    },
                });
            }
            ScriptCommand::SetPlayerPosition { x, y } => {
                let position = self.reachable(x, y)?;
                self.character.place(position);
                self.registry.move_to(CHARACTER_SLOT, position)?;
            }
            ScriptCommand::SetPlayerFacing { facing } => self.face(facing),
            ScriptCommand::WalkPlayerTo { x, y } => {
                let target = self.reachable(x, y)?;
                self.character.walk_to(target);
            }
            ScriptCommand::ShowMessage { text, ticks } => {
                let until = now + self.ticks_to_millis(ticks);
                self.events.push(format!("message.show {text:?}"));
                self.ui.message = Some(Banner { text, until });
                self.compositor.invalidate_all();
                if origin == CommandOrigin::Main {
                    self.modals.push(Modal::Message { until });
                }
            }
            ScriptCommand::HideMessage => self.hide_message(),
            ScriptCommand::SetPanelVisible { visible } => {
                if self.ui.panel_visible != visible {
                    self.ui.panel_visible = visible;
                    self.compositor.invalidate_all();
                }
            }
            ScriptCommand::Wait { ticks } => match origin {
                CommandOrigin::Main => {
                    let until = now + self.ticks_to_millis(ticks);
                    self.modals.push(Modal::Delay { until });
                }
                CommandOrigin::Init => log::debug!("init script wait of {ticks} ticks skipped"),
                CommandOrigin::Ambient(_) => {}
            },
            ScriptCommand::PlayMusic { track } => self.play_music(track),
            ScriptCommand::PlaySfx { sound } => self.audio.sfx_play(sound),
            ScriptCommand::ForceRedraw => self.compositor.invalidate_all(),
        }
        Ok(None)
    }

    fn define_overlay(&mut self, slot: usize, overlay: SceneOverlay) -> Result<(), ScriptFault> {
        self.reachable(overlay.anchor.x, overlay.anchor.y)?;
        let scene = self.scene.as_mut().ok_or(ScriptFault::NoScene)?;
        scene.overlays.define(slot, overlay.clone())?;

        let object = overlay_object(slot);
        let source = ShapeRef {
            atlas: AtlasKind::Scene,
            frame: overlay.source.initial_frame(),
        };
        let mut setup = ObjectSetup::at(overlay.anchor, Some(source));
        setup.draw_offset = overlay.draw_offset;
        setup.width = overlay.width;
        setup.height = overlay.height;
        setup.inflate_x = overlay.inflate_x;
        setup.inflate_y = overlay.inflate_y;
        setup.overlay = Some(slot);
        setup.always_refresh = overlay.flags.always_refresh;
        self.registry.populate(object, setup)?;
        if overlay.flags.visible {
            self.registry.enable(object)?;
        }
        Ok(())
    }

    fn defined_overlay(&self, slot: usize) -> Result<&SceneOverlay, ScriptFault> {
        let scene = self.scene.as_ref().ok_or(ScriptFault::NoScene)?;
        if slot >= crate::overlays::OVERLAY_CAPACITY {
            return Err(ScriptFault::InvalidOverlay(slot));
        }
        scene
            .overlays
            .get(slot)
            .ok_or(ScriptFault::UndefinedOverlay(slot))
    }

    /// Shows `item` at `position` in the current scene, claiming a free
    /// item slot on first placement.
    pub(crate) fn place_item(&mut self, item: u16, position: Point) -> Result<(), ScriptFault> {
        let scene_id = self
            .scene
            .as_ref()
            .ok_or(ScriptFault::NoScene)?
            .descriptor
            .id;
        let index = match self.registry.item_slot(item) {
            Some(index) => index,
            None => {
                let index = self
                    .registry
                    .free_item_slot()
                    .ok_or(ScriptFault::ItemCapacity(item))?;
                let source = ShapeRef {
                    atlas: AtlasKind::Items,
                    frame: item,
                };
                let mut setup = ObjectSetup::at(position, Some(source));
                setup.item = Some(item);
                self.registry.populate(index, setup)?;
                index
            }
        };
        self.registry.move_to(index, position)?;
        self.registry.enable(index)?;
        self.items.place(scene_id, item, position);
        Ok(())
    }

    fn remove_item(&mut self, item: u16) -> Result<(), ScriptFault> {
        let scene_id = self
            .scene
            .as_ref()
            .ok_or(ScriptFault::NoScene)?
            .descriptor
            .id;
        let index = self
            .registry
            .item_slot(item)
            .ok_or(ScriptFault::UnknownItem(item))?;
        self.registry.release_item(index)?;
        self.items.remove(scene_id, item);
        Ok(())
    }

    pub(crate) fn face(&mut self, facing: Facing) {
        self.character.facing = facing;
        if let Some(object) = self.registry.get_mut(CHARACTER_SLOT) {
            object.needs_refresh = true;
        }
    }

    pub(crate) fn hide_message(&mut self) {
        if self.ui.message.take().is_some() {
            self.compositor.invalidate_all();
            self.events.push("message.hide");
        }
        self.modals.flush_messages();
    }

    pub(crate) fn play_music(&mut self, track: u16) {
        if self.music == Some(track) {
            return;
        }
        self.audio.music_play(track);
        self.music = Some(track);
        self.events.push(format!("audio.music {track}"));
    }
}

fn require_init(origin: CommandOrigin, name: &'static str) -> Result<(), ScriptFault> {
    if origin == CommandOrigin::Init {
        Ok(())
    } else {
        Err(ScriptFault::InitOnly(name))
    }
}

/// Sink handed to the ambient scheduler for one pass.
pub(crate) struct Dispatch<'a> {
    pub(crate) world: &'a mut World,
    pub(crate) now: u64,
}

impl CommandSink for Dispatch<'_> {
    fn dispatch(&mut self, origin: CommandOrigin, command: ScriptCommand) -> Option<i32> {
        self.world.execute(origin, command, self.now)
    }

    fn fault(&mut self, origin: CommandOrigin, command: &ScriptCommand, fault: ScriptFault) {
        self.world.fault(origin, command.name(), fault);
    }
}
