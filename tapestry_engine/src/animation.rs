//! Per-tick animation: character walking, overlay frame sequences and the
//! idle countdown.

use rand::Rng;
use serde::Serialize;

use crate::config::IdleDelay;
use crate::geometry::{Point, Rect};
use crate::overlays::{OverlaySource, OverlayTable, Playback, OVERLAY_CAPACITY};
use crate::registry::{overlay_object, Registry};
use crate::scene::{Direction, Facing, SceneExits};

/// Frames in one walk cycle of the character atlas.
pub const WALK_CYCLE: u16 = 4;
/// Clicks this close to an edge with an exit walk through it.
pub const EDGE_MARGIN: i32 = 8;

const STANDING_FRAMES: u16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStep {
    Standing,
    Moved,
    Arrived,
    Exited(Direction),
}

#[derive(Debug, Clone, Serialize)]
pub struct Character {
    pub position: Point,
    pub facing: Facing,
    pub walk_target: Option<Point>,
    #[serde(skip)]
    walk_phase: u16,
    /// Entrance walks start outside the playfield and ignore exits.
    #[serde(skip)]
    pub unconfined: bool,
}

impl Character {
    pub fn new(position: Point, facing: Facing) -> Self {
        Self {
            position,
            facing,
            walk_target: None,
            walk_phase: 0,
            unconfined: false,
        }
    }

    pub fn is_walking(&self) -> bool {
        self.walk_target.is_some()
    }

    pub fn walk_to(&mut self, target: Point) {
        self.walk_target = (target != self.position).then_some(target);
    }

    pub fn place(&mut self, position: Point) {
        self.position = position;
        self.stop();
    }

    pub fn stop(&mut self) {
        self.walk_target = None;
        self.walk_phase = 0;
    }

    /// Moves up to `speed` pixels on each axis toward the walk target.
    pub fn step(&mut self, speed: i32, playfield: Rect, exits: &SceneExits) -> WalkStep {
        let Some(target) = self.walk_target else {
            return WalkStep::Standing;
        };
        let dx = (target.x - self.position.x).clamp(-speed, speed);
        let dy = (target.y - self.position.y).clamp(-speed, speed);
        self.facing = Facing::toward(self.position, target);
        self.position = self.position.offset(dx, dy);
        self.walk_phase = (self.walk_phase + 1) % WALK_CYCLE;

        if !self.unconfined {
            if let Some(edge) = edge_crossed(self.position, playfield) {
                if exits.target(edge).is_some() {
                    self.stop();
                    return WalkStep::Exited(edge);
                }
                self.position = clamp_to(self.position, playfield);
                self.stop();
                return WalkStep::Arrived;
            }
        }
        if self.position == target {
            self.stop();
            return WalkStep::Arrived;
        }
        WalkStep::Moved
    }

    /// Atlas frame for the current pose. Atlases without walk cycles only
    /// provide the eight standing frames.
    pub fn frame(&self, atlas_len: usize) -> u16 {
        let walk_frames = (STANDING_FRAMES + STANDING_FRAMES * WALK_CYCLE) as usize;
        if self.is_walking() && atlas_len >= walk_frames {
            STANDING_FRAMES + self.facing.index() * WALK_CYCLE + self.walk_phase
        } else {
            self.facing.index()
        }
    }
}

fn edge_crossed(position: Point, playfield: Rect) -> Option<Direction> {
    if position.x < playfield.x {
        Some(Direction::West)
    } else if position.x >= playfield.right() {
        Some(Direction::East)
    } else if position.y < playfield.y {
        Some(Direction::North)
    } else if position.y >= playfield.bottom() {
        Some(Direction::South)
    } else {
        None
    }
}

pub fn clamp_to(position: Point, playfield: Rect) -> Point {
    Point::new(
        position.x.clamp(playfield.x, playfield.right() - 1),
        position.y.clamp(playfield.y, playfield.bottom() - 1),
    )
}

/// Point just past `edge`, level with `from`.
pub fn beyond_edge(from: Point, edge: Direction, playfield: Rect) -> Point {
    match edge {
        Direction::North => Point::new(from.x, playfield.y - EDGE_MARGIN),
        Direction::East => Point::new(playfield.right() + EDGE_MARGIN, from.y),
        Direction::South => Point::new(from.x, playfield.bottom() + EDGE_MARGIN),
        Direction::West => Point::new(playfield.x - EDGE_MARGIN, from.y),
    }
}

/// Where a click sends the character: through an exit when the click lands
/// in that edge's margin, otherwise to the click itself.
pub fn walk_target_for_click(click: Point, playfield: Rect, exits: &SceneExits) -> Point {
    let near = |edge: Direction| match edge {
        Direction::North => click.y < playfield.y + EDGE_MARGIN,
        Direction::East => click.x >= playfield.right() - EDGE_MARGIN,
        Direction::South => click.y >= playfield.bottom() - EDGE_MARGIN,
        Direction::West => click.x < playfield.x + EDGE_MARGIN,
    };
    Direction::ALL
        .into_iter()
        .find(|edge| exits.target(*edge).is_some() && near(*edge))
        .map(|edge| beyond_edge(click, edge, playfield))
        .unwrap_or(click)
}

/// Start of an entrance walk: `distance` pixels behind `anchor` as seen
/// from a character walking in `facing`.
pub fn entrance_start(anchor: Point, facing: Facing, distance: i32) -> Point {
    let (dx, dy) = facing.step();
    anchor.offset(-dx * distance, -dy * distance)
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IdleCountdown {
    deadline: Option<u64>,
}

impl IdleCountdown {
    pub fn reset<R: Rng>(&mut self, now: u64, delay: IdleDelay, rng: &mut R) {
        let secs = rng.gen_range(delay.min..=delay.max);
        self.deadline = Some(now + secs as u64 * 1000);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn expired(&self, now: u64) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SequenceState {
    frame: u16,
    ticks_left: u32,
    finished: bool,
}

/// Frame counters for overlays backed by a frame sequence.
#[derive(Debug, Clone)]
pub struct OverlayAnimator {
    states: Vec<Option<SequenceState>>,
}

impl Default for OverlayAnimator {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayAnimator {
    pub fn new() -> Self {
        Self {
            states: vec![None; OVERLAY_CAPACITY],
        }
    }

    pub fn reset(&mut self, overlays: &OverlayTable) {
        self.states.iter_mut().for_each(|state| *state = None);
        for (slot, overlay) in overlays.iter() {
            if let OverlaySource::Sequence {
                first_frame,
                frame_ticks,
                ..
            } = overlay.source
            {
                self.states[slot] = Some(SequenceState {
                    frame: first_frame,
                    ticks_left: frame_ticks.max(1),
                    finished: false,
                });
            }
        }
    }

    pub fn is_finished(&self, slot: usize) -> bool {
        self.states
            .get(slot)
            .copied()
            .flatten()
            .is_some_and(|state| state.finished)
    }

    /// Advances every visible sequence by one tick. Returns the overlay
    /// slots whose frame changed.
    pub fn advance(&mut self, overlays: &OverlayTable, registry: &mut Registry) -> Vec<usize> {
        let mut changed = Vec::new();
        for (slot, overlay) in overlays.iter() {
            let OverlaySource::Sequence {
                first_frame,
                last_frame,
                frame_ticks,
            } = overlay.source
            else {
                continue;
            };
            let object = overlay_object(slot);
            if !registry.get(object).is_some_and(|o| o.enabled) {
                continue;
            }
            let Some(state) = self.states[slot].as_mut() else {
                continue;
            };
            if state.finished {
                continue;
            }
            state.ticks_left = state.ticks_left.saturating_sub(1);
            if state.ticks_left > 0 {
                continue;
            }
            state.ticks_left = frame_ticks.max(1);
            let next = if state.frame >= last_frame {
                match overlay.playback {
                    Playback::Loop => first_frame,
                    Playback::OneShot => {
                        state.finished = true;
                        continue;
                    }
                }
            } else {
                state.frame + 1
            };
            state.frame = next;
            if let Err(fault) = registry.set_frame(object, next) {
                log::warn!("overlay {slot}: {fault}");
                continue;
            }
            changed.push(slot);
        }
        changed
    }
}
