#![allow(dead_code)]

use std::{fs, path::Path, rc::Rc};

use serde_json::{json, Value};
use tapestry_assets::{MemoryPack, Palette, PALETTE_SIZE};
use tapestry_engine::{
    EngineConfig, EngineServices, FrameBuffer, HeadlessEngine, InputProvider, ListingInterpreter,
    ManualClock, NullInput, Point, RecordingAudioCallback, TransitionFlags,
};

pub const SCENE_A: u16 = 1;
pub const SCENE_B: u16 = 2;
pub const SCENE_C: u16 = 3;
/// Listed in the table but none of its assets exist.
pub const SCENE_MISSING: u16 = 9;

pub const A_MUSIC: u16 = 4;
pub const B_MUSIC: u16 = 6;
pub const SHOWN_SFX: u16 = 21;
pub const SHADED_OVERLAY: u8 = 90;

pub struct Harness {
    pub engine: HeadlessEngine,
    pub clock: ManualClock,
    pub audio: RecordingAudioCallback,
}

impl Harness {
    pub fn ticks(&mut self, count: usize) {
        for _ in 0..count {
            self.engine.tick().expect("tick");
        }
    }

    pub fn enter(&mut self, scene: u16, position: Point) {
        let flags = TransitionFlags {
            position: Some(position),
            ..TransitionFlags::default()
        };
        self.engine
            .enter_scene(scene, tapestry_engine::Facing::South, flags)
            .expect("enter scene");
    }
}

pub fn harness() -> Harness {
    harness_with(fixture_pack(), EngineConfig::default(), Box::new(NullInput))
}

pub fn harness_with(
    pack: MemoryPack,
    config: EngineConfig,
    input: Box<dyn InputProvider>,
) -> Harness {
    let clock = ManualClock::starting_at(1_000);
    let audio = RecordingAudioCallback::new();
    let width = config.screen_width as u16;
    let height = config.screen_height as u16;
    let engine = HeadlessEngine::new(
        config,
        EngineServices {
            resources: Box::new(pack),
            interpreter: Box::new(ListingInterpreter::new()),
            clock: Box::new(clock.clone()),
            input,
            audio: Rc::new(audio.clone()),
            canvas: FrameBuffer::new(width, height),
        },
    )
    .expect("engine");
    Harness {
        engine,
        clock,
        audio,
    }
}

fn palette(color: [u8; 3]) -> Palette {
    Palette {
        colors: vec![color; PALETTE_SIZE],
    }
}

pub fn scene_table() -> Value {
    json!({
        "chapters": [
            {"number": 1, "name": "one", "character_shapes": "hero1.shp", "character_palette": "hero1.pal"},
            {"number": 2, "name": "two", "character_shapes": "hero2.shp", "character_palette": "hero2.pal"}
        ],
        "scenes": [
            {
                "id": SCENE_A, "name": "hall", "palette": "hall.pal", "background": "hall.bg",
                "shapes": "hall.shp", "script": "hall.emc",
                "exits": {"east": SCENE_B}, "music": A_MUSIC, "chapter": 1,
                "palette_layers": ["shade.map"]
            },
            {
                "id": SCENE_B, "name": "yard", "palette": "yard.pal", "background": "yard.bg",
                "shapes": "yard.shp", "script": "yard.emc",
                "exits": {"west": SCENE_A, "south": SCENE_C}, "music": B_MUSIC, "chapter": 1
            },
            {
                "id": SCENE_C, "name": "tower", "palette": "yard.pal", "background": "yard.bg",
                "shapes": "yard.shp", "script": "tower.emc",
                "exits": {"north": SCENE_B}, "chapter": 2
            },
            {
                "id": SCENE_MISSING, "name": "void", "palette": "void.pal", "background": "void.bg",
                "shapes": "void.shp", "script": "void.emc", "chapter": 1
            }
        ]
    })
}

fn atlas(frames: usize, width: u16, height: u16, fill: u8) -> Value {
    let x_offset = -(i32::from(width) / 2);
    let y_offset = -i32::from(height);
    let shapes: Vec<Value> = (0..frames)
        .map(|frame| {
            let color = fill + frame as u8;
            json!({
                "width": width, "height": height,
                "x_offset": x_offset, "y_offset": y_offset,
                "fill": color
            })
        })
        .collect();
    json!({ "shapes": shapes })
}

/// Palette layer 1 in the hall: the first hall frame colour shades to
/// [`SHADED_OVERLAY`].
fn shade_table() -> Value {
    let mut map: Vec<u8> = (0..=255).collect();
    map[20] = SHADED_OVERLAY;
    json!({ "map": map })
}

/// Hall: two overlays, a shown entry point and three ambient slots.
pub fn hall_script() -> Value {
    json!({"entry_points": {
        "0": [
            {"op": "define_entrance", "edge": "east", "x": 297, "y": 101},
            {"op": "define_entrance", "edge": "west", "x": 16, "y": 100},
            {"op": "define_overlay", "slot": 0, "overlay": {
                "flags": {"visible": true},
                "anchor": {"x": 40, "y": 60},
                "source": {"kind": "shape", "frame": 0}
            }},
            {"op": "define_overlay", "slot": 1, "overlay": {
                "flags": {"visible": true},
                "anchor": {"x": 120, "y": 90},
                "source": {"kind": "sequence", "first_frame": 1, "last_frame": 2, "frame_ticks": 2}
            }},
            {"op": "set_scene_flags", "flags": 1}
        ],
        "1": [
            {"op": "place_item", "item": 5, "x": 80, "y": 110}
        ],
        "3": [
            {"op": "play_sfx", "sound": SHOWN_SFX}
        ],
        "9": [
            {"op": "set_frame", "object": 1, "frame": 2},
            {"op": "wait", "ticks": 5}
        ],
        "10": [
            {"op": "query_suspended", "slot": 2},
            {"op": "jump_if_nonzero", "target": 3},
            {"op": "suspend", "slot": 2},
            {"op": "yield"}
        ],
        "11": [
            {"op": "play_sfx", "sound": 99},
            {"op": "yield"}
        ]
    }})
}

pub fn yard_script() -> Value {
    json!({"entry_points": {
        "0": [
            {"op": "define_entrance", "edge": "west", "x": 16, "y": 100},
            {"op": "define_entrance", "edge": "south", "x": 160, "y": 140},
            {"op": "define_overlay", "slot": 0, "overlay": {
                "flags": {"visible": true},
                "anchor": {"x": 200, "y": 120},
                "source": {"kind": "shape", "frame": 0}
            }}
        ]
    }})
}

pub fn tower_script() -> Value {
    json!({"entry_points": {
        "0": [
            {"op": "define_entrance", "edge": "north", "x": 160, "y": 20}
        ]
    }})
}

pub fn fixture_assets() -> Vec<(&'static str, Vec<u8>)> {
    let to_bytes = |value: Value| serde_json::to_vec(&value).expect("encode fixture");
    let palette_bytes =
        |color: [u8; 3]| serde_json::to_vec(&palette(color)).expect("encode palette");
    vec![
        ("scenes.json", to_bytes(scene_table())),
        ("items.shp", to_bytes(atlas(8, 6, 6, 60))),
        ("hero1.shp", to_bytes(atlas(8, 8, 16, 100))),
        ("hero2.shp", to_bytes(atlas(8, 8, 16, 120))),
        ("hero1.pal", palette_bytes([200, 10, 10])),
        ("hero2.pal", palette_bytes([10, 200, 10])),
        ("hall.pal", palette_bytes([30, 30, 30])),
        ("yard.pal", palette_bytes([60, 60, 60])),
        (
            "hall.bg",
            to_bytes(json!({"width": 320, "height": 200, "fill": 3})),
        ),
        (
            "yard.bg",
            to_bytes(json!({"width": 320, "height": 200, "fill": 4})),
        ),
        ("hall.shp", to_bytes(atlas(3, 16, 16, 20))),
        ("shade.map", to_bytes(shade_table())),
        ("yard.shp", to_bytes(atlas(1, 24, 12, 40))),
        ("hall.emc", to_bytes(hall_script())),
        ("yard.emc", to_bytes(yard_script())),
        ("tower.emc", to_bytes(tower_script())),
    ]
}

pub fn fixture_pack() -> MemoryPack {
    let mut pack = MemoryPack::new();
    for (name, bytes) in fixture_assets() {
        pack.insert(name, bytes);
    }
    pack
}

pub fn write_fixture(dir: &Path) -> std::io::Result<()> {
    for (name, bytes) in fixture_assets() {
        fs::write(dir.join(name), bytes)?;
    }
    Ok(())
}

/// Pack whose hall script is replaced by `script`.
pub fn pack_with_hall_script(script: Value) -> MemoryPack {
    let mut pack = fixture_pack();
    pack.insert_json("hall.emc", &script).expect("encode script");
    pack
}
