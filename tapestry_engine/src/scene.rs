use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Eight-way character facing, clockwise from north.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    North,
    NorthEast,
    East,
    SouthEast,
    #[default]
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Facing {
    pub const ALL: [Facing; 8] = [
        Facing::North,
        Facing::NorthEast,
        Facing::East,
        Facing::SouthEast,
        Facing::South,
        Facing::SouthWest,
        Facing::West,
        Facing::NorthWest,
    ];

    pub fn index(self) -> u16 {
        self as u16
    }

    /// Edge a character walking in this direction enters a scene through.
    /// Diagonal facings have no entrance of their own.
    pub fn entry_edge(self) -> Option<Direction> {
        match self {
            Facing::North => Some(Direction::South),
            Facing::East => Some(Direction::West),
            Facing::South => Some(Direction::North),
            Facing::West => Some(Direction::East),
            _ => None,
        }
    }

    /// Unit step for walking in this facing, in screen coordinates.
    pub fn step(self) -> (i32, i32) {
        match self {
            Facing::North => (0, -1),
            Facing::NorthEast => (1, -1),
            Facing::East => (1, 0),
            Facing::SouthEast => (1, 1),
            Facing::South => (0, 1),
            Facing::SouthWest => (-1, 1),
            Facing::West => (-1, 0),
            Facing::NorthWest => (-1, -1),
        }
    }

    /// Facing that points from `from` toward `to`.
    pub fn toward(from: Point, to: Point) -> Facing {
        let dx = (to.x - from.x).signum();
        let dy = (to.y - from.y).signum();
        match (dx, dy) {
            (0, -1) => Facing::North,
            (1, -1) => Facing::NorthEast,
            (1, 0) => Facing::East,
            (1, 1) => Facing::SouthEast,
            (0, 1) => Facing::South,
            (-1, 1) => Facing::SouthWest,
            (-1, 0) => Facing::West,
            (-1, -1) => Facing::NorthWest,
            _ => Facing::South,
        }
    }

    pub fn parse(value: &str) -> Option<Facing> {
        match value.to_ascii_lowercase().replace('-', "_").as_str() {
            "north" | "n" => Some(Facing::North),
            "north_east" | "northeast" | "ne" => Some(Facing::NorthEast),
            "east" | "e" => Some(Facing::East),
            "south_east" | "southeast" | "se" => Some(Facing::SouthEast),
            "south" | "s" => Some(Facing::South),
            "south_west" | "southwest" | "sw" => Some(Facing::SouthWest),
            "west" | "w" => Some(Facing::West),
            "north_west" | "northwest" | "nw" => Some(Facing::NorthWest),
            _ => None,
        }
    }
}

/// One of the four scene edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Facing of a character leaving through this edge.
    pub fn outward(self) -> Facing {
        match self {
            Direction::North => Facing::North,
            Direction::East => Facing::East,
            Direction::South => Facing::South,
            Direction::West => Facing::West,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneExits {
    pub north: Option<u16>,
    pub east: Option<u16>,
    pub south: Option<u16>,
    pub west: Option<u16>,
}

impl SceneExits {
    pub fn target(&self, direction: Direction) -> Option<u16> {
        match direction {
            Direction::North => self.north,
            Direction::East => self.east,
            Direction::South => self.south,
            Direction::West => self.west,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    pub id: u16,
    #[serde(default)]
    pub name: String,
    pub palette: String,
    pub background: String,
    pub shapes: String,
    pub script: String,
    #[serde(default)]
    pub exits: SceneExits,
    #[serde(default)]
    pub flags: u16,
    #[serde(default)]
    pub music: Option<u16>,
    #[serde(default)]
    pub chapter: u8,
    /// Remap tables for palette layers 1, 2, ... in order.
    #[serde(default)]
    pub palette_layers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterInfo {
    pub number: u8,
    #[serde(default)]
    pub name: String,
    pub character_shapes: String,
    pub character_palette: String,
}

#[derive(Debug, Deserialize)]
struct SceneTableFile {
    #[serde(default)]
    chapters: Vec<ChapterInfo>,
    scenes: Vec<SceneDescriptor>,
}

/// Static catalog of every scene and chapter the game knows about.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "SceneTableFile")]
pub struct SceneTable {
    scenes: BTreeMap<u16, SceneDescriptor>,
    chapters: BTreeMap<u8, ChapterInfo>,
}

impl From<SceneTableFile> for SceneTable {
    fn from(file: SceneTableFile) -> Self {
        Self::new(file.scenes, file.chapters)
    }
}

impl SceneTable {
    pub fn new<S, C>(scenes: S, chapters: C) -> Self
    where
        S: IntoIterator<Item = SceneDescriptor>,
        C: IntoIterator<Item = ChapterInfo>,
    {
        Self {
            scenes: scenes.into_iter().map(|scene| (scene.id, scene)).collect(),
            chapters: chapters
                .into_iter()
                .map(|chapter| (chapter.number, chapter))
                .collect(),
        }
    }

    pub fn scene(&self, id: u16) -> Option<&SceneDescriptor> {
        self.scenes.get(&id)
    }

    pub fn chapter(&self, number: u8) -> Option<&ChapterInfo> {
        self.chapters.get(&number)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

/// How a transition should place the player once the new scene is up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionFlags {
    /// Skip the on-scene-shown entry point.
    pub silent: bool,
    /// Walk the character in from just outside the entrance.
    pub walk_in: bool,
    /// Explicit entry coordinates, bypassing the scene's entrances.
    pub position: Option<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionRequest {
    pub scene: u16,
    pub facing: Facing,
    pub flags: TransitionFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardinal_facings_enter_through_the_opposite_edge() {
        assert_eq!(Facing::North.entry_edge(), Some(Direction::South));
        assert_eq!(Facing::West.entry_edge(), Some(Direction::East));
        assert_eq!(Facing::SouthEast.entry_edge(), None);
        for direction in Direction::ALL {
            let opposite = direction.outward().entry_edge().map(|edge| edge.index() ^ 2);
            assert_eq!(opposite, Some(direction.index()));
        }
    }

    #[test]
    fn facing_toward_uses_signs_only() {
        let origin = Point::new(10, 10);
        assert_eq!(Facing::toward(origin, Point::new(90, 10)), Facing::East);
        assert_eq!(Facing::toward(origin, Point::new(0, 0)), Facing::NorthWest);
        assert_eq!(Facing::toward(origin, origin), Facing::South);
    }

    #[test]
    fn scene_table_parses_chapters_and_exits() {
        let table: SceneTable = serde_json::from_str(
            r#"{
                "chapters": [{"number": 1, "character_shapes": "hero1.shp", "character_palette": "hero1.pal"}],
                "scenes": [{
                    "id": 4, "palette": "a.pal", "background": "a.bg", "shapes": "a.shp",
                    "script": "a.emc", "exits": {"east": 5}, "chapter": 1
                }]
            }"#,
        )
        .expect("parse table");

        let scene = table.scene(4).expect("scene 4");
        assert_eq!(scene.exits.target(Direction::East), Some(5));
        assert_eq!(scene.exits.target(Direction::North), None);
        assert_eq!(table.chapter(1).map(|c| c.character_shapes.as_str()), Some("hero1.shp"));
    }

    #[test]
    fn facing_names_parse_loosely() {
        assert_eq!(Facing::parse("north-east"), Some(Facing::NorthEast));
        assert_eq!(Facing::parse("W"), Some(Facing::West));
        assert_eq!(Facing::parse("up"), None);
    }
}
