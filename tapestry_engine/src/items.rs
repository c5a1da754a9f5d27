use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Where items were dropped, per scene, so they reappear on re-entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemLedger {
    scenes: BTreeMap<u16, BTreeMap<u16, Point>>,
}

impl ItemLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `item` at `position` in `scene`, moving it out of any other
    /// scene it was in.
    pub fn place(&mut self, scene: u16, item: u16, position: Point) {
        for items in self.scenes.values_mut() {
            items.remove(&item);
        }
        self.scenes.retain(|_, items| !items.is_empty());
        self.scenes.entry(scene).or_default().insert(item, position);
    }

    pub fn remove(&mut self, scene: u16, item: u16) -> Option<Point> {
        let items = self.scenes.get_mut(&scene)?;
        let removed = items.remove(&item);
        if items.is_empty() {
            self.scenes.remove(&scene);
        }
        removed
    }

    pub fn in_scene(&self, scene: u16) -> impl Iterator<Item = (u16, Point)> + '_ {
        self.scenes
            .get(&scene)
            .into_iter()
            .flat_map(|items| items.iter().map(|(item, point)| (*item, *point)))
    }

    pub fn location(&self, item: u16) -> Option<(u16, Point)> {
        self.scenes.iter().find_map(|(scene, items)| {
            items.get(&item).map(|point| (*scene, *point))
        })
    }

    pub fn len(&self) -> usize {
        self.scenes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
