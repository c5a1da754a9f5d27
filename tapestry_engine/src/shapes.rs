use tapestry_assets::{Shape, ShapeAtlas};

use crate::registry::{AtlasKind, ShapeRef};

/// The three atlases an animation object can draw from.
#[derive(Debug, Clone)]
pub struct ShapeBank {
    scene: ShapeAtlas,
    character: ShapeAtlas,
    items: ShapeAtlas,
}

impl Default for ShapeBank {
    fn default() -> Self {
        Self {
            scene: ShapeAtlas::new("", Vec::new()),
            character: ShapeAtlas::new("", Vec::new()),
            items: ShapeAtlas::new("", Vec::new()),
        }
    }
}

impl ShapeBank {
    pub fn get(&self, shape: ShapeRef) -> Option<&Shape> {
        self.atlas(shape.atlas).get(shape.frame)
    }

    pub fn atlas(&self, kind: AtlasKind) -> &ShapeAtlas {
        match kind {
            AtlasKind::Scene => &self.scene,
            AtlasKind::Character => &self.character,
            AtlasKind::Items => &self.items,
        }
    }

    pub fn set_atlas(&mut self, kind: AtlasKind, atlas: ShapeAtlas) {
        match kind {
            AtlasKind::Scene => self.scene = atlas,
            AtlasKind::Character => self.character = atlas,
            AtlasKind::Items => self.items = atlas,
        }
    }

    /// Drops the scene's shapes; character and item atlases outlive scenes.
    pub fn free_scene(&mut self) {
        self.scene = ShapeAtlas::new("", Vec::new());
    }
}
