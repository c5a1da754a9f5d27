use tapestry_assets::{AssetSource, Bitmap, Palette, ProgramImage, RemapTable, ShapeAtlas};

use crate::error::{EngineError, ResourceKind};
use crate::scene::SceneTable;

/// Everything the scene core loads by name. Failures carry the resource
/// kind so the host can report which asset broke the session.
pub trait ResourceProvider {
    fn load_palette(&self, name: &str) -> Result<Palette, EngineError>;
    fn load_bitmap(&self, name: &str) -> Result<Bitmap, EngineError>;
    fn load_shape_atlas(&self, name: &str) -> Result<ShapeAtlas, EngineError>;
    fn load_script_program(&self, name: &str) -> Result<ProgramImage, EngineError>;
    fn load_scene_table(&self, name: &str) -> Result<SceneTable, EngineError>;
    fn load_remap_table(&self, name: &str) -> Result<RemapTable, EngineError>;
}

impl<S: AssetSource + ?Sized> ResourceProvider for S {
    fn load_palette(&self, name: &str) -> Result<Palette, EngineError> {
        AssetSource::load_palette(self, name)
            .map_err(EngineError::load(ResourceKind::Palette, name))
    }

    fn load_bitmap(&self, name: &str) -> Result<Bitmap, EngineError> {
        AssetSource::load_bitmap(self, name).map_err(EngineError::load(ResourceKind::Bitmap, name))
    }

    fn load_shape_atlas(&self, name: &str) -> Result<ShapeAtlas, EngineError> {
        AssetSource::load_shape_atlas(self, name)
            .map_err(EngineError::load(ResourceKind::ShapeAtlas, name))
    }

    fn load_script_program(&self, name: &str) -> Result<ProgramImage, EngineError> {
        self.load_program(name)
            .map_err(EngineError::load(ResourceKind::ScriptProgram, name))
    }

    fn load_scene_table(&self, name: &str) -> Result<SceneTable, EngineError> {
        tapestry_assets::load_json(self, name)
            .map_err(EngineError::load(ResourceKind::SceneTable, name))
    }

    fn load_remap_table(&self, name: &str) -> Result<RemapTable, EngineError> {
        AssetSource::load_remap_table(self, name)
            .map_err(EngineError::load(ResourceKind::RemapTable, name))
    }
}
