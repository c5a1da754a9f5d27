//! Asset access for the Tapestry scene core.
//!
//! Scene art, shape atlases and script listings are stored as small JSON
//! documents addressed by their legacy resource names. Lookups ignore ASCII
//! case, matching how the original resource archives were searched.

pub mod memory;
pub mod pack;
pub mod pixels;

pub use memory::MemoryPack;
pub use pack::AssetPack;
pub use pixels::{Bitmap, PALETTE_SIZE, Palette, RemapTable, Shape, ShapeAtlas, TRANSPARENT};

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset `{0}` not found")]
    NotFound(String),
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decoding `{name}`: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("encoding `{name}`: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("`{name}` is malformed: {reason}")]
    Malformed { name: String, reason: String },
}

/// Raw script program bytes; the interpreter owns the decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Anything that can hand out asset bytes by resource name.
pub trait AssetSource {
    fn read(&self, name: &str) -> Result<Vec<u8>, AssetError>;

    fn contains(&self, name: &str) -> bool;

    fn load_program(&self, name: &str) -> Result<ProgramImage, AssetError> {
        Ok(ProgramImage {
            name: name.to_string(),
            bytes: self.read(name)?,
        })
    }

    fn load_palette(&self, name: &str) -> Result<Palette, AssetError> {
        let palette: Palette = load_json(self, name)?;
        palette.validate(name)?;
        Ok(palette)
    }

    fn load_remap_table(&self, name: &str) -> Result<RemapTable, AssetError> {
        let table: RemapTable = load_json(self, name)?;
        table.validate(name)?;
        Ok(table)
    }

    fn load_bitmap(&self, name: &str) -> Result<Bitmap, AssetError> {
        Bitmap::decode(name, &self.read(name)?)
    }

    fn load_shape_atlas(&self, name: &str) -> Result<ShapeAtlas, AssetError> {
        ShapeAtlas::decode(name, &self.read(name)?)
    }
}

/// Reads `name` from `source` and decodes it as JSON.
pub fn load_json<T, S>(source: &S, name: &str) -> Result<T, AssetError>
where
    T: DeserializeOwned,
    S: AssetSource + ?Sized,
{
    let bytes = source.read(name)?;
    serde_json::from_slice(&bytes).map_err(|source| AssetError::Decode {
        name: name.to_string(),
        source,
    })
}

pub(crate) fn normalize_name(name: &str) -> String {
    name.replace('\\', "/").to_ascii_lowercase()
}
