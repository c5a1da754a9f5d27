use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::AssetError;

pub const PALETTE_SIZE: usize = 256;

/// Colour index treated as see-through when drawing shapes.
pub const TRANSPARENT: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub colors: Vec<[u8; 3]>,
}

impl Palette {
    pub fn black() -> Self {
        Self {
            colors: vec![[0, 0, 0]; PALETTE_SIZE],
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), AssetError> {
        if self.colors.len() != PALETTE_SIZE {
            return Err(AssetError::Malformed {
                name: name.to_string(),
                reason: format!(
                    "expected {PALETTE_SIZE} colours, found {}",
                    self.colors.len()
                ),
            });
        }
        Ok(())
    }

    /// Copies the colours of `band` from `other` over this palette.
    pub fn merge_band(&mut self, other: &Palette, band: RangeInclusive<u8>) {
        for index in band {
            let index = index as usize;
            if let (Some(dest), Some(src)) = (self.colors.get_mut(index), other.colors.get(index)) {
                *dest = *src;
            }
        }
    }
}

/// Colour index substitution used to shade objects drawn on a palette layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapTable {
    pub map: Vec<u8>,
}

impl RemapTable {
    pub fn identity() -> Self {
        Self {
            map: (0..=255).collect(),
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), AssetError> {
        if self.map.len() != PALETTE_SIZE {
            return Err(AssetError::Malformed {
                name: name.to_string(),
                reason: format!(
                    "expected {PALETTE_SIZE} entries, found {}",
                    self.map.len()
                ),
            });
        }
        Ok(())
    }

    pub fn lookup(&self, color: u8) -> u8 {
        self.map.get(color as usize).copied().unwrap_or(color)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct PixelBlock {
    width: u16,
    height: u16,
    #[serde(default)]
    fill: u8,
    #[serde(default)]
    pixels: Option<Vec<u8>>,
}

impl PixelBlock {
    fn into_pixels(self, name: &str) -> Result<(u16, u16, Vec<u8>), AssetError> {
        let expected = self.width as usize * self.height as usize;
        let pixels = match self.pixels {
            Some(pixels) if pixels.len() == expected => pixels,
            Some(pixels) => {
                return Err(AssetError::Malformed {
                    name: name.to_string(),
                    reason: format!(
                        "{}x{} block carries {} pixels",
                        self.width,
                        self.height,
                        pixels.len()
                    ),
                });
            }
            None => vec![self.fill; expected],
        };
        Ok((self.width, self.height, pixels))
    }
}

impl Bitmap {
    pub fn filled(width: u16, height: u16, color: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    pub fn decode(name: &str, bytes: &[u8]) -> Result<Self, AssetError> {
        let block: PixelBlock =
            serde_json::from_slice(bytes).map_err(|source| AssetError::Decode {
                name: name.to_string(),
                source,
            })?;
        let (width, height, pixels) = block.into_pixels(name)?;
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width as usize || y >= self.height as usize {
            return None;
        }
        self.pixels.get(y * self.width as usize + x).copied()
    }
}

/// One frame of a shape atlas. Offsets are relative to the owning object's
/// anchor point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub width: u16,
    pub height: u16,
    pub x_offset: i16,
    pub y_offset: i16,
    pub pixels: Vec<u8>,
}

impl Shape {
    pub fn solid(width: u16, height: u16, x_offset: i16, y_offset: i16, color: u8) -> Self {
        Self {
            width,
            height,
            x_offset,
            y_offset,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        if x >= self.width as usize || y >= self.height as usize {
            return TRANSPARENT;
        }
        self.pixels
            .get(y * self.width as usize + x)
            .copied()
            .unwrap_or(TRANSPARENT)
    }
}

#[derive(Debug, Deserialize)]
struct ShapeEntry {
    #[serde(flatten)]
    block: PixelBlock,
    #[serde(default)]
    x_offset: i16,
    #[serde(default)]
    y_offset: i16,
}

#[derive(Debug, Deserialize)]
struct AtlasFile {
    shapes: Vec<ShapeEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShapeAtlas {
    pub name: String,
    pub shapes: Vec<Shape>,
}

impl ShapeAtlas {
    pub fn new(name: impl Into<String>, shapes: Vec<Shape>) -> Self {
        Self {
            name: name.into(),
            shapes,
        }
    }

    pub fn decode(name: &str, bytes: &[u8]) -> Result<Self, AssetError> {
        let file: AtlasFile = serde_json::from_slice(bytes).map_err(|source| AssetError::Decode {
            name: name.to_string(),
            source,
        })?;
        let mut shapes = Vec::with_capacity(file.shapes.len());
        for (index, entry) in file.shapes.into_iter().enumerate() {
            let label = format!("{name}#{index}");
            let (width, height, pixels) = entry.block.into_pixels(&label)?;
            shapes.push(Shape {
                width,
                height,
                x_offset: entry.x_offset,
                y_offset: entry.y_offset,
                pixels,
            });
        }
        Ok(Self {
            name: name.to_string(),
            shapes,
        })
    }

    pub fn get(&self, frame: u16) -> Option<&Shape> {
        self.shapes.get(frame as usize)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
