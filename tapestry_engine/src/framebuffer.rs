use tapestry_assets::{Bitmap, Palette, RemapTable, TRANSPARENT};

use crate::compositor::{Canvas, ShapeDraw};
use crate::geometry::Rect;

/// Reference 8-bit canvas: a clean background page, a working page and the
/// displayed page. Commits copy working pixels to the display.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: i32,
    height: i32,
    backup: Vec<u8>,
    working: Vec<u8>,
    display: Vec<u8>,
    /// Colour remap tables indexed by palette layer; layer 0 is identity.
    layers: Vec<RemapTable>,
    palette: Palette,
    commits: Vec<Rect>,
    texts: Vec<String>,
}

impl FrameBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        let size = width as usize * height as usize;
        Self {
            width: width as i32,
            height: height as i32,
            backup: vec![0; size],
            working: vec![0; size],
            display: vec![0; size],
            layers: Vec::new(),
            palette: Palette::black(),
            commits: Vec::new(),
            texts: Vec::new(),
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn display(&self) -> &[u8] {
        &self.display
    }

    pub fn display_pixel(&self, x: i32, y: i32) -> Option<u8> {
        self.offset(x, y).map(|offset| self.display[offset])
    }

    pub fn working_pixel(&self, x: i32, y: i32) -> Option<u8> {
        self.offset(x, y).map(|offset| self.working[offset])
    }

    /// Installs the remap table used for `layer` (1-based; 0 stays identity).
    pub fn set_layer_table(&mut self, layer: u8, table: RemapTable) {
        if layer == 0 {
            return;
        }
        let index = layer as usize - 1;
        if self.layers.len() <= index {
            self.layers.resize(index + 1, RemapTable::identity());
        }
        self.layers[index] = table;
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn commits(&self) -> &[Rect] {
        &self.commits
    }

    pub fn take_commits(&mut self) -> Vec<Rect> {
        std::mem::take(&mut self.commits)
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    fn clip(&self, rect: Rect) -> Option<Rect> {
        rect.intersection(&self.bounds())
    }

    fn remap(&self, layer: u8, color: u8) -> u8 {
        match layer.checked_sub(1) {
            Some(index) => self
                .layers
                .get(index as usize)
                .map(|table| table.lookup(color))
                .unwrap_or(color),
            None => color,
        }
    }

    fn copy_rows(from: &[u8], to: &mut [u8], stride: usize, rect: Rect) {
        for y in rect.y..rect.bottom() {
            let start = y as usize * stride + rect.x as usize;
            let end = start + rect.width as usize;
            to[start..end].copy_from_slice(&from[start..end]);
        }
    }
}

impl Canvas for FrameBuffer {
    fn load_background(&mut self, background: &Bitmap) {
        for y in 0..self.height {
            for x in 0..self.width {
                let color = background.pixel(x as usize, y as usize).unwrap_or(0);
                let offset = y as usize * self.width as usize + x as usize;
                self.backup[offset] = color;
            }
        }
    }

    fn set_layer_tables(&mut self, tables: &[RemapTable]) {
        self.layers = tables.to_vec();
    }

    fn set_palette(&mut self, palette: &Palette) {
        self.palette = palette.clone();
    }

    fn restore(&mut self, rect: Rect) {
        if let Some(rect) = self.clip(rect) {
            Self::copy_rows(&self.backup, &mut self.working, self.width as usize, rect);
        }
    }

    /// Nearest-neighbour scaled blit that skips transparent pixels.
    fn draw_shape(&mut self, draw: &ShapeDraw<'_>) {
        if draw.width <= 0 || draw.height <= 0 || draw.shape.width == 0 || draw.shape.height == 0 {
            return;
        }
        let target = Rect::new(draw.origin.x, draw.origin.y, draw.width, draw.height);
        let Some(area) = target.intersection(&draw.clip).and_then(|r| self.clip(r)) else {
            return;
        };
        for y in area.y..area.bottom() {
            let src_y =
                ((y - target.y) as i64 * draw.shape.height as i64 / draw.height as i64) as usize;
            for x in area.x..area.right() {
                let src_x =
                    ((x - target.x) as i64 * draw.shape.width as i64 / draw.width as i64) as usize;
                let color = draw.shape.pixel(src_x, src_y);
                if color == TRANSPARENT {
                    continue;
                }
                let color = self.remap(draw.palette_layer, color);
                if let Some(offset) = self.offset(x, y) {
                    self.working[offset] = color;
                }
            }
        }
    }

    fn fill(&mut self, rect: Rect, color: u8) {
        let Some(rect) = self.clip(rect) else {
            return;
        };
        for y in rect.y..rect.bottom() {
            let start = y as usize * self.width as usize + rect.x as usize;
            self.working[start..start + rect.width as usize].fill(color);
        }
    }

    fn draw_text(&mut self, _area: Rect, text: &str) {
        self.texts.push(text.to_string());
    }

    fn commit(&mut self, rect: Rect) {
        if let Some(rect) = self.clip(rect) {
            Self::copy_rows(&self.working, &mut self.display, self.width as usize, rect);
            self.commits.push(rect);
        }
    }
}
