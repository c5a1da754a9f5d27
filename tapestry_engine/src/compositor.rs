//! Dirty-rectangle frame composition.
//!
//! A pass restores every region that changed since the previous pass from
//! the clean background, redraws the objects touching those regions in
//! Z-order and commits only the changed regions to the display.

use serde::Serialize;
use tapestry_assets::{Bitmap, Palette, RemapTable, Shape};

use crate::geometry::{Point, Rect};
use crate::registry::Registry;
use crate::shapes::ShapeBank;

/// Fill colour of the inventory panel strip.
pub const PANEL_COLOR: u8 = 0xf0;
/// Fill colour behind message banner text.
pub const BANNER_COLOR: u8 = 0xf1;
const BANNER_HEIGHT: i32 = 10;

/// Screen regions that must be restored and committed, kept disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirtyRects {
    #[serde(skip)]
    bounds: Rect,
    rects: Vec<Rect>,
}

impl DirtyRects {
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            rects: Vec::new(),
        }
    }

    /// Clips `rect` to the screen and merges it with every rectangle it
    /// overlaps.
    pub fn add(&mut self, rect: Rect) {
        let Some(mut merged) = rect.intersection(&self.bounds) else {
            return;
        };
        while let Some(position) = self.rects.iter().position(|r| r.intersects(&merged)) {
            let existing = self.rects.swap_remove(position);
            merged = merged.union(&existing);
        }
        self.rects.push(merged);
    }

    pub fn intersects(&self, rect: &Rect) -> bool {
        self.rects.iter().any(|dirty| dirty.intersects(rect))
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn area(&self) -> i64 {
        self.rects.iter().map(Rect::area).sum()
    }
}

/// One clipped shape blit.
#[derive(Debug, Clone, Copy)]
pub struct ShapeDraw<'a> {
    pub shape: &'a Shape,
    pub origin: Point,
    /// Destination size; differs from the shape size when scaled.
    pub width: i32,
    pub height: i32,
    pub palette_layer: u8,
    pub clip: Rect,
}

/// Display surface with a clean background copy and a working page.
pub trait Canvas {
    fn load_background(&mut self, background: &Bitmap);

    fn set_palette(&mut self, _palette: &Palette) {}

    /// Replaces the remap tables for palette layers 1 and up.
    fn set_layer_tables(&mut self, _tables: &[RemapTable]) {}

    /// Copies `rect` of the clean background onto the working page.
    fn restore(&mut self, rect: Rect);

    fn draw_shape(&mut self, draw: &ShapeDraw<'_>);

    fn fill(&mut self, rect: Rect, color: u8);

    fn draw_text(&mut self, _area: Rect, _text: &str) {}

    /// Presents `rect` of the working page.
    fn commit(&mut self, rect: Rect);
}

/// Full-screen decorations drawn above every animation object.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decorations<'a> {
    pub message: Option<&'a str>,
    pub panel_visible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComposeReport {
    pub forced: bool,
    pub dirty: DirtyRects,
    /// Pool indices redrawn, in draw order.
    pub drawn: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Compositor {
    screen: Rect,
    playfield: Rect,
    invalidated: bool,
    passes: u64,
}

impl Compositor {
    pub fn new(screen: Rect, playfield: Rect) -> Self {
        Self {
            screen,
            playfield,
            invalidated: true,
            passes: 0,
        }
    }

    /// Forces the next pass to redraw the whole screen.
    pub fn invalidate_all(&mut self) {
        self.invalidated = true;
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn panel_area(&self) -> Rect {
        Rect::new(
            self.screen.x,
            self.playfield.bottom(),
            self.screen.width,
            self.screen.bottom() - self.playfield.bottom(),
        )
    }

    pub fn banner_area(&self) -> Rect {
        Rect::new(
            self.playfield.x,
            self.playfield.y,
            self.playfield.width,
            BANNER_HEIGHT,
        )
    }

    pub fn compose(
        &mut self,
        force_all: bool,
        registry: &mut Registry,
        shapes: &ShapeBank,
        decorations: Decorations<'_>,
        canvas: &mut dyn Canvas,
    ) -> ComposeReport {
        let forced = force_all || self.invalidated;
        self.invalidated = false;
        self.passes += 1;

        let mut dirty = DirtyRects::new(self.screen);
        let erased = registry.take_erased();
        if forced {
            dirty.add(self.screen);
        } else {
            for rect in erased {
                dirty.add(rect);
            }
        }

        let order: Vec<usize> = registry.zorder().iter().collect();
        for &index in &order {
            let Some(object) = registry.get_mut(index) else {
                continue;
            };
            let previous = object.bounds();
            object.apply_metrics(object.source.and_then(|source| shapes.get(source)));
            if forced || object.needs_refresh || object.always_refresh {
                if let Some(last) = object.last_drawn {
                    dirty.add(last);
                }
                dirty.add(previous);
                dirty.add(object.bounds());
            }
        }

        for rect in dirty.rects() {
            canvas.restore(*rect);
        }

        let mut drawn = Vec::new();
        for &index in &order {
            let Some(object) = registry.get_mut(index) else {
                continue;
            };
            object.needs_refresh = false;
            let bounds = object.bounds();
            let shape = object.source.and_then(|source| shapes.get(source));
            object.last_drawn = Some(bounds);
            if !dirty.intersects(&bounds) {
                continue;
            }
            if let Some(shape) = shape {
                for clip in dirty.rects().iter().filter_map(|rect| rect.intersection(&bounds)) {
                    canvas.draw_shape(&ShapeDraw {
                        shape,
                        origin: object.draw_origin,
                        width: object.width,
                        height: object.height,
                        palette_layer: object.palette_layer,
                        clip,
                    });
                }
            }
            drawn.push(index);
        }

        if decorations.panel_visible {
            self.fill_clipped(canvas, &dirty, self.panel_area(), PANEL_COLOR);
        }
        if let Some(text) = decorations.message {
            let area = self.banner_area();
            if dirty.intersects(&area) {
                self.fill_clipped(canvas, &dirty, area, BANNER_COLOR);
                canvas.draw_text(area, text);
            }
        }

        for rect in dirty.rects() {
            canvas.commit(*rect);
        }

        ComposeReport {
            forced,
            dirty,
            drawn,
        }
    }

    fn fill_clipped(&self, canvas: &mut dyn Canvas, dirty: &DirtyRects, area: Rect, color: u8) {
        for clip in dirty.rects().iter().filter_map(|rect| rect.intersection(&area)) {
            canvas.fill(clip, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use tapestry_assets::ShapeAtlas;

    use super::*;
    use crate::framebuffer::FrameBuffer;
    use crate::registry::{AtlasKind, ObjectSetup, ShapeRef};

    fn scene_shapes() -> ShapeBank {
        let mut bank = ShapeBank::default();
        bank.set_atlas(
            AtlasKind::Scene,
            ShapeAtlas::new(
                "test.shp",
                vec![Shape::solid(8, 8, 0, -8, 5), Shape::solid(4, 4, 0, -4, 9)],
            ),
        );
        bank
    }

    fn place(registry: &mut Registry, index: usize, x: i32, y: i32, frame: u16) {
        let source = ShapeRef {
            atlas: AtlasKind::Scene,
            frame,
        };
        registry
            .populate(index, ObjectSetup::at(Point::new(x, y), Some(source)))
            .expect("populate");
        registry.enable(index).expect("enable");
    }

    fn plain_pass(
        compositor: &mut Compositor,
        force_all: bool,
        registry: &mut Registry,
        shapes: &ShapeBank,
        canvas: &mut FrameBuffer,
    ) -> ComposeReport {
        compositor.compose(force_all, registry, shapes, Decorations::default(), canvas)
    }

    fn setup() -> (Compositor, Registry, ShapeBank, FrameBuffer) {
        let screen = Rect::new(0, 0, 64, 48);
        let mut canvas = FrameBuffer::new(64, 48);
        canvas.load_background(&Bitmap::filled(64, 48, 1));
        (
            Compositor::new(screen, Rect::new(0, 0, 64, 32)),
            Registry::new(),
            scene_shapes(),
            canvas,
        )
    }

    #[test]
    fn dirty_rects_merge_and_clip() {
        let mut dirty = DirtyRects::new(Rect::new(0, 0, 100, 100));
        dirty.add(Rect::new(0, 0, 10, 10));
        dirty.add(Rect::new(50, 50, 10, 10));
        dirty.add(Rect::new(5, 5, 50, 10));
        dirty.add(Rect::new(95, 95, 20, 20));
        dirty.add(Rect::new(200, 0, 5, 5));
        let mut rects = dirty.rects().to_vec();
        rects.sort_by_key(|r| (r.x, r.y));
        assert_eq!(
            rects,
            vec![
                Rect::new(0, 0, 55, 15),
                Rect::new(50, 50, 10, 10),
                Rect::new(95, 95, 5, 5),
            ]
        );
    }

    #[test]
    fn second_pass_without_changes_is_empty() {
        let (mut compositor, mut registry, shapes, mut canvas) = setup();
        place(&mut registry, 1, 10, 20, 0);
        place(&mut registry, 2, 30, 24, 1);

        let first = plain_pass(&mut compositor, false, &mut registry, &shapes, &mut canvas);
        assert!(first.forced);
        assert_eq!(first.drawn, vec![1, 2]);
        let snapshot = canvas.display().to_vec();

        let second = plain_pass(&mut compositor, false, &mut registry, &shapes, &mut canvas);
        assert!(!second.forced);
        assert!(second.dirty.is_empty());
        assert!(second.drawn.is_empty());
        assert_eq!(canvas.display(), snapshot.as_slice());
    }

    #[test]
    fn moved_object_dirties_old_and_new_bounds_only() {
        let (mut compositor, mut registry, shapes, mut canvas) = setup();
        place(&mut registry, 1, 10, 20, 0);
        plain_pass(&mut compositor, true, &mut registry, &shapes, &mut canvas);
        canvas.take_commits();

        registry.move_to(1, Point::new(40, 20)).expect("move");
        let report = plain_pass(&mut compositor, false, &mut registry, &shapes, &mut canvas);
        let mut rects = report.dirty.rects().to_vec();
        rects.sort_by_key(|r| r.x);
        assert_eq!(rects, vec![Rect::new(10, 12, 8, 8), Rect::new(40, 12, 8, 8)]);
        assert_eq!(canvas.take_commits().len(), 2);
        assert_eq!(canvas.display_pixel(12, 14), Some(1));
        assert_eq!(canvas.display_pixel(42, 14), Some(5));
    }

    #[test]
    fn overlapping_objects_keep_painter_order() {
        let (mut compositor, mut registry, shapes, mut canvas) = setup();
        place(&mut registry, 1, 10, 20, 0);
        place(&mut registry, 2, 12, 22, 1);
        plain_pass(&mut compositor, true, &mut registry, &shapes, &mut canvas);

        registry.set_frame(1, 0).expect("same frame");
        registry.get_mut(1).expect("slot").needs_refresh = true;
        let report = plain_pass(&mut compositor, false, &mut registry, &shapes, &mut canvas);
        assert_eq!(report.drawn, vec![1, 2]);
        assert_eq!(canvas.display_pixel(13, 19), Some(9));
    }

    #[test]
    fn disabled_objects_are_erased() {
        let (mut compositor, mut registry, shapes, mut canvas) = setup();
        place(&mut registry, 1, 10, 20, 0);
        plain_pass(&mut compositor, true, &mut registry, &shapes, &mut canvas);
        registry.disable(1).expect("disable");
        let report = plain_pass(&mut compositor, false, &mut registry, &shapes, &mut canvas);
        assert_eq!(report.dirty.rects(), &[Rect::new(10, 12, 8, 8)]);
        assert_eq!(canvas.display_pixel(12, 14), Some(1));
    }

    #[test]
    fn panel_and_banner_draw_above_objects() {
        let (mut compositor, mut registry, shapes, mut canvas) = setup();
        let decorations = Decorations {
            message: Some("hello"),
            panel_visible: true,
        };
        compositor.compose(true, &mut registry, &shapes, decorations, &mut canvas);
        assert_eq!(canvas.display_pixel(0, 40), Some(PANEL_COLOR));
        assert_eq!(canvas.display_pixel(0, 0), Some(BANNER_COLOR));
        assert_eq!(canvas.texts(), &["hello".to_string()]);
    }
}
