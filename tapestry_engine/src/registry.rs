use serde::Serialize;
use tapestry_assets::Shape;

use crate::error::ScriptFault;
use crate::geometry::{Point, Rect};
use crate::overlays::OVERLAY_CAPACITY;
use crate::zorder::ZOrderList;

pub const CHARACTER_SLOT: usize = 0;
pub const FIRST_OVERLAY_SLOT: usize = 1;
pub const FIRST_ITEM_SLOT: usize = FIRST_OVERLAY_SLOT + OVERLAY_CAPACITY;
pub const ITEM_CAPACITY: usize = 50;
pub const POOL_CAPACITY: usize = FIRST_ITEM_SLOT + ITEM_CAPACITY;

/// Fixed-point scale where 256 draws a shape at its native size.
pub const UNIT_SCALE: u16 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Character,
    Overlay,
    Item,
}

impl ObjectKind {
    pub fn for_slot(index: usize) -> ObjectKind {
        match index {
            CHARACTER_SLOT => ObjectKind::Character,
            i if i < FIRST_ITEM_SLOT => ObjectKind::Overlay,
            _ => ObjectKind::Item,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AtlasKind {
    Scene,
    Character,
    Items,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShapeRef {
    pub atlas: AtlasKind,
    pub frame: u16,
}

pub fn overlay_object(slot: usize) -> usize {
    FIRST_OVERLAY_SLOT + slot
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationObject {
    pub index: usize,
    pub kind: ObjectKind,
    pub anchor: Point,
    pub draw_origin: Point,
    pub width: i32,
    pub height: i32,
    pub inflate_x: i32,
    pub inflate_y: i32,
    pub draw_offset: Point,
    pub enabled: bool,
    pub needs_refresh: bool,
    pub always_refresh: bool,
    pub source: Option<ShapeRef>,
    pub palette_layer: u8,
    pub scale: u16,
    pub overlay: Option<usize>,
    pub item: Option<u16>,
    /// Rectangle covered the last time the compositor drew this object.
    pub last_drawn: Option<Rect>,
}

impl AnimationObject {
    fn vacant(index: usize) -> Self {
        Self {
            index,
            kind: ObjectKind::for_slot(index),
            anchor: Point::default(),
            draw_origin: Point::default(),
            width: 0,
            height: 0,
            inflate_x: 0,
            inflate_y: 0,
            draw_offset: Point::default(),
            enabled: false,
            needs_refresh: false,
            always_refresh: false,
            source: None,
            palette_layer: 0,
            scale: UNIT_SCALE,
            overlay: None,
            item: None,
            last_drawn: None,
        }
    }

    /// Screen area the object occupies, including its inflation margins.
    pub fn bounds(&self) -> Rect {
        Rect::new(self.draw_origin.x, self.draw_origin.y, self.width, self.height)
            .inflate(self.inflate_x, self.inflate_y)
    }

    /// Recomputes draw origin and size from the current frame's metrics.
    pub fn apply_metrics(&mut self, shape: Option<&Shape>) {
        let scale = self.scale as i32;
        let (dx, dy) = match shape {
            Some(shape) => {
                self.width = (shape.width as i32 * scale) >> 8;
                self.height = (shape.height as i32 * scale) >> 8;
                (
                    (shape.x_offset as i32 * scale) >> 8,
                    (shape.y_offset as i32 * scale) >> 8,
                )
            }
            None => (0, 0),
        };
        self.draw_origin = self
            .anchor
            .offset(dx + self.draw_offset.x, dy + self.draw_offset.y);
    }
}

/// Everything the registry needs to place a pool slot.
#[derive(Debug, Clone)]
pub struct ObjectSetup {
    pub anchor: Point,
    pub draw_offset: Point,
    pub width: i32,
    pub height: i32,
    pub inflate_x: i32,
    pub inflate_y: i32,
    pub source: Option<ShapeRef>,
    pub overlay: Option<usize>,
    pub item: Option<u16>,
    pub always_refresh: bool,
}

impl ObjectSetup {
    pub fn at(anchor: Point, source: Option<ShapeRef>) -> Self {
        Self {
            anchor,
            draw_offset: Point::default(),
            width: 0,
            height: 0,
            inflate_x: 0,
            inflate_y: 0,
            source,
            overlay: None,
            item: None,
            always_refresh: false,
        }
    }
}

/// Animation pool plus the draw-order list over its enabled members.
#[derive(Debug, Clone)]
pub struct Registry {
    objects: Vec<AnimationObject>,
    zorder: ZOrderList,
    erased: Vec<Rect>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            objects: (0..POOL_CAPACITY).map(AnimationObject::vacant).collect(),
            zorder: ZOrderList::new(POOL_CAPACITY),
            erased: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.objects.len()
    }

    pub fn get(&self, index: usize) -> Option<&AnimationObject> {
        self.objects.get(index)
    }

    /// Mutable access for fields that do not affect draw order. Anchor
    /// changes must go through [`Registry::move_to`].
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut AnimationObject> {
        self.objects.get_mut(index)
    }

    fn slot(&mut self, index: usize) -> Result<&mut AnimationObject, ScriptFault> {
        self.objects
            .get_mut(index)
            .ok_or(ScriptFault::InvalidObject(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnimationObject> {
        self.objects.iter()
    }

    pub fn zorder(&self) -> &ZOrderList {
        &self.zorder
    }

    pub fn iter_zorder(&self) -> impl Iterator<Item = &AnimationObject> + '_ {
        self.zorder.iter().map(move |index| &self.objects[index])
    }

    /// Returns every slot to its vacant state for the next scene.
    pub fn reset(&mut self) {
        for (index, object) in self.objects.iter_mut().enumerate() {
            *object = AnimationObject::vacant(index);
        }
        self.zorder.clear();
        self.erased.clear();
    }

    /// Configures a slot without enabling it. An enabled slot is unlinked
    /// first so the new anchor cannot break the ordering.
    pub fn populate(&mut self, index: usize, setup: ObjectSetup) -> Result<(), ScriptFault> {
        let was_enabled = self.slot(index)?.enabled;
        if was_enabled {
            self.disable(index)?;
        }
        let object = self.slot(index)?;
        object.anchor = setup.anchor;
        object.draw_offset = setup.draw_offset;
        object.draw_origin = setup.anchor.offset(setup.draw_offset.x, setup.draw_offset.y);
        object.width = setup.width;
        object.height = setup.height;
        object.inflate_x = setup.inflate_x;
        object.inflate_y = setup.inflate_y;
        object.source = setup.source;
        object.overlay = setup.overlay;
        object.item = setup.item;
        object.always_refresh = setup.always_refresh;
        object.scale = UNIT_SCALE;
        object.palette_layer = 0;
        if was_enabled {
            self.enable(index)?;
        }
        Ok(())
    }

    pub fn enable(&mut self, index: usize) -> Result<(), ScriptFault> {
        let object = self.slot(index)?;
        object.needs_refresh = true;
        if object.enabled {
            return Ok(());
        }
        object.enabled = true;
        let objects = &self.objects;
        self.zorder
            .insert_sorted(index, |slot| objects[slot].anchor.y);
        Ok(())
    }

    /// Drops the object from the draw order and queues its last drawn area
    /// for erasure. The slot itself stays valid.
    pub fn disable(&mut self, index: usize) -> Result<(), ScriptFault> {
        let object = self.slot(index)?;
        if !object.enabled {
            return Ok(());
        }
        object.enabled = false;
        object.needs_refresh = false;
        let erased = object.last_drawn.take();
        self.zorder.remove(index);
        if let Some(rect) = erased {
            self.erased.push(rect);
        }
        Ok(())
    }

    pub fn move_to(&mut self, index: usize, anchor: Point) -> Result<(), ScriptFault> {
        let object = self.slot(index)?;
        if object.anchor == anchor {
            return Ok(());
        }
        let resort = object.enabled && object.anchor.y != anchor.y;
        object.anchor = anchor;
        object.needs_refresh = true;
        if resort {
            self.zorder.remove(index);
            let objects = &self.objects;
            self.zorder
                .insert_sorted(index, |slot| objects[slot].anchor.y);
        }
        Ok(())
    }

    pub fn set_frame(&mut self, index: usize, frame: u16) -> Result<(), ScriptFault> {
        let object = self.slot(index)?;
        let source = object
            .source
            .as_mut()
            .ok_or(ScriptFault::NoShapeSource(index))?;
        if source.frame != frame {
            source.frame = frame;
            object.needs_refresh = true;
        }
        Ok(())
    }

    pub fn set_scale(&mut self, index: usize, scale: u16) -> Result<(), ScriptFault> {
        let object = self.slot(index)?;
        if object.scale != scale {
            object.scale = scale;
            object.needs_refresh = true;
        }
        Ok(())
    }

    pub fn set_palette_layer(&mut self, index: usize, layer: u8) -> Result<(), ScriptFault> {
        let object = self.slot(index)?;
        if object.palette_layer != layer {
            object.palette_layer = layer;
            object.needs_refresh = true;
        }
        Ok(())
    }

    /// Rebuilds the draw order from scratch over all enabled slots.
    pub fn rebuild_zorder(&mut self) {
        self.zorder.clear();
        let objects = &self.objects;
        for object in objects.iter().filter(|object| object.enabled) {
            self.zorder
                .insert_sorted(object.index, |slot| objects[slot].anchor.y);
        }
    }

    pub fn flag_all(&mut self) {
        for object in self.objects.iter_mut().filter(|object| object.enabled) {
            object.needs_refresh = true;
        }
    }

    pub fn take_erased(&mut self) -> Vec<Rect> {
        std::mem::take(&mut self.erased)
    }

    pub fn has_pending_erase(&self) -> bool {
        !self.erased.is_empty()
    }

    pub fn free_item_slot(&self) -> Option<usize> {
        self.objects[FIRST_ITEM_SLOT..]
            .iter()
            .find(|object| !object.enabled && object.item.is_none())
            .map(|object| object.index)
    }

    pub fn item_slot(&self, item: u16) -> Option<usize> {
        self.objects[FIRST_ITEM_SLOT..]
            .iter()
            .find(|object| object.item == Some(item))
            .map(|object| object.index)
    }

    /// Vacates an item slot so it can be handed out again.
    pub fn release_item(&mut self, index: usize) -> Result<(), ScriptFault> {
        self.disable(index)?;
        let object = self.slot(index)?;
        *object = AnimationObject::vacant(index);
        Ok(())
    }

    /// Verifies ordering and that exactly the enabled slots are linked.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = vec![false; self.objects.len()];
        let mut last_y = i32::MIN;
        for index in self.zorder.iter() {
            let object = &self.objects[index];
            if seen[index] {
                return Err(format!("object {index} linked twice"));
            }
            seen[index] = true;
            if !object.enabled {
                return Err(format!("disabled object {index} is linked"));
            }
            if object.anchor.y < last_y {
                return Err(format!(
                    "object {index} at y={} follows y={last_y}",
                    object.anchor.y
                ));
            }
            last_y = object.anchor.y;
        }
        if let Some(object) = self
            .objects
            .iter()
            .find(|object| object.enabled && !seen[object.index])
        {
            return Err(format!("enabled object {} is not linked", object.index));
        }
        if self.zorder.len() != seen.iter().filter(|flag| **flag).count() {
            return Err("list length disagrees with linked nodes".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(registry: &mut Registry, index: usize, y: i32) {
        registry
            .populate(index, ObjectSetup::at(Point::new(10, y), None))
            .expect("populate");
        registry.enable(index).expect("enable");
    }

    fn ys(registry: &Registry) -> Vec<i32> {
        registry.iter_zorder().map(|object| object.anchor.y).collect()
    }

    #[test]
    fn pool_layout_is_fixed() {
        assert_eq!(POOL_CAPACITY, 67);
        assert_eq!(FIRST_ITEM_SLOT, 17);
        let registry = Registry::new();
        assert_eq!(registry.capacity(), POOL_CAPACITY);
        assert_eq!(registry.get(0).map(|o| o.kind), Some(ObjectKind::Character));
        assert_eq!(registry.get(16).map(|o| o.kind), Some(ObjectKind::Overlay));
        assert_eq!(registry.get(17).map(|o| o.kind), Some(ObjectKind::Item));
        assert!(registry.get(POOL_CAPACITY).is_none());
    }

    #[test]
    fn fourth_object_lands_in_sorted_position() {
        let mut registry = Registry::new();
        place(&mut registry, 1, 50);
        place(&mut registry, 2, 10);
        place(&mut registry, 3, 30);
        place(&mut registry, 4, 20);
        assert_eq!(ys(&registry), vec![10, 20, 30, 50]);
        registry.check_invariants().expect("sorted");
    }

    #[test]
    fn moving_reorders_and_disable_queues_erase() {
        let mut registry = Registry::new();
        place(&mut registry, 1, 10);
        place(&mut registry, 2, 20);
        registry.get_mut(1).expect("slot").last_drawn = Some(Rect::new(0, 0, 4, 4));

        registry.move_to(1, Point::new(10, 40)).expect("move");
        assert_eq!(
            registry.iter_zorder().map(|o| o.index).collect::<Vec<_>>(),
            vec![2, 1]
        );

        registry.disable(1).expect("disable");
        assert!(!registry.zorder().contains(1));
        assert_eq!(registry.take_erased(), vec![Rect::new(0, 0, 4, 4)]);
        registry.check_invariants().expect("consistent");
    }

    #[test]
    fn invalid_indices_fault_without_touching_the_list() {
        let mut registry = Registry::new();
        place(&mut registry, 1, 10);
        assert_eq!(
            registry.move_to(POOL_CAPACITY, Point::new(0, 0)),
            Err(ScriptFault::InvalidObject(POOL_CAPACITY))
        );
        assert_eq!(registry.set_frame(1, 3), Err(ScriptFault::NoShapeSource(1)));
        assert_eq!(registry.zorder().len(), 1);
    }

    #[test]
    fn metrics_follow_scale_and_offsets() {
        let mut registry = Registry::new();
        let source = ShapeRef {
            atlas: AtlasKind::Character,
            frame: 0,
        };
        registry
            .populate(0, ObjectSetup::at(Point::new(100, 80), Some(source)))
            .expect("populate");
        registry.set_scale(0, 128).expect("scale");
        let shape = Shape::solid(20, 40, -10, -40, 3);
        let object = registry.get_mut(0).expect("character");
        object.apply_metrics(Some(&shape));
        assert_eq!((object.width, object.height), (10, 20));
        assert_eq!(object.draw_origin, Point::new(95, 60));
    }

    #[test]
    fn item_slots_are_reused_after_release() {
        let mut registry = Registry::new();
        let slot = registry.free_item_slot().expect("free slot");
        assert_eq!(slot, FIRST_ITEM_SLOT);
        let mut setup = ObjectSetup::at(Point::new(5, 5), None);
        setup.item = Some(9);
        registry.populate(slot, setup).expect("populate");
        registry.enable(slot).expect("enable");
        assert_eq!(registry.item_slot(9), Some(slot));
        assert_eq!(registry.free_item_slot(), Some(slot + 1));

        registry.release_item(slot).expect("release");
        assert_eq!(registry.item_slot(9), None);
        assert_eq!(registry.free_item_slot(), Some(slot));
    }
}
