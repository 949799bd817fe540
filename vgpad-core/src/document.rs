//! # Shape document
//!
//! The ordered set of committed shapes. Order is z-order, back to front.
//!
//! Counters:
//! * `change_count` goes up by exactly one for every mutating call, batches included. Readers compare it to
//!   decide whether to save or redraw.
//! * `draw_count` goes up once per finished render pass, and can be bumped through a shared reference since
//!   render passes run against published, immutable documents.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    factory::ShapeFactory,
    geom::{Point, Rect},
    shape::{HitResult, Shape, ShapeID, INVALID_SHAPE_ID},
    storage::{LoadError, Storage},
};

#[derive(Debug)]
pub struct ShapeDocument {
    shapes: Vec<Shape>,
    /// Position of each id within `shapes`.
    index: hashbrown::HashMap<ShapeID, usize>,
    /// Next id to hand out. Never goes down, so ids are never reused.
    next_id: ShapeID,
    change_count: u64,
    draw_count: AtomicU64,
}
impl Default for ShapeDocument {
    fn default() -> Self {
        Self {
            shapes: Vec::new(),
            index: hashbrown::HashMap::new(),
            next_id: 1,
            change_count: 0,
            draw_count: AtomicU64::new(0),
        }
    }
}
impl Clone for ShapeDocument {
    fn clone(&self) -> Self {
        Self {
            shapes: self.shapes.clone(),
            index: self.index.clone(),
            next_id: self.next_id,
            change_count: self.change_count,
            draw_count: AtomicU64::new(self.draw_count()),
        }
    }
}
/// Content equality. Counters are bookkeeping, not content, and are ignored.
impl PartialEq for ShapeDocument {
    fn eq(&self, other: &Self) -> bool {
        self.shapes == other.shapes
    }
}

// Public methods for readers
impl ShapeDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
    #[must_use]
    pub fn change_count(&self) -> u64 {
        self.change_count
    }
    #[must_use]
    pub fn draw_count(&self) -> u64 {
        self.draw_count.load(Ordering::Acquire)
    }
    /// Record a finished render pass.
    pub fn mark_drawn(&self) -> u64 {
        self.draw_count.fetch_add(1, Ordering::AcqRel) + 1
    }
    /// Continue counting render passes from an older version of this document.
    pub(crate) fn carry_draw_count(&self, from: &ShapeDocument) {
        self.draw_count.fetch_max(from.draw_count(), Ordering::AcqRel);
    }
    /// The id the next added shape will receive, if it doesn't bring its own.
    #[must_use]
    pub fn next_id(&self) -> ShapeID {
        self.next_id
    }
    /// Shapes back to front.
    pub fn iter(&self) -> std::slice::Iter<'_, Shape> {
        self.shapes.iter()
    }
    #[must_use]
    pub fn get(&self, id: ShapeID) -> Option<&Shape> {
        self.shapes.get(*self.index.get(&id)?)
    }
    #[must_use]
    pub fn contains(&self, id: ShapeID) -> bool {
        self.index.contains_key(&id)
    }
    /// Union of the extents of every visible shape. [`Rect::NULL`] if there are none.
    #[must_use]
    pub fn bounding_box(&self) -> Rect {
        self.shapes
            .iter()
            .filter(|shape| !shape.is_hidden())
            .fold(Rect::NULL, |rect, shape| rect.union(shape.extent()))
    }
    /// Extent of a single shape, hidden or not.
    #[must_use]
    pub fn bounding_box_of(&self, id: ShapeID) -> Option<Rect> {
        self.get(id).map(Shape::extent)
    }
    /// The visible shape closest to `pt`, if any lies within `tolerance`. Ties go to the topmost shape.
    #[must_use]
    pub fn find_by_point(&self, pt: Point, tolerance: f32) -> Option<(ShapeID, HitResult)> {
        let mut best: Option<(ShapeID, HitResult)> = None;
        // Front to back, so strictly-less keeps the topmost on ties.
        for shape in self.shapes.iter().rev() {
            if shape.is_hidden() || !shape.extent().inflate(tolerance).contains_point(pt) {
                continue;
            }
            let hit = shape.hit_test(pt, tolerance);
            if hit.distance <= tolerance
                && best.map_or(true, |(_, best)| hit.distance < best.distance)
            {
                best = Some((shape.id(), hit));
            }
        }
        best
    }
    /// Ids of visible shapes touching `rect`, back to front.
    #[must_use]
    pub fn shapes_in_box(&self, rect: &Rect) -> smallvec::SmallVec<[ShapeID; 8]> {
        self.shapes
            .iter()
            .filter(|shape| !shape.is_hidden() && shape.hit_test_box(rect))
            .map(Shape::id)
            .collect()
    }
}

// Mutators. Each bumps `change_count` exactly once.
impl ShapeDocument {
    fn reindex(&mut self) {
        self.index.clear();
        self.index
            .extend(self.shapes.iter().enumerate().map(|(pos, shape)| (shape.id(), pos)));
    }
    /// Place a shape at the top without touching the counter.
    fn push(&mut self, mut shape: Shape) -> ShapeID {
        let id = shape.id();
        // Keep a caller-provided id if it's still free, otherwise assign one.
        let id = if id == INVALID_SHAPE_ID || id == ShapeID::MAX || self.index.contains_key(&id) {
            if self.next_id == ShapeID::MAX {
                log::error!("shape ids exhausted, dropping shape");
                return INVALID_SHAPE_ID;
            }
            let id = self.next_id;
            shape.set_id(id);
            id
        } else {
            id
        };
        // id < ShapeID::MAX here.
        self.next_id = self.next_id.max(id + 1);
        self.index.insert(id, self.shapes.len());
        self.shapes.push(shape);
        id
    }
    /// Add a shape at the top. Returns its id, which differs from the shape's own if that was unset or taken.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeID {
        let id = self.push(shape);
        self.change_count += 1;
        log::trace!("added shape {id}");
        id
    }
    /// Add many shapes as one change.
    pub fn add_shapes(
        &mut self,
        shapes: impl IntoIterator<Item = Shape>,
    ) -> smallvec::SmallVec<[ShapeID; 4]> {
        let ids = shapes.into_iter().map(|shape| self.push(shape)).collect();
        self.change_count += 1;
        ids
    }
    /// Remove a shape by id, returning it.
    pub fn remove_shape(&mut self, id: ShapeID) -> Option<Shape> {
        let pos = self.index.remove(&id)?;
        let shape = self.shapes.remove(pos);
        self.reindex();
        self.change_count += 1;
        log::trace!("removed shape {id}");
        Some(shape)
    }
    /// Remove many shapes as one change. Returns how many were found.
    pub fn remove_shapes(&mut self, ids: &[ShapeID]) -> usize {
        let before = self.shapes.len();
        self.shapes.retain(|shape| !ids.contains(&shape.id()));
        self.reindex();
        self.change_count += 1;
        before - self.shapes.len()
    }
    /// Replace the shape with the same id in place, keeping its z-order. False if no such shape exists.
    pub fn update_shape(&mut self, shape: Shape) -> bool {
        let Some(&pos) = self.index.get(&shape.id()) else {
            return false;
        };
        self.shapes[pos] = shape;
        self.change_count += 1;
        true
    }
    /// Commit a set of edited and new shapes as one change: shapes whose id exists replace the existing
    /// one in place, the rest are added on top. Returns how many were replaced, and the ids of those added.
    pub fn merge_shapes(
        &mut self,
        shapes: impl IntoIterator<Item = Shape>,
    ) -> (usize, smallvec::SmallVec<[ShapeID; 4]>) {
        let mut replaced = 0;
        let mut appended = smallvec::SmallVec::new();
        for shape in shapes {
            if let Some(&pos) = self.index.get(&shape.id()) {
                self.shapes[pos] = shape;
                replaced += 1;
            } else {
                let id = self.push(shape);
                if id != INVALID_SHAPE_ID {
                    appended.push(id);
                }
            }
        }
        self.change_count += 1;
        (replaced, appended)
    }
    /// Edit one shape in place. Returns the closure's result, or None if the shape doesn't exist.
    pub fn modify<T>(&mut self, id: ShapeID, f: impl FnOnce(&mut Shape) -> T) -> Option<T> {
        let pos = *self.index.get(&id)?;
        let shape = &mut self.shapes[pos];
        let result = f(shape);
        // Identity is owned by the document.
        shape.set_id(id);
        self.change_count += 1;
        Some(result)
    }
    /// Remove every shape, locked or not.
    pub fn clear(&mut self) {
        self.shapes.clear();
        self.index.clear();
        self.change_count += 1;
    }
    /// Take the contents of `other` wholesale. Counters continue from `self`'s, and `next_id` never goes
    /// backwards, so ids handed out before the swap won't be reused.
    pub fn replace_contents(&mut self, other: ShapeDocument) {
        let next_id = self.next_id.max(other.next_id);
        self.shapes = other.shapes;
        self.index = other.index;
        self.next_id = next_id;
        self.change_count += 1;
    }
}

// Persistence
impl ShapeDocument {
    /// Write every shape into the current storage node.
    pub fn save(&self, s: &mut dyn Storage) {
        s.write_int("nextId", i64::from(self.next_id));
        s.write_int("count", i64::try_from(self.shapes.len()).unwrap_or(i64::MAX));
        for (i, shape) in self.shapes.iter().enumerate() {
            s.begin_write_node("shapes", Some(i));
            shape.save(s);
            s.end_node();
        }
    }
    /// Read a whole document from the current storage node. Either every shape loads, or nothing is returned.
    pub fn load(factory: &ShapeFactory, s: &mut dyn Storage) -> Result<Self, LoadError> {
        use az::CheckedAs;
        let next_id = s.read_int("nextId", 0);
        let next_id = next_id
            .checked_as::<ShapeID>()
            .ok_or_else(|| LoadError::Malformed(format!("nextId {next_id} is out of range")))?;
        let shapes = load_shape_list(factory, s)?;
        let mut doc = Self::default();
        for shape in shapes {
            doc.push(shape);
        }
        doc.next_id = doc.next_id.max(next_id);
        Ok(doc)
    }
}

/// Read the `shapes` list of the current node. Fails on the first bad entry, or if `count` disagrees
/// with the list.
pub(crate) fn load_shape_list(factory: &ShapeFactory, s: &mut dyn Storage) -> Result<Vec<Shape>, LoadError> {
    let len = s.node_count("shapes");
    let count = s.read_int("count", -1);
    if count >= 0 && usize::try_from(count).ok() != Some(len) {
        return Err(LoadError::Malformed(format!("count is {count}, but {len} shapes are listed")));
    }
    let mut shapes = Vec::with_capacity(len);
    for index in 0..len {
        if !s.begin_read_node("shapes", Some(index)) {
            return Err(LoadError::Shape {
                index,
                source: Box::new(LoadError::Malformed("entry is not a node".to_owned())),
            });
        }
        let shape = factory.load_shape(s);
        s.end_node();
        match shape {
            Ok(shape) => shapes.push(shape),
            Err(e) => {
                return Err(LoadError::Shape {
                    index,
                    source: Box::new(e),
                })
            }
        }
    }
    Ok(shapes)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geom::Vector,
        shape::{Dot, Line},
        storage::JsonStorage,
    };

    fn line(x: f32) -> Shape {
        Shape::new(Box::new(Line::new(Point::new(x, 0.0), Point::new(x + 1.0, 1.0))))
    }

    #[test]
    fn ids_are_never_reused() {
        let mut doc = ShapeDocument::new();
        let a = doc.add_shape(line(0.0));
        let b = doc.add_shape(line(1.0));
        assert_ne!(a, INVALID_SHAPE_ID);
        assert_ne!(a, b);
        doc.remove_shape(b).unwrap();
        let c = doc.add_shape(line(2.0));
        assert_ne!(c, b);

        // A taken id is replaced.
        let mut dup = line(3.0);
        dup.set_id(a);
        let d = doc.add_shape(dup);
        assert_ne!(d, a);
    }
    #[test]
    fn one_change_per_mutation() {
        let mut doc = ShapeDocument::new();
        doc.add_shapes([line(0.0), line(1.0), line(2.0)]);
        assert_eq!(doc.change_count(), 1);
        let first = doc.iter().next().unwrap().id();
        doc.modify(first, |shape| shape.offset(Vector::new(1.0, 0.0)));
        assert_eq!(doc.change_count(), 2);
        assert_eq!(doc.remove_shapes(&[1, 2, 99]), 2);
        assert_eq!(doc.change_count(), 3);
        doc.clear();
        assert_eq!(doc.change_count(), 4);
        // Render passes don't count as changes.
        doc.mark_drawn();
        assert_eq!(doc.change_count(), 4);
        assert_eq!(doc.draw_count(), 1);
    }
    #[test]
    fn merge_replaces_in_place() {
        let mut doc = ShapeDocument::new();
        let ids = doc.add_shapes([line(0.0), line(1.0)]);
        let mut edited = doc.get(ids[0]).unwrap().clone();
        edited.offset(Vector::new(0.0, 5.0));
        let (replaced, appended) = doc.merge_shapes([edited.clone(), line(9.0)]);
        assert_eq!(replaced, 1);
        assert_eq!(appended.len(), 1);
        assert_eq!(doc.change_count(), 2);
        // Still at the bottom of the z-order.
        assert_eq!(doc.iter().next(), Some(&edited));
        assert_eq!(doc.iter().last().map(Shape::id), Some(appended[0]));
    }
    #[test]
    fn bounding_boxes_skip_hidden() {
        let mut doc = ShapeDocument::new();
        doc.add_shape(line(0.0));
        let mut far = Shape::new(Box::new(Dot::new(Point::new(100.0, 100.0))));
        far.set_flags(crate::shape::ShapeFlags::HIDDEN);
        let far = doc.add_shape(far);
        assert_eq!(doc.bounding_box(), Rect::from_corners(Point::new(0.0, 0.0), Point::new(1.0, 1.0)));
        assert_eq!(doc.bounding_box_of(far), Some(Rect::from_corners(Point::new(100.0, 100.0), Point::new(100.0, 100.0))));
        assert!(ShapeDocument::new().bounding_box().is_null());
    }
    #[test]
    fn nearest_shape_wins() {
        let mut doc = ShapeDocument::new();
        let near = doc.add_shape(Shape::new(Box::new(Line::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0)))));
        let _far = doc.add_shape(Shape::new(Box::new(Line::new(Point::new(0.0, 3.0), Point::new(10.0, 3.0)))));
        let (id, hit) = doc.find_by_point(Point::new(5.0, 1.0), 2.5).unwrap();
        assert_eq!(id, near);
        assert!((hit.distance - 1.0).abs() < 1e-6);
        assert!(doc.find_by_point(Point::new(5.0, 20.0), 2.5).is_none());
    }
    #[test]
    fn save_load_is_all_or_nothing() {
        let mut doc = ShapeDocument::new();
        doc.add_shapes([line(0.0), line(5.0)]);
        let factory = ShapeFactory::default();

        let mut s = JsonStorage::new();
        doc.save(&mut s);
        let loaded = ShapeDocument::load(&factory, &mut s).unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(loaded.next_id(), doc.next_id());

        // Break the second shape.
        assert!(s.begin_read_node("shapes", Some(1)));
        s.write_float_array("points", &[0.0]);
        s.end_node();
        let err = ShapeDocument::load(&factory, &mut s).unwrap_err();
        assert!(matches!(err, LoadError::Shape { index: 1, .. }));
    }
    #[test]
    fn gaps_in_the_shape_list_fail_the_load() {
        let factory = ShapeFactory::default();
        let dot = |id| format!(r#"{{"type":"dot","id":{id},"points":[1.0,2.0]}}"#);

        let text = format!(r#"{{"count":3,"shapes":[{},null,{}]}}"#, dot(1), dot(3));
        let err = ShapeDocument::load(&factory, &mut JsonStorage::parse(&text).unwrap()).unwrap_err();
        assert!(matches!(err, LoadError::Shape { index: 1, .. }));

        let text = format!(r#"{{"count":3,"shapes":[{}]}}"#, dot(1));
        let err = ShapeDocument::load(&factory, &mut JsonStorage::parse(&text).unwrap()).unwrap_err();
        assert!(matches!(err, LoadError::Malformed(_)));

        // Without a count, the list length decides.
        let text = format!(r#"{{"shapes":[{},{}]}}"#, dot(1), dot(3));
        let doc = ShapeDocument::load(&factory, &mut JsonStorage::parse(&text).unwrap()).unwrap();
        assert_eq!(doc.shape_count(), 2);
    }
    #[test]
    fn top_id_is_never_handed_out() {
        let factory = ShapeFactory::default();
        let text = format!(r#"{{"shapes":[{{"type":"dot","id":{},"points":[1.0,2.0]}}]}}"#, ShapeID::MAX);
        let err = ShapeDocument::load(&factory, &mut JsonStorage::parse(&text).unwrap()).unwrap_err();
        assert!(matches!(err, LoadError::Shape { index: 0, .. }));

        let mut doc = ShapeDocument::new();
        let mut last = line(0.0);
        last.set_id(ShapeID::MAX - 1);
        assert_eq!(doc.add_shape(last), ShapeID::MAX - 1);
        // The id space is used up: new shapes are refused rather than given a taken id.
        assert_eq!(doc.add_shape(line(1.0)), INVALID_SHAPE_ID);
        let (_, appended) = doc.merge_shapes([line(2.0)]);
        assert!(appended.is_empty());
        assert_eq!(doc.shape_count(), 1);

        let mut s = JsonStorage::new();
        s.write_int("nextId", i64::from(ShapeID::MAX) + 1);
        assert!(matches!(ShapeDocument::load(&factory, &mut s), Err(LoadError::Malformed(_))));
    }
}
