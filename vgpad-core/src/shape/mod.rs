//! # Shapes
//!
//! A [`Shape`] is the unit of content in a document. The shared state (identity, flags, style, and the cached
//! extent) lives on `Shape` itself, while everything variant-specific sits behind the [`Geometry`] capability
//! trait. Every mutation goes through `Shape`, which recomputes the extent afterwards - geometries never
//! see or store it, so it can't go stale.
//!
//! Persistence is ordered composition: the shape writes its type tag and base fields, then hands the same
//! storage node to the geometry for its own fields. Loading mirrors this, and any single failure fails the
//! whole shape.

mod dot;
mod image;
mod line;
mod rect;

pub use dot::Dot;
pub use image::ImageRect;
pub use line::Line;
pub use rect::RectShape;

use crate::{
    context::Context,
    geom::{self, Matrix, Point, Rect, Vector},
    storage::{LoadError, Storage},
};

/// Identity of a shape within its document. Zero is never assigned.
pub type ShapeID = u32;
pub const INVALID_SHAPE_ID: ShapeID = 0;

bitflags::bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct ShapeFlags : u32 {
        /// Can't be moved, edited, or deleted by commands.
        const LOCKED = 0b01;
        /// Skipped by hit tests and bounding boxes.
        const HIDDEN = 0b10;
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, strum::AsRefStr)]
pub enum HandleType {
    /// A stored point, which can be dragged.
    Vertex,
    /// Derived from other points, such as the middle of a line. Never draggable.
    MidPoint,
}

/// Outcome of a point hit test.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct HitResult {
    /// Distance from the query point to the geometry.
    pub distance: f32,
    /// Closest point on the geometry.
    pub nearest: Point,
    /// Index of the nearest edge, if the geometry has edges.
    pub segment: Option<usize>,
}
impl HitResult {
    pub const MISS: Self = Self {
        distance: f32::INFINITY,
        nearest: Point::ORIGIN,
        segment: None,
    };
}

/// Clamp an index to the last valid point. Out-of-range indices are tolerated, not rejected.
#[must_use]
pub fn clamp_index(index: usize, count: usize) -> usize {
    index.min(count.saturating_sub(1))
}

/// Variant-specific half of a shape.
///
/// Implementors own a fixed number of points and get sensible defaults for everything else by treating those
/// points as a polyline (or polygon, when [`Geometry::is_closed`]).
pub trait Geometry: Send + Sync + std::fmt::Debug + std::any::Any {
    /// Persisted type tag. Must be unique across everything registered with a [`crate::factory::ShapeFactory`].
    fn type_name(&self) -> &'static str;
    fn points(&self) -> &[Point];
    fn points_mut(&mut self) -> &mut [Point];
    fn is_closed(&self) -> bool {
        false
    }

    fn handle_count(&self) -> usize {
        self.points().len()
    }
    fn handle_point(&self, index: usize) -> Point {
        let points = self.points();
        points[clamp_index(index, points.len())]
    }
    fn is_handle_fixed(&self, _index: usize) -> bool {
        false
    }
    fn handle_type(&self, _index: usize) -> HandleType {
        HandleType::Vertex
    }
    /// Move a handle. The base behavior moves the matching point.
    fn set_handle_point(&mut self, index: usize, pt: Point, _tolerance: f32) -> bool {
        let points = self.points_mut();
        let index = clamp_index(index, points.len());
        points[index] = pt;
        true
    }

    fn hit_test(&self, pt: Point, _tolerance: f32) -> HitResult {
        let points = self.points();
        let mut best = HitResult::MISS;
        for (segment, (a, b)) in edges(points, self.is_closed()).enumerate() {
            let (distance, nearest) = geom::point_to_segment(a, b, pt);
            if distance < best.distance {
                best = HitResult {
                    distance,
                    nearest,
                    segment: Some(segment),
                };
            }
        }
        best
    }
    /// Exact box test. Only called once extents are known to overlap.
    fn hit_test_box(&self, rect: &Rect) -> bool {
        let points = self.points();
        edges(points, self.is_closed()).any(|(a, b)| geom::segment_intersects_rect(a, b, rect))
            || (self.is_closed() && geom::polygon_contains(points, rect.center()))
    }
    fn transform(&mut self, matrix: &Matrix) {
        for pt in self.points_mut() {
            *pt = matrix.apply(*pt);
        }
    }
    /// Collapse onto the first point.
    fn clear(&mut self) {
        let points = self.points_mut();
        if let Some((first, rest)) = points.split_first_mut() {
            rest.fill(*first);
        }
    }

    fn save(&self, s: &mut dyn Storage) {
        s.write_float_array("points", bytemuck::cast_slice(self.points()));
    }
    fn load(&mut self, s: &mut dyn Storage) -> Result<(), LoadError> {
        let elements: &mut [f32] = bytemuck::cast_slice_mut(self.points_mut());
        let expected = elements.len();
        let found = s.read_float_array("points", elements);
        if found == expected {
            Ok(())
        } else {
            Err(LoadError::Arity {
                field: "points",
                expected,
                found,
            })
        }
    }

    fn clone_geometry(&self) -> Box<dyn Geometry>;
    /// Structural equality. The default compares type and points, override if there is more state.
    fn equals(&self, other: &dyn Geometry) -> bool {
        self.type_name() == other.type_name() && self.points() == other.points()
    }
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Consecutive point pairs, plus the closing edge for polygons.
fn edges(points: &[Point], closed: bool) -> impl Iterator<Item = (Point, Point)> + '_ {
    let closing = (closed && points.len() > 2)
        .then(|| points.last().copied().zip(points.first().copied()))
        .flatten();
    let single = (points.len() == 1).then(|| (points[0], points[0]));
    points
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .chain(closing)
        .chain(single)
}

#[derive(Debug)]
pub struct Shape {
    id: ShapeID,
    flags: ShapeFlags,
    context: Context,
    /// Tight bounds of the geometry's points. Recomputed by every mutator.
    extent: Rect,
    geometry: Box<dyn Geometry>,
}
impl Clone for Shape {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            flags: self.flags,
            context: self.context,
            extent: self.extent,
            geometry: self.geometry.clone_geometry(),
        }
    }
}
impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.flags == other.flags
            && self.context == other.context
            && self.geometry.equals(other.geometry.as_ref())
    }
}

// Accessors
impl Shape {
    #[must_use]
    pub fn new(geometry: Box<dyn Geometry>) -> Self {
        let mut this = Self {
            id: INVALID_SHAPE_ID,
            flags: ShapeFlags::empty(),
            context: Context::default(),
            extent: Rect::NULL,
            geometry,
        };
        this.update();
        this
    }
    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
    #[must_use]
    pub fn id(&self) -> ShapeID {
        self.id
    }
    /// Ids are assigned by the document.
    pub(crate) fn set_id(&mut self, id: ShapeID) {
        self.id = id;
    }
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.geometry.type_name()
    }
    #[must_use]
    pub fn geometry(&self) -> &dyn Geometry {
        self.geometry.as_ref()
    }
    /// Downcast the geometry to a concrete variant.
    #[must_use]
    pub fn geometry_as<G: Geometry>(&self) -> Option<&G> {
        self.geometry.as_any().downcast_ref()
    }
    #[must_use]
    pub fn extent(&self) -> Rect {
        self.extent
    }
    #[must_use]
    pub fn flags(&self) -> ShapeFlags {
        self.flags
    }
    pub fn set_flags(&mut self, flags: ShapeFlags) {
        self.flags = flags;
    }
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.flags.contains(ShapeFlags::LOCKED)
    }
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.flags.contains(ShapeFlags::HIDDEN)
    }
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }
    pub fn set_context(&mut self, context: Context) {
        self.context = context;
    }
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.geometry.points().len()
    }
    #[must_use]
    pub fn points(&self) -> &[Point] {
        self.geometry.points()
    }
    /// Out-of-range indices read the last point.
    #[must_use]
    pub fn point(&self, index: usize) -> Point {
        let points = self.geometry.points();
        points[clamp_index(index, points.len())]
    }
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.geometry.handle_count()
    }
    #[must_use]
    pub fn handle_point(&self, index: usize) -> Point {
        self.geometry.handle_point(index)
    }
    #[must_use]
    pub fn is_handle_fixed(&self, index: usize) -> bool {
        self.geometry.is_handle_fixed(index)
    }
    #[must_use]
    pub fn handle_type(&self, index: usize) -> HandleType {
        self.geometry.handle_type(index)
    }
    #[must_use]
    pub fn center(&self) -> Point {
        self.extent.center()
    }
}

// Mutators. Each ends by refreshing the extent.
impl Shape {
    fn update(&mut self) {
        self.extent = Rect::from_points(self.geometry.points());
    }
    /// Out-of-range indices write the last point.
    pub fn set_point(&mut self, index: usize, pt: Point) {
        let points = self.geometry.points_mut();
        let index = clamp_index(index, points.len());
        points[index] = pt;
        self.update();
    }
    /// Move a handle. Returns false, leaving the shape untouched, for fixed handles.
    pub fn set_handle_point(&mut self, index: usize, pt: Point, tolerance: f32) -> bool {
        if self.geometry.is_handle_fixed(index) {
            return false;
        }
        let moved = self.geometry.set_handle_point(index, pt, tolerance);
        self.update();
        moved
    }
    pub fn transform(&mut self, matrix: &Matrix) {
        self.geometry.transform(matrix);
        self.update();
    }
    pub fn offset(&mut self, by: Vector) {
        self.transform(&Matrix::translation(by));
    }
    /// Degenerate to zero extent, keeping the shape itself.
    pub fn clear(&mut self) {
        self.geometry.clear();
        self.update();
    }
}

// Queries
impl Shape {
    /// Distance from `pt` to the geometry. The caller compares `distance` against its own cutoff.
    #[must_use]
    pub fn hit_test(&self, pt: Point, tolerance: f32) -> HitResult {
        self.geometry.hit_test(pt, tolerance)
    }
    /// Does the shape touch `rect`? Rejected on extents before the exact test runs.
    #[must_use]
    pub fn hit_test_box(&self, rect: &Rect) -> bool {
        if !self.extent.intersects(rect) {
            return false;
        }
        self.geometry.hit_test_box(rect)
    }
}

// Persistence
impl Shape {
    /// Write the type tag, base fields, then the geometry's fields into the current node.
    pub fn save(&self, s: &mut dyn Storage) {
        s.write_string("type", self.type_name());
        s.write_int("id", i64::from(self.id));
        s.write_int("flags", i64::from(self.flags.bits()));
        s.begin_write_node("context", None);
        self.context.save(s);
        s.end_node();
        self.geometry.save(s);
    }
    /// Read base fields then geometry fields from the current node. The type tag is read by the factory,
    /// which picked the geometry. On error `self` may be partially overwritten and must be discarded.
    pub fn load(&mut self, s: &mut dyn Storage) -> Result<(), LoadError> {
        use az::CheckedAs;
        let id = s.read_int("id", -1);
        if id < 0 {
            return Err(LoadError::MissingField("id"));
        }
        // The top id is never handed out, so the document can always allocate past a loaded one.
        self.id = id
            .checked_as::<ShapeID>()
            .filter(|id| *id < ShapeID::MAX)
            .ok_or_else(|| LoadError::Malformed(format!("shape id {id} is out of range")))?;
        self.flags = ShapeFlags::from_bits_truncate(s.read_int("flags", 0).checked_as::<u32>().unwrap_or(0));
        if s.begin_read_node("context", None) {
            self.context.load(s);
            s.end_node();
        } else {
            self.context = Context::default();
        }
        let result = self.geometry.load(s);
        self.update();
        result
    }
}
