//! # Geometry
//!
//! Plain model-space math shared by shapes, the document, and the view: points, extents, and
//! affine matrices. Model space is y-up, in arbitrary document units.

/// Tolerance used when comparing lengths for degeneracy.
pub const EPSILON: f32 = 1e-6;

#[derive(Copy, Clone, PartialEq, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}
impl Point {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
    #[must_use]
    pub fn distance_to(self, other: Self) -> f32 {
        (other - self).length()
    }
    /// Halfway between `self` and `other`.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }
    /// Are the two points within `tolerance` of each other on both axes?
    #[must_use]
    pub fn approx_eq(self, other: Self, tolerance: f32) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}
impl std::ops::Sub for Point {
    type Output = Vector;
    fn sub(self, rhs: Self) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}
impl std::ops::Add<Vector> for Point {
    type Output = Point;
    fn add(self, rhs: Vector) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}
impl std::ops::AddAssign<Vector> for Point {
    fn add_assign(&mut self, rhs: Vector) {
        *self = *self + rhs;
    }
}
impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}
impl From<Point> for [f32; 2] {
    fn from(value: Point) -> Self {
        [value.x, value.y]
    }
}

#[derive(Copy, Clone, PartialEq, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
}
impl Vector {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
    #[must_use]
    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }
}
impl std::ops::Mul<f32> for Vector {
    type Output = Vector;
    fn mul(self, rhs: f32) -> Vector {
        Vector::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned rectangle, stored as min/max corners.
///
/// [`Rect::NULL`] (min > max) is the identity for [`Rect::union`] and overlaps nothing. A single point
/// gives a zero-sized but non-null rect.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Rect {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}
impl Default for Rect {
    fn default() -> Self {
        Self::NULL
    }
}
impl Rect {
    pub const NULL: Self = Self {
        xmin: f32::INFINITY,
        ymin: f32::INFINITY,
        xmax: f32::NEG_INFINITY,
        ymax: f32::NEG_INFINITY,
    };
    /// Rect spanning two corners, in any order.
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            xmin: a.x.min(b.x),
            ymin: a.y.min(b.y),
            xmax: a.x.max(b.x),
            ymax: a.y.max(b.y),
        }
    }
    /// Rect centered on `center`, with the given width and height.
    #[must_use]
    pub fn from_center(center: Point, width: f32, height: f32) -> Self {
        let (hw, hh) = (width.abs() * 0.5, height.abs() * 0.5);
        Self {
            xmin: center.x - hw,
            ymin: center.y - hh,
            xmax: center.x + hw,
            ymax: center.y + hh,
        }
    }
    /// Tight bounds of all the given points, or [`Rect::NULL`] if there are none.
    #[must_use]
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Self {
        points.into_iter().fold(Self::NULL, |rect, pt| rect.include(*pt))
    }
    /// From `(left, top, right, bottom)` order.
    #[must_use]
    pub fn from_ltrb([left, top, right, bottom]: [f32; 4]) -> Self {
        Self::from_corners(Point::new(left, top), Point::new(right, bottom))
    }
    /// As `(left, top, right, bottom)`.
    #[must_use]
    pub fn to_ltrb(&self) -> [f32; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.xmin > self.xmax || self.ymin > self.ymax
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_null() || self.width() < EPSILON || self.height() < EPSILON
    }
    #[must_use]
    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }
    #[must_use]
    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new((self.xmin + self.xmax) * 0.5, (self.ymin + self.ymax) * 0.5)
    }
    #[must_use]
    pub fn include(self, pt: Point) -> Self {
        Self {
            xmin: self.xmin.min(pt.x),
            ymin: self.ymin.min(pt.y),
            xmax: self.xmax.max(pt.x),
            ymax: self.ymax.max(pt.y),
        }
    }
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        if other.is_null() {
            return self;
        }
        if self.is_null() {
            return other;
        }
        Self {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }
    /// Grow by `by` on every side. Null rects stay null.
    #[must_use]
    pub fn inflate(self, by: f32) -> Self {
        if self.is_null() {
            return self;
        }
        Self {
            xmin: self.xmin - by,
            ymin: self.ymin - by,
            xmax: self.xmax + by,
            ymax: self.ymax + by,
        }
    }
    /// Closed-interval overlap test. Touching edges count as overlapping.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !self.is_null()
            && !other.is_null()
            && self.xmin <= other.xmax
            && other.xmin <= self.xmax
            && self.ymin <= other.ymax
            && other.ymin <= self.ymax
    }
    #[must_use]
    pub fn contains_point(&self, pt: Point) -> bool {
        pt.x >= self.xmin && pt.x <= self.xmax && pt.y >= self.ymin && pt.y <= self.ymax
    }
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        !other.is_null() && self.contains_point(Point::new(other.xmin, other.ymin))
            && self.contains_point(Point::new(other.xmax, other.ymax))
    }
    /// Corners, counter-clockwise from (xmin, ymin).
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.xmin, self.ymin),
            Point::new(self.xmax, self.ymin),
            Point::new(self.xmax, self.ymax),
            Point::new(self.xmin, self.ymax),
        ]
    }
}

/// An arbitrary affine transform.
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable, PartialEq)]
#[repr(C)]
pub struct Matrix {
    /// Column-major elements: x basis, y basis, translation.
    pub elements: [[f32; 2]; 3],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Self = Self {
        elements: [[1.0, 0.0], [0.0, 1.0], [0.0, 0.0]],
    };
    #[must_use]
    pub fn translation(by: Vector) -> Self {
        Self {
            elements: [[1.0, 0.0], [0.0, 1.0], [by.x, by.y]],
        }
    }
    #[must_use]
    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            elements: [[sx, 0.0], [0.0, sy], [0.0, 0.0]],
        }
    }
    /// Rotation counter-clockwise by `radians` about the origin.
    #[must_use]
    pub fn rotation(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            elements: [[cos, sin], [-sin, cos], [0.0, 0.0]],
        }
    }
    /// Rotation counter-clockwise by `radians` about `center`.
    #[must_use]
    pub fn rotation_about(radians: f32, center: Point) -> Self {
        let to_origin = Vector::new(-center.x, -center.y);
        Self::translation(to_origin)
            .then(&Self::rotation(radians))
            .then(&Self::translation(Vector::new(center.x, center.y)))
    }
    /// Scale by `(sx, sy)` keeping `center` fixed.
    #[must_use]
    pub fn scale_about(sx: f32, sy: f32, center: Point) -> Self {
        let to_origin = Vector::new(-center.x, -center.y);
        Self::translation(to_origin)
            .then(&Self::scale(sx, sy))
            .then(&Self::translation(Vector::new(center.x, center.y)))
    }
    #[must_use]
    pub fn apply(&self, pt: Point) -> Point {
        let [x_axis, y_axis, t] = self.elements;
        Point::new(
            x_axis[0] * pt.x + y_axis[0] * pt.y + t[0],
            x_axis[1] * pt.x + y_axis[1] * pt.y + t[1],
        )
    }
    /// Transform a direction, ignoring translation.
    #[must_use]
    pub fn apply_vector(&self, v: Vector) -> Vector {
        let [x_axis, y_axis, _] = self.elements;
        Vector::new(
            x_axis[0] * v.x + y_axis[0] * v.y,
            x_axis[1] * v.x + y_axis[1] * v.y,
        )
    }
    /// The transform equivalent to applying `self` and then `next`.
    #[must_use]
    pub fn then(&self, next: &Self) -> Self {
        let [x_axis, y_axis, t] = self.elements;
        let x = next.apply_vector(Vector::new(x_axis[0], x_axis[1]));
        let y = next.apply_vector(Vector::new(y_axis[0], y_axis[1]));
        let t = next.apply(Point::new(t[0], t[1]));
        Self {
            elements: [[x.x, x.y], [y.x, y.y], [t.x, t.y]],
        }
    }
    #[must_use]
    pub fn determinant(&self) -> f32 {
        let [x_axis, y_axis, _] = self.elements;
        x_axis[0] * y_axis[1] - y_axis[0] * x_axis[1]
    }
    /// None if the matrix is singular.
    #[must_use]
    pub fn invert(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < EPSILON * EPSILON {
            return None;
        }
        let [[a, b], [c, d], [tx, ty]] = self.elements;
        let inv = 1.0 / det;
        let (ia, ib, ic, id) = (d * inv, -b * inv, -c * inv, a * inv);
        Some(Self {
            elements: [
                [ia, ib],
                [ic, id],
                [-(ia * tx + ic * ty), -(ib * tx + id * ty)],
            ],
        })
    }
}

impl From<[[f32; 2]; 3]> for Matrix {
    fn from(elements: [[f32; 2]; 3]) -> Self {
        Self { elements }
    }
}

impl From<Matrix> for [[f32; 2]; 3] {
    fn from(value: Matrix) -> Self {
        value.elements
    }
}

/// Distance from `pt` to the segment `a`-`b`, and the nearest point on that segment.
#[must_use]
pub fn point_to_segment(a: Point, b: Point, pt: Point) -> (f32, Point) {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    // Degenerate segment, treat as a point.
    if len_sq < EPSILON * EPSILON {
        return (pt.distance_to(a), a);
    }
    let t = ((pt - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    let nearest = a + ab * t;
    (pt.distance_to(nearest), nearest)
}

/// Does any part of segment `a`-`b` lie within `rect`? Liang-Barsky clipping.
#[must_use]
pub fn segment_intersects_rect(a: Point, b: Point, rect: &Rect) -> bool {
    if rect.is_null() {
        return false;
    }
    let d = b - a;
    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;
    // (p, q) for each of the four clip edges.
    let edges = [
        (-d.x, a.x - rect.xmin),
        (d.x, rect.xmax - a.x),
        (-d.y, a.y - rect.ymin),
        (d.y, rect.ymax - a.y),
    ];
    for (p, q) in edges {
        if p.abs() < EPSILON {
            // Parallel to this edge and outside of it.
            if q < 0.0 {
                return false;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return false;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return false;
                }
                t1 = t1.min(r);
            }
        }
    }
    t0 <= t1
}

/// Even-odd containment test against a closed polygon.
#[must_use]
pub fn polygon_contains(polygon: &[Point], pt: Point) -> bool {
    let mut inside = false;
    let Some(mut prev) = polygon.last().copied() else {
        return false;
    };
    for &cur in polygon {
        if (cur.y > pt.y) != (prev.y > pt.y) {
            let x = (prev.x - cur.x) * (pt.y - cur.y) / (prev.y - cur.y) + cur.x;
            if pt.x < x {
                inside = !inside;
            }
        }
        prev = cur;
    }
    inside
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_near(a: Point, b: Point) {
        assert!(a.approx_eq(b, 1e-4), "{a:?} != {b:?}");
    }

    #[test]
    fn projection_onto_segment() {
        let (dist, near) = point_to_segment(Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(5.0, 1.0));
        assert!((dist - 1.0).abs() < 1e-6);
        assert_near(near, Point::new(5.0, 0.0));

        // Past the end clamps to the endpoint.
        let (dist, near) = point_to_segment(Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(13.0, 4.0));
        assert!((dist - 5.0).abs() < 1e-5);
        assert_near(near, Point::new(10.0, 0.0));
    }
    #[test]
    fn clipping() {
        let rect = Rect::from_corners(Point::new(0.0, 0.0), Point::new(4.0, 4.0));
        // Crosses straight through
        assert!(segment_intersects_rect(Point::new(-2.0, 2.0), Point::new(6.0, 2.0), &rect));
        // Entirely inside
        assert!(segment_intersects_rect(Point::new(1.0, 1.0), Point::new(2.0, 2.0), &rect));
        // Diagonal passing by the corner
        assert!(!segment_intersects_rect(Point::new(3.0, 6.0), Point::new(6.0, 3.0), &rect));
        // Parallel, outside
        assert!(!segment_intersects_rect(Point::new(-1.0, 5.0), Point::new(5.0, 5.0), &rect));
    }
    #[test]
    fn matrix_then_is_composition() {
        let a = Matrix::rotation(0.3);
        let b = Matrix::translation(Vector::new(2.0, -1.0)).then(&Matrix::scale(2.0, 0.5));
        let pt = Point::new(3.0, 7.0);
        assert_near(a.then(&b).apply(pt), b.apply(a.apply(pt)));
    }
    #[test]
    fn matrix_inverse() {
        let m = Matrix::rotation_about(1.1, Point::new(4.0, 2.0)).then(&Matrix::scale(3.0, 3.0));
        let inv = m.invert().unwrap();
        let pt = Point::new(-2.5, 9.0);
        assert_near(inv.apply(m.apply(pt)), pt);
        assert!(Matrix::scale(0.0, 1.0).invert().is_none());
    }
    #[test]
    fn rect_union_with_null() {
        let r = Rect::from_corners(Point::new(1.0, 1.0), Point::new(2.0, 3.0));
        assert_eq!(Rect::NULL.union(r), r);
        assert_eq!(r.union(Rect::NULL), r);
        assert!(!Rect::NULL.intersects(&r));
        assert_eq!(r.to_ltrb(), [1.0, 1.0, 2.0, 3.0]);
    }
    #[test]
    fn polygon_inside() {
        let square = Rect::from_corners(Point::ORIGIN, Point::new(2.0, 2.0)).corners();
        assert!(polygon_contains(&square, Point::new(1.0, 1.0)));
        assert!(!polygon_contains(&square, Point::new(3.0, 1.0)));
    }
}
