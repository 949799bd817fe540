use super::{Geometry, HandleType};
use crate::geom::{Point, Rect};

/// Four-cornered closed shape. Starts axis-aligned, but transforms may rotate or skew it.
///
/// Handles 0..4 are the corners, 4..8 are fixed markers at the middle of each edge.
#[derive(Clone, Debug, PartialEq)]
pub struct RectShape {
    /// Counter-clockwise from the (xmin, ymin) corner when created from a [`Rect`].
    corners: [Point; 4],
}
impl Default for RectShape {
    fn default() -> Self {
        Self::from_rect(Rect::from_corners(Point::ORIGIN, Point::ORIGIN))
    }
}
impl RectShape {
    pub const TYPE_NAME: &'static str = "rect";
    #[must_use]
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            corners: rect.corners(),
        }
    }
    #[must_use]
    pub fn corners(&self) -> &[Point; 4] {
        &self.corners
    }
    /// Replace with an axis-aligned rect.
    pub fn set_rect(&mut self, rect: Rect) {
        self.corners = rect.corners();
    }
    fn edge_midpoint(&self, edge: usize) -> Point {
        let a = self.corners[edge % 4];
        let b = self.corners[(edge + 1) % 4];
        a.midpoint(b)
    }
}

impl Geometry for RectShape {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }
    fn points(&self) -> &[Point] {
        &self.corners
    }
    fn points_mut(&mut self) -> &mut [Point] {
        &mut self.corners
    }
    fn is_closed(&self) -> bool {
        true
    }
    fn handle_count(&self) -> usize {
        8
    }
    fn handle_point(&self, index: usize) -> Point {
        match index {
            0..=3 => self.corners[index],
            4..=7 => self.edge_midpoint(index - 4),
            _ => self.edge_midpoint(3),
        }
    }
    fn handle_type(&self, index: usize) -> HandleType {
        if index < 4 {
            HandleType::Vertex
        } else {
            HandleType::MidPoint
        }
    }
    fn is_handle_fixed(&self, index: usize) -> bool {
        index >= 4
    }
    fn set_handle_point(&mut self, index: usize, pt: Point, _tolerance: f32) -> bool {
        if index >= 4 {
            return false;
        }
        self.corners[index] = pt;
        true
    }
    fn clone_geometry(&self) -> Box<dyn Geometry> {
        Box::new(self.clone())
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
