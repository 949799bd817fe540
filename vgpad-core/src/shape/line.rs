use super::{Geometry, HandleType};
use crate::geom::{Point, Rect};

/// A straight segment. Exposes a third, fixed handle at its midpoint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Line {
    points: [Point; 2],
}
impl Line {
    pub const TYPE_NAME: &'static str = "line";
    /// Handle index of the midpoint marker.
    pub const MIDPOINT_HANDLE: usize = 2;
    #[must_use]
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            points: [start, end],
        }
    }
    #[must_use]
    pub fn start(&self) -> Point {
        self.points[0]
    }
    #[must_use]
    pub fn end(&self) -> Point {
        self.points[1]
    }
    #[must_use]
    pub fn length(&self) -> f32 {
        self.start().distance_to(self.end())
    }
}

impl Geometry for Line {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }
    fn points(&self) -> &[Point] {
        &self.points
    }
    fn points_mut(&mut self) -> &mut [Point] {
        &mut self.points
    }
    fn handle_count(&self) -> usize {
        3
    }
    fn handle_point(&self, index: usize) -> Point {
        match index {
            0 => self.start(),
            1 => self.end(),
            _ => self.start().midpoint(self.end()),
        }
    }
    fn is_handle_fixed(&self, index: usize) -> bool {
        index >= Self::MIDPOINT_HANDLE
    }
    fn handle_type(&self, index: usize) -> HandleType {
        if index >= Self::MIDPOINT_HANDLE {
            HandleType::MidPoint
        } else {
            HandleType::Vertex
        }
    }
    fn set_handle_point(&mut self, index: usize, pt: Point, _tolerance: f32) -> bool {
        if index >= Self::MIDPOINT_HANDLE {
            return false;
        }
        self.points[index] = pt;
        true
    }
    fn hit_test_box(&self, rect: &Rect) -> bool {
        crate::geom::segment_intersects_rect(self.start(), self.end(), rect)
    }
    fn clone_geometry(&self) -> Box<dyn Geometry> {
        Box::new(self.clone())
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
