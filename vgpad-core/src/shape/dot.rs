use super::Geometry;
use crate::geom::Point;

/// A single point, hit-tested as a point.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dot {
    point: [Point; 1],
}
impl Dot {
    pub const TYPE_NAME: &'static str = "dot";
    #[must_use]
    pub fn new(at: Point) -> Self {
        Self { point: [at] }
    }
}
impl Geometry for Dot {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }
    fn points(&self) -> &[Point] {
        &self.point
    }
    fn points_mut(&mut self) -> &mut [Point] {
        &mut self.point
    }
    fn clone_geometry(&self) -> Box<dyn Geometry> {
        Box::new(self.clone())
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
