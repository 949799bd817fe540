use super::{Geometry, HandleType, RectShape};
use crate::{
    geom::{Point, Rect},
    storage::{LoadError, Storage},
};

/// A rectangle holding a named image. The image itself lives outside the document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageRect {
    rect: RectShape,
    name: String,
}
impl ImageRect {
    pub const TYPE_NAME: &'static str = "image";
    #[must_use]
    pub fn new(name: impl Into<String>, rect: Rect) -> Self {
        Self {
            rect: RectShape::from_rect(rect),
            name: name.into(),
        }
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Geometry for ImageRect {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }
    fn points(&self) -> &[Point] {
        self.rect.points()
    }
    fn points_mut(&mut self) -> &mut [Point] {
        self.rect.points_mut()
    }
    fn is_closed(&self) -> bool {
        true
    }
    fn handle_count(&self) -> usize {
        self.rect.handle_count()
    }
    fn handle_point(&self, index: usize) -> Point {
        self.rect.handle_point(index)
    }
    fn is_handle_fixed(&self, index: usize) -> bool {
        self.rect.is_handle_fixed(index)
    }
    fn handle_type(&self, index: usize) -> HandleType {
        self.rect.handle_type(index)
    }
    fn set_handle_point(&mut self, index: usize, pt: Point, tolerance: f32) -> bool {
        self.rect.set_handle_point(index, pt, tolerance)
    }
    fn save(&self, s: &mut dyn Storage) {
        self.rect.save(s);
        s.write_string("name", &self.name);
    }
    fn load(&mut self, s: &mut dyn Storage) -> Result<(), LoadError> {
        self.rect.load(s)?;
        self.name = s.read_string("name").ok_or(LoadError::MissingField("name"))?;
        Ok(())
    }
    fn clone_geometry(&self) -> Box<dyn Geometry> {
        Box::new(self.clone())
    }
    fn equals(&self, other: &dyn Geometry) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| other == self)
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
