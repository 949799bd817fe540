//! Mapping between model coordinates and display pixels.

use cgmath::prelude::*;

use crate::geom::{Point, Rect};

type Decomposed2 = cgmath::Decomposed<cgmath::Vector2<f32>, cgmath::Basis2<f32>>;
/// Margin around zoomed-to content, in display pixels.
pub const MARGIN: f32 = 8.0;
/// Smallest scale a zoom may produce.
pub const MIN_SCALE: f32 = 0.001;

/// Offset, rotation, and uniform scale from model space to display space.
#[derive(Clone, Debug)]
pub struct ViewTransform {
    pub decomposed: Decomposed2,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransformError {
    /// Scale has collapsed to zero, so display points can't be mapped back.
    #[error("uninvertable")]
    Uninvertable,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            decomposed: Decomposed2::one(),
        }
    }
}

fn to_cg(pt: Point) -> cgmath::Point2<f32> {
    cgmath::Point2 { x: pt.x, y: pt.y }
}
fn from_cg(pt: cgmath::Point2<f32>) -> Point {
    Point::new(pt.x, pt.y)
}

impl ViewTransform {
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.decomposed.scale
    }
    /// Scale about this display point, which stays put on screen.
    pub fn scale_about(&mut self, view_center: Point, scale_by: f32) {
        let view_center = to_cg(view_center).to_vec();
        let local_center = view_center - self.decomposed.disp;
        self.decomposed.scale *= scale_by;
        self.decomposed.disp = view_center - (local_center * scale_by);
    }
    /// Rotate about this display point, which stays put on screen.
    pub fn rotate_about(&mut self, view_center: Point, radians: f32) {
        let view_center = to_cg(view_center).to_vec();
        let rotate = cgmath::Basis2::from_angle(cgmath::Rad(radians));
        let local_center = rotate.rotate_vector(view_center - self.decomposed.disp);
        self.decomposed.rot = rotate * self.decomposed.rot;
        self.decomposed.disp = view_center - local_center;
    }
    /// Pan by this displacement in display pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.decomposed.disp += cgmath::vec2(dx, dy);
    }
    /// Model to display.
    #[must_use]
    pub fn project(&self, model: Point) -> Point {
        from_cg(self.decomposed.transform_point(to_cg(model)))
    }
    /// Display to model.
    pub fn unproject(&self, display: Point) -> Result<Point, TransformError> {
        Ok(from_cg(
            self.decomposed
                .inverse_transform()
                .ok_or(TransformError::Uninvertable)?
                .transform_point(to_cg(display)),
        ))
    }
    /// Bounds, in display space, of a model rect. Rotated views give the bounds of the rotated corners.
    #[must_use]
    pub fn project_rect(&self, model: &Rect) -> Rect {
        if model.is_null() {
            return Rect::NULL;
        }
        Rect::from_points(&model.corners().map(|corner| self.project(corner)))
    }
    pub fn unproject_rect(&self, display: &Rect) -> Result<Rect, TransformError> {
        if display.is_null() {
            return Ok(Rect::NULL);
        }
        let mut corners = [Point::ORIGIN; 4];
        for (dst, src) in corners.iter_mut().zip(display.corners()) {
            *dst = self.unproject(src)?;
        }
        Ok(Rect::from_points(&corners))
    }
    /// A transform showing `model` centered within a `view_width` x `view_height` display, keeping the
    /// current rotation. None if either is empty or the result would be vanishingly small.
    #[must_use]
    pub fn fit(&self, model: &Rect, view_width: f32, view_height: f32) -> Option<Self> {
        if model.is_null() {
            return None;
        }
        let rot = self.decomposed.rot;
        // Extent of the model once rotated.
        let half = cgmath::vec2(model.width() / 2.0, model.height() / 2.0);
        let a = rot.rotate_vector(half);
        let b = rot.rotate_vector(cgmath::vec2(-half.x, half.y));
        let rotated = cgmath::vec2(a.x.abs().max(b.x.abs()), a.y.abs().max(b.y.abs())) * 2.0;

        let avail = cgmath::vec2(view_width - 2.0 * MARGIN, view_height - 2.0 * MARGIN);
        // Degenerate content fits at any scale, so keep the current one.
        let scale_x = if rotated.x > f32::EPSILON { avail.x / rotated.x } else { f32::INFINITY };
        let scale_y = if rotated.y > f32::EPSILON { avail.y / rotated.y } else { f32::INFINITY };
        let mut scale = scale_x.min(scale_y);
        if scale.is_infinite() {
            scale = self.decomposed.scale;
        }
        if scale.is_nan() || scale < MIN_SCALE {
            return None;
        }
        let view_center = cgmath::vec2(view_width / 2.0, view_height / 2.0);
        let model_center = to_cg(model.center()).to_vec();
        Some(Self {
            decomposed: Decomposed2 {
                scale,
                rot,
                disp: view_center - rot.rotate_vector(model_center) * scale,
            },
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_through_display() {
        let mut xform = ViewTransform::default();
        xform.scale_about(Point::new(100.0, 100.0), 2.0);
        xform.rotate_about(Point::new(50.0, 0.0), 0.4);
        xform.pan(3.0, -7.0);

        let model = Point::new(12.5, -3.0);
        let back = xform.unproject(xform.project(model)).unwrap();
        assert!(back.approx_eq(model, 1e-3));

        // The pivot of a scale stays put.
        let before = xform.unproject(Point::new(20.0, 20.0)).unwrap();
        xform.scale_about(Point::new(20.0, 20.0), 3.0);
        let after = xform.unproject(Point::new(20.0, 20.0)).unwrap();
        assert!(before.approx_eq(after, 1e-3));
    }
    #[test]
    fn fit_centers_content() {
        let model = Rect::from_corners(Point::new(0.0, 0.0), Point::new(100.0, 50.0));
        let xform = ViewTransform::default().fit(&model, 216.0, 516.0).unwrap();
        assert!((xform.scale() - 2.0).abs() < 1e-5);
        assert!(xform.project(model.center()).approx_eq(Point::new(108.0, 258.0), 1e-3));
        assert!(ViewTransform::default().fit(&Rect::NULL, 100.0, 100.0).is_none());
        assert!(ViewTransform::default().fit(&model, 10.0, 10.0).is_none());
    }
    #[test]
    fn collapsed_scale_is_an_error() {
        let mut xform = ViewTransform::default();
        xform.scale_about(Point::ORIGIN, 0.0);
        assert_eq!(xform.unproject(Point::ORIGIN), Err(TransformError::Uninvertable));
    }
}
