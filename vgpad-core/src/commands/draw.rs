use super::{Command, CommandContext, CommandName, Edit};
use crate::{
    document::ShapeDocument,
    factory::BuiltinKind,
    geom::{Point, Rect},
    shape::{HandleType, Shape},
};

/// Drag out a new shape from where the pointer went down to where it comes up.
pub struct DrawCommand {
    name: CommandName,
    kind: BuiltinKind,
    start: Point,
    /// The shape being drawn, present only mid-gesture.
    drawing: Option<Shape>,
}
impl DrawCommand {
    #[must_use]
    pub fn new(name: CommandName, kind: BuiltinKind) -> Self {
        Self {
            name,
            kind,
            start: Point::ORIGIN,
            drawing: None,
        }
    }
    /// Lay the shape out between the gesture start and `pt`.
    fn shape_to(&mut self, pt: Point) {
        let start = self.start;
        let kind = self.kind;
        let Some(shape) = self.drawing.as_mut() else {
            return;
        };
        match kind {
            BuiltinKind::Line => {
                shape.set_point(0, start);
                shape.set_point(1, pt);
            }
            BuiltinKind::Rect | BuiltinKind::Image => {
                for (i, corner) in Rect::from_corners(start, pt).corners().into_iter().enumerate() {
                    shape.set_point(i, corner);
                }
            }
            BuiltinKind::Dot => shape.set_point(0, pt),
        }
    }
    /// Too small to keep. Dots are always kept.
    fn is_degenerate(&self, shape: &Shape, tolerance: f32) -> bool {
        let extent = shape.extent();
        self.kind != BuiltinKind::Dot && extent.width().max(extent.height()) < tolerance
    }
}

/// The nearest vertex handle of a visible shape within `tolerance` of `pt`, or `pt` itself.
pub(super) fn snap_point(doc: &ShapeDocument, pt: Point, tolerance: f32) -> Point {
    let mut best = (tolerance, pt);
    for shape in doc.iter() {
        if shape.is_hidden() || !shape.extent().inflate(tolerance).contains_point(pt) {
            continue;
        }
        for handle in 0..shape.handle_count() {
            if shape.handle_type(handle) != HandleType::Vertex {
                continue;
            }
            let candidate = shape.handle_point(handle);
            let distance = candidate.distance_to(pt);
            if distance <= best.0 {
                best = (distance, candidate);
            }
        }
    }
    best.1
}

impl Command for DrawCommand {
    fn name(&self) -> CommandName {
        self.name
    }
    fn touch_began(&mut self, cx: &mut CommandContext<'_>, pt: Point) -> bool {
        let Some(shape) = cx.factory.create(self.kind.into()) else {
            log::warn!("no shape type registered for {:?}", self.kind);
            return false;
        };
        self.start = snap_point(cx.doc, pt, cx.snap_tolerance);
        self.drawing = Some(shape.with_context(cx.style));
        self.shape_to(self.start);
        true
    }
    fn touch_moved(&mut self, cx: &mut CommandContext<'_>, pt: Point) -> bool {
        if self.drawing.is_none() {
            return false;
        }
        self.shape_to(snap_point(cx.doc, pt, cx.snap_tolerance));
        true
    }
    fn touch_ended(&mut self, cx: &mut CommandContext<'_>, pt: Point) -> bool {
        if self.drawing.is_none() {
            return false;
        }
        self.shape_to(snap_point(cx.doc, pt, cx.snap_tolerance));
        let Some(shape) = self.drawing.take() else {
            return false;
        };
        if self.is_degenerate(&shape, cx.snap_tolerance) {
            log::debug!("dropping degenerate {}", shape.type_name());
        } else {
            cx.commit(Edit::Merge(vec![shape]));
        }
        true
    }
    fn touch_cancelled(&mut self) {
        self.drawing = None;
    }
    fn is_dragging(&self) -> bool {
        self.drawing.is_some()
    }
    fn dynamic_shapes(&self) -> &[Shape] {
        match &self.drawing {
            Some(shape) => std::slice::from_ref(shape),
            None => &[],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{factory::ShapeFactory, shape::INVALID_SHAPE_ID};

    #[test]
    fn drag_out_a_rect() {
        let doc = ShapeDocument::new();
        let factory = ShapeFactory::default();
        let mut cx = CommandContext::new(&doc, &factory);
        let mut command = DrawCommand::new(CommandName::Rect, BuiltinKind::Rect);

        assert!(command.touch_began(&mut cx, Point::new(10.0, 10.0)));
        assert!(command.touch_moved(&mut cx, Point::new(20.0, 15.0)));
        assert!(!command.can_interrupt());
        assert_eq!(command.dynamic_shapes().len(), 1);
        assert!(cx.edits.is_empty());

        assert!(command.touch_ended(&mut cx, Point::new(30.0, 40.0)));
        assert!(command.dynamic_shapes().is_empty());
        let [Edit::Merge(shapes)] = cx.edits.as_slice() else {
            panic!("expected one merge, got {:?}", cx.edits);
        };
        assert_eq!(shapes[0].id(), INVALID_SHAPE_ID);
        assert_eq!(
            shapes[0].extent(),
            Rect::from_corners(Point::new(10.0, 10.0), Point::new(30.0, 40.0))
        );
    }
    #[test]
    fn tiny_lines_are_dropped() {
        let doc = ShapeDocument::new();
        let factory = ShapeFactory::default();
        let mut cx = CommandContext::new(&doc, &factory);
        let mut command = DrawCommand::new(CommandName::Line, BuiltinKind::Line);
        command.touch_began(&mut cx, Point::new(0.0, 0.0));
        command.touch_ended(&mut cx, Point::new(0.5, 0.5));
        assert!(cx.edits.is_empty());

        // But a dot is a dot.
        let mut command = DrawCommand::new(CommandName::Dot, BuiltinKind::Dot);
        command.touch_began(&mut cx, Point::new(0.0, 0.0));
        command.touch_ended(&mut cx, Point::new(0.0, 0.0));
        assert_eq!(cx.edits.len(), 1);
    }
    #[test]
    fn endpoints_snap_to_vertices() {
        let mut doc = ShapeDocument::new();
        doc.add_shape(Shape::new(Box::new(crate::shape::Line::new(
            Point::new(0.0, 0.0),
            Point::new(50.0, 0.0),
        ))));
        let factory = ShapeFactory::default();
        let mut cx = CommandContext::new(&doc, &factory);
        let mut command = DrawCommand::new(CommandName::Line, BuiltinKind::Line);
        command.touch_began(&mut cx, Point::new(49.0, 1.0));
        command.touch_ended(&mut cx, Point::new(50.0, 30.0));
        let [Edit::Merge(shapes)] = cx.edits.as_slice() else {
            panic!("expected one merge");
        };
        assert_eq!(shapes[0].point(0), Point::new(50.0, 0.0));
    }
    #[test]
    fn cancel_drops_preview() {
        let doc = ShapeDocument::new();
        let factory = ShapeFactory::default();
        let mut cx = CommandContext::new(&doc, &factory);
        let mut command = DrawCommand::new(CommandName::Line, BuiltinKind::Line);
        command.touch_began(&mut cx, Point::new(0.0, 0.0));
        command.touch_moved(&mut cx, Point::new(10.0, 0.0));
        command.touch_cancelled();
        assert!(command.dynamic_shapes().is_empty());
        assert!(command.can_interrupt());
        assert!(cx.edits.is_empty());
    }
}
