use super::{Command, CommandContext, CommandName, ContextAction, Edit};
use crate::{
    geom::{Point, Rect, Vector},
    shape::{RectShape, Shape, ShapeFlags, ShapeID, INVALID_SHAPE_ID},
};

/// How far clones land from their originals.
const CLONE_OFFSET: Vector = Vector::new(10.0, 10.0);

#[derive(Copy, Clone, Debug)]
enum Drag {
    /// Moving every selected, unlocked shape.
    Move { start: Point },
    /// Dragging one handle of a single selected shape.
    Handle { id: ShapeID, handle: usize },
    /// Rubber-band selection.
    Box { start: Point },
}

/// Pick, move, and reshape existing shapes.
#[derive(Default)]
pub struct SelectCommand {
    selection: smallvec::SmallVec<[ShapeID; 8]>,
    drag: Option<Drag>,
    /// Edited copies of the selection, or the rubber band.
    preview: Vec<Shape>,
}

impl SelectCommand {
    /// Selected shapes that still exist and may be edited.
    fn editable<'doc>(&self, cx: &CommandContext<'doc>) -> Vec<&'doc Shape> {
        self.selection
            .iter()
            .filter_map(|&id| cx.doc.get(id))
            .filter(|shape| !shape.is_locked())
            .collect()
    }
    /// A non-fixed handle of the only selected shape, near `pt`.
    fn handle_at(&self, cx: &CommandContext<'_>, pt: Point) -> Option<(ShapeID, usize)> {
        let [id] = self.selection.as_slice() else {
            return None;
        };
        let shape = cx.doc.get(*id).filter(|shape| !shape.is_locked())?;
        (0..shape.handle_count())
            .filter(|&handle| !shape.is_handle_fixed(handle))
            .map(|handle| (handle, shape.handle_point(handle).distance_to(pt)))
            .filter(|&(_, distance)| distance <= cx.hit_tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(handle, _)| (*id, handle))
    }
    fn update_preview(&mut self, cx: &CommandContext<'_>, pt: Point) {
        match self.drag {
            None => (),
            Some(Drag::Move { start }) => {
                let delta = pt - start;
                self.preview = self
                    .editable(cx)
                    .into_iter()
                    .map(|shape| {
                        let mut moved = shape.clone();
                        moved.offset(delta);
                        moved
                    })
                    .collect();
            }
            Some(Drag::Handle { id, handle }) => {
                self.preview.clear();
                if let Some(shape) = cx.doc.get(id) {
                    let mut edited = shape.clone();
                    edited.set_handle_point(handle, pt, cx.snap_tolerance);
                    self.preview.push(edited);
                }
            }
            Some(Drag::Box { start }) => {
                let band = Rect::from_corners(start, pt);
                match self.preview.first_mut() {
                    Some(shape) => {
                        for (i, corner) in band.corners().into_iter().enumerate() {
                            shape.set_point(i, corner);
                        }
                    }
                    None => self.preview.push(Shape::new(Box::new(RectShape::from_rect(band)))),
                }
            }
        }
    }
    /// Set or clear `flag` on the whole selection, committing the edited shapes.
    fn toggle_flag(&mut self, cx: &mut CommandContext<'_>, flag: ShapeFlags) -> bool {
        let selected: Vec<&Shape> = self.selection.iter().filter_map(|&id| cx.doc.get(id)).collect();
        if selected.is_empty() {
            return false;
        }
        let set = selected.iter().any(|shape| !shape.flags().contains(flag));
        let edited = selected
            .into_iter()
            .map(|shape| {
                let mut shape = shape.clone();
                let mut flags = shape.flags();
                flags.set(flag, set);
                shape.set_flags(flags);
                shape
            })
            .collect();
        cx.commit(Edit::Merge(edited));
        true
    }
}

impl Command for SelectCommand {
    fn name(&self) -> CommandName {
        CommandName::Select
    }
    /// A comma-separated list of ids to start with selected.
    fn set_params(&mut self, params: &str) -> bool {
        let params = params.trim();
        if params.is_empty() {
            return true;
        }
        let ids: Result<smallvec::SmallVec<[ShapeID; 8]>, _> =
            params.split(',').map(|id| id.trim().parse::<ShapeID>()).collect();
        match ids {
            Ok(ids) => {
                self.selection = ids;
                true
            }
            Err(e) => {
                log::warn!("bad select parameters {params:?}: {e}");
                false
            }
        }
    }
    fn touch_began(&mut self, cx: &mut CommandContext<'_>, pt: Point) -> bool {
        if let Some((id, handle)) = self.handle_at(cx, pt) {
            self.drag = Some(Drag::Handle { id, handle });
        } else if let Some((id, _)) = cx.doc.find_by_point(pt, cx.hit_tolerance) {
            if !self.selection.contains(&id) {
                self.selection.clear();
                self.selection.push(id);
            }
            self.drag = Some(Drag::Move { start: pt });
        } else {
            self.selection.clear();
            self.drag = Some(Drag::Box { start: pt });
        }
        self.update_preview(cx, pt);
        true
    }
    fn touch_moved(&mut self, cx: &mut CommandContext<'_>, pt: Point) -> bool {
        if self.drag.is_none() {
            return false;
        }
        self.update_preview(cx, pt);
        true
    }
    fn touch_ended(&mut self, cx: &mut CommandContext<'_>, pt: Point) -> bool {
        let Some(drag) = self.drag else {
            return false;
        };
        self.update_preview(cx, pt);
        let preview = std::mem::take(&mut self.preview);
        self.drag = None;
        match drag {
            Drag::Move { start } => {
                // A click without movement only selects.
                if pt != start && !preview.is_empty() {
                    cx.commit(Edit::Merge(preview));
                }
            }
            Drag::Handle { .. } => {
                if !preview.is_empty() {
                    cx.commit(Edit::Merge(preview));
                }
            }
            Drag::Box { start } => {
                self.selection = cx.doc.shapes_in_box(&Rect::from_corners(start, pt));
            }
        }
        true
    }
    fn touch_cancelled(&mut self) {
        self.drag = None;
        self.preview.clear();
    }
    fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }
    fn dynamic_shapes(&self) -> &[Shape] {
        &self.preview
    }
    fn selection(&self) -> &[ShapeID] {
        &self.selection
    }
    fn context_action(&mut self, cx: &mut CommandContext<'_>, action: ContextAction) -> bool {
        if self.is_dragging() {
            return false;
        }
        match action {
            ContextAction::SelectAll => {
                self.selection = cx
                    .doc
                    .iter()
                    .filter(|shape| !shape.is_hidden())
                    .map(Shape::id)
                    .collect();
                true
            }
            ContextAction::SelectNone => {
                self.selection.clear();
                true
            }
            ContextAction::Delete => {
                let doomed: smallvec::SmallVec<[ShapeID; 4]> =
                    self.editable(cx).into_iter().map(Shape::id).collect();
                if doomed.is_empty() {
                    return false;
                }
                self.selection.retain(|id| !doomed.contains(id));
                cx.commit(Edit::Remove(doomed));
                true
            }
            ContextAction::Clone => {
                let clones: Vec<Shape> = self
                    .selection
                    .iter()
                    .filter_map(|&id| cx.doc.get(id))
                    .map(|shape| {
                        let mut clone = shape.clone();
                        clone.set_id(INVALID_SHAPE_ID);
                        clone.set_flags(clone.flags() - ShapeFlags::LOCKED);
                        clone.offset(CLONE_OFFSET);
                        clone
                    })
                    .collect();
                if clones.is_empty() {
                    return false;
                }
                // The clones get their ids on commit.
                self.selection.clear();
                cx.commit(Edit::Merge(clones));
                true
            }
            ContextAction::Lock => self.toggle_flag(cx, ShapeFlags::LOCKED),
            ContextAction::Hide => self.toggle_flag(cx, ShapeFlags::HIDDEN),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{document::ShapeDocument, factory::ShapeFactory, shape::Line};

    fn doc_with_line() -> (ShapeDocument, ShapeID) {
        let mut doc = ShapeDocument::new();
        let id = doc.add_shape(Shape::new(Box::new(Line::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0)))));
        (doc, id)
    }

    #[test]
    fn click_selects_drag_moves() {
        let (doc, id) = doc_with_line();
        let factory = ShapeFactory::default();
        let mut cx = CommandContext::new(&doc, &factory);
        let mut command = SelectCommand::default();

        command.touch_began(&mut cx, Point::new(50.0, 1.0));
        command.touch_ended(&mut cx, Point::new(50.0, 1.0));
        assert_eq!(command.selection(), &[id]);
        assert!(cx.edits.is_empty());

        command.touch_began(&mut cx, Point::new(50.0, 1.0));
        command.touch_moved(&mut cx, Point::new(50.0, 11.0));
        assert_eq!(command.dynamic_shapes()[0].point(0), Point::new(0.0, 10.0));
        command.touch_ended(&mut cx, Point::new(50.0, 21.0));
        let [Edit::Merge(shapes)] = cx.edits.as_slice() else {
            panic!("expected one merge");
        };
        assert_eq!(shapes[0].id(), id);
        assert_eq!(shapes[0].point(1), Point::new(100.0, 20.0));
    }
    #[test]
    fn handle_drag_and_fixed_midpoint() {
        let (doc, id) = doc_with_line();
        let factory = ShapeFactory::default();
        let mut cx = CommandContext::new(&doc, &factory);
        let mut command = SelectCommand::default();
        assert!(command.set_params(&id.to_string()));

        // Near the end point: reshapes.
        command.touch_began(&mut cx, Point::new(99.0, 0.0));
        command.touch_ended(&mut cx, Point::new(100.0, 50.0));
        let [Edit::Merge(shapes)] = cx.edits.as_slice() else {
            panic!("expected one merge");
        };
        assert_eq!(shapes[0].point(0), Point::new(0.0, 0.0));
        assert_eq!(shapes[0].point(1), Point::new(100.0, 50.0));

        // On the midpoint marker: the whole line moves instead.
        cx.edits.clear();
        command.touch_began(&mut cx, Point::new(50.0, 0.0));
        command.touch_ended(&mut cx, Point::new(50.0, 5.0));
        let [Edit::Merge(shapes)] = cx.edits.as_slice() else {
            panic!("expected one merge");
        };
        assert_eq!(shapes[0].point(0), Point::new(0.0, 5.0));
    }
    #[test]
    fn rubber_band() {
        let (mut doc, line) = doc_with_line();
        let dot = doc.add_shape(Shape::new(Box::new(crate::shape::Dot::new(Point::new(200.0, 200.0)))));
        let factory = ShapeFactory::default();
        let mut cx = CommandContext::new(&doc, &factory);
        let mut command = SelectCommand::default();

        command.touch_began(&mut cx, Point::new(150.0, 150.0));
        assert_eq!(command.dynamic_shapes().len(), 1);
        command.touch_ended(&mut cx, Point::new(250.0, 250.0));
        assert_eq!(command.selection(), &[dot]);
        assert!(command.dynamic_shapes().is_empty());

        assert!(command.context_action(&mut cx, ContextAction::SelectAll));
        assert_eq!(command.selection(), &[line, dot]);
    }
    #[test]
    fn locked_shapes_stay_put() {
        let (mut doc, id) = doc_with_line();
        doc.modify(id, |shape| shape.set_flags(ShapeFlags::LOCKED));
        let factory = ShapeFactory::default();
        let mut cx = CommandContext::new(&doc, &factory);
        let mut command = SelectCommand::default();
        command.set_params(&id.to_string());

        assert!(!command.context_action(&mut cx, ContextAction::Delete));
        command.touch_began(&mut cx, Point::new(50.0, 0.0));
        command.touch_ended(&mut cx, Point::new(80.0, 30.0));
        assert!(cx.edits.is_empty());

        // Unlock, then delete.
        assert!(command.context_action(&mut cx, ContextAction::Lock));
        let [Edit::Merge(shapes)] = cx.edits.as_slice() else {
            panic!("expected one merge");
        };
        assert!(!shapes[0].is_locked());
    }
    #[test]
    fn clone_resets_ids() {
        let (doc, id) = doc_with_line();
        let factory = ShapeFactory::default();
        let mut cx = CommandContext::new(&doc, &factory);
        let mut command = SelectCommand::default();
        command.set_params(&id.to_string());
        assert!(command.context_action(&mut cx, ContextAction::Clone));
        let [Edit::Merge(shapes)] = cx.edits.as_slice() else {
            panic!("expected one merge");
        };
        assert_eq!(shapes[0].id(), INVALID_SHAPE_ID);
        assert_eq!(shapes[0].point(0), Point::new(10.0, 10.0));
        assert!(!command.set_params("1,x"));
    }
}
