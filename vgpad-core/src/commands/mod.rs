//! # Commands
//!
//! A command turns pointer gestures into edits. While a gesture is in progress the command owns a set of
//! *dynamic* shapes, previews that aren't part of the document. When it finishes, the command hands back
//! [`Edit`]s and the controller commits them. A cancelled gesture just drops the previews.
//!
//! Commands never touch the document directly. They read the front document through [`CommandContext`] and
//! describe what they want changed, so that every commit goes through the same publish, undo, and record
//! path.

mod draw;
mod select;

pub use draw::DrawCommand;
pub use select::SelectCommand;

use crate::{
    context::Context,
    document::ShapeDocument,
    factory::{BuiltinKind, ShapeFactory},
    geom::Point,
    shape::{Shape, ShapeID},
};

/// Names accepted by [`create`].
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, Debug, strum::EnumIter, strum::EnumString, strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum CommandName {
    Select,
    Line,
    Rect,
    Dot,
}
impl CommandName {
    /// Commands that create shapes, in the order [`CommandName::next_drawing`] cycles through them.
    pub const DRAWING: [Self; 3] = [Self::Line, Self::Rect, Self::Dot];

    /// The drawing command after this one. From a non-drawing command, the first drawing command.
    #[must_use]
    pub fn next_drawing(self) -> Self {
        let pos = Self::DRAWING.iter().position(|name| *name == self);
        match pos {
            Some(pos) => Self::DRAWING[(pos + 1) % Self::DRAWING.len()],
            None => Self::DRAWING[0],
        }
    }
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Integer-coded actions offered on the current selection.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, strum::FromRepr, strum::EnumIter)]
#[repr(i32)]
pub enum ContextAction {
    SelectAll = 1,
    SelectNone = 2,
    Delete = 3,
    Clone = 4,
    /// Lock the selection if any of it is unlocked, otherwise unlock it.
    Lock = 5,
    /// Hide the selection if any of it is visible, otherwise show it.
    Hide = 6,
}

/// A change a command asks the controller to commit.
#[derive(Clone, Debug, PartialEq)]
pub enum Edit {
    /// Shapes whose id is in the document replace it in place, the rest are added on top.
    Merge(Vec<Shape>),
    Remove(smallvec::SmallVec<[ShapeID; 4]>),
}

/// Read access to the world, and a place to put edits.
pub struct CommandContext<'a> {
    pub doc: &'a ShapeDocument,
    pub factory: &'a ShapeFactory,
    /// Style for newly drawn shapes.
    pub style: Context,
    /// Pick distance, in model units.
    pub hit_tolerance: f32,
    /// Distance under which points snap together, in model units.
    pub snap_tolerance: f32,
    pub edits: Vec<Edit>,
}
impl<'a> CommandContext<'a> {
    #[must_use]
    pub fn new(doc: &'a ShapeDocument, factory: &'a ShapeFactory) -> Self {
        Self {
            doc,
            factory,
            style: Context::default(),
            hit_tolerance: 4.0,
            snap_tolerance: 2.0,
            edits: Vec::new(),
        }
    }
    pub fn commit(&mut self, edit: Edit) {
        self.edits.push(edit);
    }
}

/// A named, stateful gesture handler. Points are in model space.
///
/// The `touch_*` methods return whether anything changed, either the dynamic shapes or the edits.
pub trait Command: Send {
    fn name(&self) -> CommandName;
    /// Configure from the string passed alongside the name. False if the parameters are not understood.
    fn set_params(&mut self, _params: &str) -> bool {
        true
    }
    fn touch_began(&mut self, cx: &mut CommandContext<'_>, pt: Point) -> bool;
    fn touch_moved(&mut self, cx: &mut CommandContext<'_>, pt: Point) -> bool;
    fn touch_ended(&mut self, cx: &mut CommandContext<'_>, pt: Point) -> bool;
    /// Abandon the gesture in progress, dropping any previews.
    fn touch_cancelled(&mut self);
    /// In the middle of a gesture.
    fn is_dragging(&self) -> bool;
    /// Whether another command may take over now.
    fn can_interrupt(&self) -> bool {
        !self.is_dragging()
    }
    /// Uncommitted previews, drawn on top of the document.
    fn dynamic_shapes(&self) -> &[Shape];
    fn selection(&self) -> &[ShapeID] {
        &[]
    }
    /// False if the action doesn't apply to this command or the current selection.
    fn context_action(&mut self, _cx: &mut CommandContext<'_>, _action: ContextAction) -> bool {
        false
    }
}

/// Construct a command by name, or None if the name is unknown.
#[must_use]
pub fn create(name: &str) -> Option<Box<dyn Command>> {
    let name: CommandName = name.parse().ok()?;
    let command: Box<dyn Command> = match name {
        CommandName::Select => Box::new(SelectCommand::default()),
        CommandName::Line => Box::new(DrawCommand::new(CommandName::Line, BuiltinKind::Line)),
        CommandName::Rect => Box::new(DrawCommand::new(CommandName::Rect, BuiltinKind::Rect)),
        CommandName::Dot => Box::new(DrawCommand::new(CommandName::Dot, BuiltinKind::Dot)),
    };
    Some(command)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_name_creates() {
        for name in <CommandName as strum::IntoEnumIterator>::iter() {
            let command = create(name.as_str()).unwrap();
            assert_eq!(command.name(), name);
            assert!(command.can_interrupt());
            assert!(command.dynamic_shapes().is_empty());
        }
        assert!(create("splines").is_none());
    }
    #[test]
    fn drawing_cycle() {
        assert_eq!(CommandName::Select.next_drawing(), CommandName::Line);
        assert_eq!(CommandName::Line.next_drawing(), CommandName::Rect);
        assert_eq!(CommandName::Dot.next_drawing(), CommandName::Line);
    }
    #[test]
    fn action_codes() {
        assert_eq!(ContextAction::from_repr(3), Some(ContextAction::Delete));
        assert_eq!(ContextAction::from_repr(0), None);
    }
}
