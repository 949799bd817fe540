//! # Undo history
//!
//! Linear history of whole-document snapshots. State `0` is the base the history started from, state `n` is
//! the document after the `n`th recorded edit. The position names the state the document is currently in.
//!
//! Restoration is done by the caller through a closure, and the position only moves if that succeeds - a
//! snapshot that fails to load leaves both the document and the history where they were.

use crate::snapshot::Snapshot;

#[derive(Clone, Debug)]
pub struct UndoRecorder {
    base: Snapshot,
    steps: Vec<Snapshot>,
    position: usize,
    /// Maximum number of steps kept, `None` for unbounded.
    limit: Option<usize>,
}
impl UndoRecorder {
    /// Start a history at `base`.
    #[must_use]
    pub fn new(base: Snapshot, limit: Option<usize>) -> Self {
        Self {
            base,
            steps: Vec::new(),
            position: 0,
            limit,
        }
    }
    /// Forget all steps, restarting from `base`.
    pub fn reset(&mut self, base: Snapshot) {
        self.base = base;
        self.steps.clear();
        self.position = 0;
    }
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.position > 0
    }
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.position < self.steps.len()
    }
    /// How many steps are currently applied.
    #[must_use]
    pub fn redo_index(&self) -> usize {
        self.position
    }
    /// How many steps exist in total, applied or not.
    #[must_use]
    pub fn redo_count(&self) -> usize {
        self.steps.len()
    }
    /// The snapshot matching the current position.
    #[must_use]
    pub fn current(&self) -> &Snapshot {
        self.state(self.position)
    }
    fn state(&self, position: usize) -> &Snapshot {
        match position.checked_sub(1) {
            None => &self.base,
            Some(idx) => &self.steps[idx],
        }
    }
    /// Record the state after an edit. Any undone steps are discarded.
    pub fn record(&mut self, snapshot: Snapshot) {
        if self.can_redo() {
            log::trace!(
                "discarding {} undone step(s)",
                self.steps.len() - self.position
            );
        }
        self.steps.truncate(self.position);
        self.steps.push(snapshot);
        self.position += 1;

        if let Some(limit) = self.limit {
            let excess = self.steps.len().saturating_sub(limit);
            if excess > 0 {
                // The oldest surviving state becomes the new base.
                let mut folded = self.steps.drain(..excess);
                if let Some(base) = folded.next_back() {
                    self.base = base;
                }
                drop(folded);
                self.position -= excess;
            }
        }
    }
    /// Step back one edit, restoring through `restore`. `Ok(false)` if there was nothing to undo.
    pub fn undo_with<E>(&mut self, restore: impl FnOnce(&Snapshot) -> Result<(), E>) -> Result<bool, E> {
        if !self.can_undo() {
            return Ok(false);
        }
        restore(self.state(self.position - 1))?;
        self.position -= 1;
        Ok(true)
    }
    /// Step forward one edit, restoring through `restore`. `Ok(false)` if there was nothing to redo.
    pub fn redo_with<E>(&mut self, restore: impl FnOnce(&Snapshot) -> Result<(), E>) -> Result<bool, E> {
        if !self.can_redo() {
            return Ok(false);
        }
        restore(self.state(self.position + 1))?;
        self.position += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        document::ShapeDocument,
        factory::ShapeFactory,
        geom::Point,
        shape::{Dot, Shape},
        storage::LoadError,
    };

    #[allow(clippy::cast_precision_loss)]
    fn dot_doc(count: usize) -> ShapeDocument {
        let mut doc = ShapeDocument::new();
        for i in 0..count {
            doc.add_shape(Shape::new(Box::new(Dot::new(Point::new(i as f32, 0.0)))));
        }
        doc
    }

    #[test]
    fn undo_redo_symmetry() {
        let factory = ShapeFactory::default();
        let mut undo = UndoRecorder::new(Snapshot::of_document(&dot_doc(0)), None);
        for n in 1..=4 {
            undo.record(Snapshot::of_document(&dot_doc(n)));
        }
        assert!(undo.can_undo());
        assert!(!undo.can_redo());
        assert_eq!(undo.redo_count(), 4);

        let mut doc = dot_doc(4);
        let mut restore = |snap: &Snapshot| -> Result<(), LoadError> {
            doc = snap.document(&factory)?;
            Ok(())
        };
        while undo.undo_with(&mut restore).unwrap() {}
        assert_eq!(undo.redo_index(), 0);
        while undo.redo_with(&mut restore).unwrap() {}
        assert_eq!(undo.redo_index(), 4);
        assert_eq!(doc, dot_doc(4));
    }
    #[test]
    fn record_truncates_tail() {
        let mut undo = UndoRecorder::new(Snapshot::of_document(&dot_doc(0)), None);
        undo.record(Snapshot::of_document(&dot_doc(1)));
        undo.record(Snapshot::of_document(&dot_doc(2)));
        undo.undo_with(|_| Ok::<_, ()>(())).unwrap();
        assert!(undo.can_redo());
        undo.record(Snapshot::of_document(&dot_doc(3)));
        assert!(!undo.can_redo());
        assert_eq!(undo.redo_count(), 2);
        assert_eq!(undo.current(), &Snapshot::of_document(&dot_doc(3)));
    }
    #[test]
    fn failed_restore_keeps_position() {
        let mut undo = UndoRecorder::new(Snapshot::of_document(&dot_doc(0)), None);
        undo.record(Snapshot::of_document(&dot_doc(1)));
        assert_eq!(undo.undo_with(|_| Err("corrupt")), Err("corrupt"));
        assert_eq!(undo.redo_index(), 1);
    }
    #[test]
    fn limit_folds_into_base() {
        let mut undo = UndoRecorder::new(Snapshot::of_document(&dot_doc(0)), Some(2));
        for n in 1..=5 {
            undo.record(Snapshot::of_document(&dot_doc(n)));
        }
        assert_eq!(undo.redo_count(), 2);
        assert_eq!(undo.redo_index(), 2);
        undo.undo_with(|_| Ok::<_, ()>(())).unwrap();
        undo.undo_with(|_| Ok::<_, ()>(())).unwrap();
        assert!(!undo.can_undo());
        assert_eq!(undo.current(), &Snapshot::of_document(&dot_doc(3)));
    }
}
