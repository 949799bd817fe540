use std::sync::Arc;

use super::{CoreView, EditState};
use crate::{
    document::ShapeDocument,
    shape::{Shape, ShapeID},
    snapshot::Snapshot,
};

/// What a publish does to the undo history.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(super) enum History {
    /// Record the new document as a step, if undo recording is on.
    Record,
    /// Leave the history alone. Undo, redo, and playback.
    Skip,
    /// Start the history over from the new document. Loads.
    Reset,
}

/// Exclusive edit access to a view's document and dynamic shapes.
///
/// Changes are made on private copies, taken the first time each is mutated. Readers keep seeing the last
/// published versions until the writer drops, at which point both are swapped in at once, and the new
/// document is handed to the undo history and the recorder.
pub struct DocumentWriter<'a> {
    pub(super) view: &'a CoreView,
    pub(super) state: parking_lot::MutexGuard<'a, EditState>,
    base_doc: Arc<ShapeDocument>,
    base_dynamic: Arc<Vec<Shape>>,
    doc: Option<ShapeDocument>,
    dynamic: Option<Vec<Shape>>,
    appended: smallvec::SmallVec<[ShapeID; 4]>,
    /// Whether every document change so far only added shapes on top.
    only_appended: bool,
    history: History,
}
// Leaking a writer leaks the edit lock with it, so the view stops accepting edits but never shows a torn
// state.
impl Drop for DocumentWriter<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            // Half an edit is worse than none.
            log::error!("edit abandoned by panic, nothing published");
            return;
        }
        let state = &mut *self.state;
        if let Some(doc) = self.doc.take() {
            let doc = Arc::new(doc);
            {
                // Under the write lock, so no `CoreView::mark_drawn` lands on the old version after the carry.
                let mut front = self.view.front.write();
                doc.carry_draw_count(&front);
                *front = doc.clone();
            }
            log::trace!("published document, change {}", doc.change_count());

            match self.history {
                History::Record if state.undo_recording => state.undo.record(Snapshot::of_document(&doc)),
                History::Record | History::Skip => (),
                History::Reset => state.undo.reset(Snapshot::of_document(&doc)),
            }
            if let Some(recorder) = state.recorder.as_mut() {
                let appended = if self.only_appended { &self.appended[..] } else { &[] };
                if let Err(e) = recorder.record_document(&doc, appended) {
                    log::error!("recording stopped, failed to write frame: {e}");
                    state.recorder = None;
                }
            }
        }
        if let Some(dynamic) = self.dynamic.take() {
            if let Some(recorder) = state.recorder.as_mut() {
                if let Err(e) = recorder.record_dynamic(&dynamic) {
                    log::error!("recording stopped, failed to write frame: {e}");
                    state.recorder = None;
                }
            }
            *self.view.dynamic.write() = Arc::new(dynamic);
        }
    }
}
impl<'a> DocumentWriter<'a> {
    pub(super) fn new(view: &'a CoreView, history: History) -> Self {
        let state = view.edit.lock();
        // Only writers publish, and we hold the edit lock, so these stay current for our lifetime.
        let base_doc = view.front.read().clone();
        let base_dynamic = view.dynamic.read().clone();
        Self {
            view,
            state,
            base_doc,
            base_dynamic,
            doc: None,
            dynamic: None,
            appended: smallvec::SmallVec::new(),
            only_appended: true,
            history,
        }
    }
    /// The document as this writer currently sees it, including its own unpublished changes.
    #[must_use]
    pub fn doc(&self) -> &ShapeDocument {
        self.doc.as_ref().unwrap_or(&self.base_doc)
    }
    /// The last published document, without this writer's changes.
    #[must_use]
    pub fn published_doc(&self) -> Arc<ShapeDocument> {
        self.base_doc.clone()
    }
    fn pending_doc(&mut self) -> &mut ShapeDocument {
        let base = &self.base_doc;
        self.doc.get_or_insert_with(|| (**base).clone())
    }
    /// Mutable access to the document. Any change made through here is recorded as a full-document frame.
    pub fn doc_mut(&mut self) -> &mut ShapeDocument {
        self.only_appended = false;
        self.pending_doc()
    }
    /// Commit new and edited shapes as one change. See [`ShapeDocument::merge_shapes`]. Returns the ids of
    /// the shapes added on top.
    pub fn merge(&mut self, shapes: Vec<Shape>) -> smallvec::SmallVec<[ShapeID; 4]> {
        let (replaced, appended) = self.pending_doc().merge_shapes(shapes);
        if replaced > 0 {
            self.only_appended = false;
        }
        self.appended.extend_from_slice(&appended);
        appended
    }
    /// Remove shapes as one change, locked or not. Returns how many were found.
    pub fn remove(&mut self, ids: &[ShapeID]) -> usize {
        self.doc_mut().remove_shapes(ids)
    }
    /// Replace the whole content, keeping id allocation and counters moving forward.
    pub fn replace_document(&mut self, doc: ShapeDocument) {
        self.doc_mut().replace_contents(doc);
    }
    /// The dynamic shapes as this writer currently sees them.
    #[must_use]
    pub fn dynamic(&self) -> &[Shape] {
        self.dynamic.as_deref().unwrap_or(&self.base_dynamic)
    }
    pub fn dynamic_mut(&mut self) -> &mut Vec<Shape> {
        let base = &self.base_dynamic;
        self.dynamic.get_or_insert_with(|| (**base).clone())
    }
    pub fn set_dynamic(&mut self, shapes: Vec<Shape>) {
        self.dynamic = Some(shapes);
    }
    /// Whether dropping this writer will publish anything.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.doc.is_some() || self.dynamic.is_some()
    }
    /// Throw away every change made through this writer.
    pub fn discard(&mut self) {
        self.doc = None;
        self.dynamic = None;
        self.appended.clear();
        self.only_appended = true;
    }
    /// Install a document built elsewhere from the published one, as is.
    pub(super) fn install(&mut self, doc: ShapeDocument) {
        self.only_appended = false;
        self.doc = Some(doc);
    }
}

#[cfg(test)]
mod test {
    use crate::{
        geom::Point,
        shape::{Dot, Shape},
        view::CoreView,
    };

    fn dot(x: f32) -> Shape {
        Shape::new(Box::new(Dot::new(Point::new(x, 0.0))))
    }

    #[test]
    fn publishes_on_drop_only() {
        let view = CoreView::default();
        {
            let mut writer = view.playing_doc_for_edit();
            writer.merge(vec![dot(1.0)]);
            writer.set_dynamic(vec![dot(2.0)]);
            assert_eq!(writer.doc().shape_count(), 1);
            // Readers still see the old versions. The front lock is free while a writer works.
            assert_eq!(view.front.read().shape_count(), 0);
            assert!(view.dynamic.read().is_empty());
        }
        assert_eq!(view.get_shape_count(), 1);
        assert_eq!(view.dynamic_shapes().len(), 1);
    }
    #[test]
    fn discard_publishes_nothing() {
        let view = CoreView::default();
        let before = view.get_change_count();
        {
            let mut writer = view.playing_doc_for_edit();
            writer.merge(vec![dot(1.0)]);
            writer.discard();
            assert!(!writer.changed());
        }
        assert_eq!(view.get_change_count(), before);
        assert_eq!(view.get_shape_count(), 0);
    }
    #[test]
    fn draw_count_survives_publish() {
        let view = CoreView::default();
        view.mark_drawn();
        view.mark_drawn();
        view.playing_doc_for_edit().merge(vec![dot(1.0)]);
        assert_eq!(view.get_draw_count(), 2);
    }
}
