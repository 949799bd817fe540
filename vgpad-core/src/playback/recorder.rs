use std::sync::Arc;

use super::{Frame, FrameError, FrameIndexEntry, FrameStore, Reverse};
use crate::{
    document::ShapeDocument,
    shape::{Shape, ShapeID},
    snapshot::{ChangeFlags, Snapshot},
};

/// Turns document and dynamic-shape changes into frames.
///
/// Keeps the last recorded state of both, which becomes the reverse payload of the next frame.
pub struct PlaybackRecorder {
    store: Arc<dyn FrameStore>,
    start: std::time::Instant,
    next_index: u32,
    last_tick: u32,
    last_document: Snapshot,
    last_dynamic: Snapshot,
}
impl PlaybackRecorder {
    /// Begin recording into `store`, writing `doc` as frame 0.
    pub fn start(store: Arc<dyn FrameStore>, doc: &ShapeDocument) -> Result<Self, FrameError> {
        let mut this = Self {
            store,
            start: std::time::Instant::now(),
            next_index: 0,
            last_tick: 0,
            last_document: Snapshot::of_document(&ShapeDocument::new()),
            last_dynamic: Snapshot::of_shapes(std::iter::empty(), ChangeFlags::DYN_CHANGED),
        };
        this.record_document(doc, &[])?;
        Ok(this)
    }
    /// Milliseconds since recording began.
    #[must_use]
    pub fn tick(&self) -> u32 {
        use az::SaturatingAs;
        self.start.elapsed().as_millis().saturating_as()
    }
    /// How many frames have been written.
    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.next_index
    }
    #[must_use]
    pub fn store(&self) -> &Arc<dyn FrameStore> {
        &self.store
    }
    fn push(&mut self, flags: ChangeFlags, forward: Snapshot, reverse: Reverse) -> Result<FrameIndexEntry, FrameError> {
        // Never step backwards, even if the clock does.
        let tick = self.tick().max(self.last_tick);
        let frame = Frame {
            entry: FrameIndexEntry {
                index: self.next_index,
                tick,
                flags,
            },
            forward,
            reverse,
        };
        self.store.append(&frame)?;
        log::trace!("recorded frame {} at {tick}ms ({flags:?})", self.next_index);
        self.next_index += 1;
        self.last_tick = tick;
        Ok(frame.entry)
    }
    /// Record the document after a commit. `appended` lists the ids added on top by the commit, if that
    /// is all it did, in which case only those shapes are written.
    pub fn record_document(
        &mut self,
        doc: &ShapeDocument,
        appended: &[ShapeID],
    ) -> Result<FrameIndexEntry, FrameError> {
        let current = Snapshot::of_document(doc);
        let entry = if self.next_index > 0 && !appended.is_empty() {
            let shapes = appended.iter().filter_map(|&id| doc.get(id));
            let forward = Snapshot::of_shapes(shapes, ChangeFlags::SHAPE_APPENDED);
            self.push(
                ChangeFlags::SHAPE_APPENDED,
                forward,
                Reverse::RemoveShapes(appended.iter().copied().collect()),
            )?
        } else {
            self.push(
                ChangeFlags::DOC_CHANGED,
                current.clone(),
                Reverse::Document(self.last_document.clone()),
            )?
        };
        self.last_document = current;
        Ok(entry)
    }
    /// Record the current in-progress shapes.
    pub fn record_dynamic(&mut self, shapes: &[Shape]) -> Result<FrameIndexEntry, FrameError> {
        let forward = Snapshot::of_shapes(shapes, ChangeFlags::DYN_CHANGED);
        let entry = self.push(
            ChangeFlags::DYN_CHANGED,
            forward.clone(),
            Reverse::Dynamic(self.last_dynamic.clone()),
        )?;
        self.last_dynamic = forward;
        Ok(entry)
    }
}
