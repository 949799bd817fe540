use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use super::{Frame, FrameError, FrameIndexEntry, FrameStore, Reverse};
use crate::{
    document::ShapeDocument,
    factory::ShapeFactory,
    shape::Shape,
    snapshot::ChangeFlags,
    storage::LoadError,
};

#[derive(Copy, Clone, PartialEq, Eq, Debug, strum::AsRefStr)]
pub enum Direction {
    Forward,
    Backward,
}

/// A frame loaded and waiting to be applied.
#[derive(Clone, Debug)]
pub struct StagedFrame {
    pub direction: Direction,
    pub frame: Frame,
    /// Playback clock after this frame is applied.
    pub resume_tick: u32,
}
impl StagedFrame {
    /// What applying this frame will change.
    #[must_use]
    pub fn flags(&self) -> ChangeFlags {
        match (self.direction, &self.frame.reverse) {
            (Direction::Forward, _) => self.frame.entry.flags,
            (Direction::Backward, Reverse::RemoveShapes(_) | Reverse::Document(_)) => ChangeFlags::DOC_CHANGED,
            (Direction::Backward, Reverse::Dynamic(_)) => ChangeFlags::DYN_CHANGED,
        }
    }
    /// Apply to a document and dynamic-shape set. Everything is rebuilt before anything is touched,
    /// so on error both are left as they were.
    pub fn apply(
        &self,
        factory: &ShapeFactory,
        doc: &mut ShapeDocument,
        dynamic: &mut Vec<Shape>,
    ) -> Result<ChangeFlags, LoadError> {
        let flags = self.flags();
        match self.direction {
            Direction::Forward => {
                let forward = &self.frame.forward;
                if flags.contains(ChangeFlags::DOC_CHANGED) {
                    let replacement = forward.document(factory)?;
                    doc.replace_contents(replacement);
                } else if flags.contains(ChangeFlags::SHAPE_APPENDED) {
                    let shapes = forward.shapes(factory)?;
                    doc.add_shapes(shapes);
                } else if flags.contains(ChangeFlags::DYN_CHANGED) {
                    *dynamic = forward.shapes(factory)?;
                }
            }
            Direction::Backward => match &self.frame.reverse {
                Reverse::RemoveShapes(ids) => {
                    doc.remove_shapes(ids);
                }
                Reverse::Document(snap) => {
                    let replacement = snap.document(factory)?;
                    doc.replace_contents(replacement);
                }
                Reverse::Dynamic(snap) => *dynamic = snap.shapes(factory)?,
            },
        }
        Ok(flags)
    }
}

/// Steps through a recording.
///
/// Loading and applying are split so that frames can be read on a loader thread while the edit thread
/// applies the previous one. At most one frame is staged at a time, a new load replaces it.
pub struct PlaybackPlayer {
    store: Arc<dyn FrameStore>,
    index: Vec<FrameIndexEntry>,
    staged: parking_lot::Mutex<Option<StagedFrame>>,
    /// Frames currently applied, so the next forward frame has this index.
    played: AtomicU32,
    tick: AtomicU32,
}
impl PlaybackPlayer {
    pub fn new(store: Arc<dyn FrameStore>) -> Result<Self, FrameError> {
        let index = store.index()?;
        Ok(Self {
            store,
            index,
            staged: parking_lot::Mutex::new(None),
            played: AtomicU32::new(0),
            tick: AtomicU32::new(0),
        })
    }
    #[must_use]
    pub fn entries(&self) -> &[FrameIndexEntry] {
        &self.index
    }
    #[must_use]
    pub fn entry(&self, index: u32) -> Option<FrameIndexEntry> {
        self.index.get(usize::try_from(index).ok()?).copied()
    }
    /// Number of frames applied so far.
    #[must_use]
    pub fn frame_index(&self) -> u32 {
        self.played.load(Ordering::Acquire)
    }
    /// Playback clock, in recording milliseconds, as of the last applied frame.
    #[must_use]
    pub fn tick(&self) -> u32 {
        self.tick.load(Ordering::Acquire)
    }
    /// Load frame `index` into the staged slot. A failed load empties the slot, so nothing older can be
    /// applied in its place.
    fn stage(
        &self,
        index: u32,
        direction: Direction,
        resume_tick: impl FnOnce(&FrameIndexEntry) -> u32,
    ) -> Result<ChangeFlags, FrameError> {
        let loaded = self.entry(index).ok_or(FrameError::Missing(index)).and_then(|entry| {
            let frame = self.store.load(index)?;
            if frame.entry != entry {
                return Err(FrameError::Foreign(index));
            }
            Ok(StagedFrame {
                direction,
                frame,
                resume_tick: resume_tick(&entry),
            })
        });
        let mut slot = self.staged.lock();
        match loaded {
            Ok(staged) => {
                let flags = staged.flags();
                log::trace!("staged frame {index} {}", direction.as_ref());
                *slot = Some(staged);
                Ok(flags)
            }
            Err(e) => {
                *slot = None;
                Err(e)
            }
        }
    }
    /// Stage frame 0, the full starting document.
    pub fn load_first_frame(&self) -> Result<ChangeFlags, FrameError> {
        self.stage(0, Direction::Forward, |_| 0)
    }
    /// Stage frame `index` for playing forward.
    pub fn load_next_frame(&self, index: u32) -> Result<ChangeFlags, FrameError> {
        self.stage(index, Direction::Forward, |entry| entry.tick)
    }
    /// Stage the reverse of frame `index`, stepping back to the state after `index - 1`. The clock resumes at
    /// that frame's tick, or `current_tick` if that is earlier.
    pub fn load_prev_frame(&self, index: u32, current_tick: u32) -> Result<ChangeFlags, FrameError> {
        let previous_tick = index
            .checked_sub(1)
            .and_then(|prev| self.entry(prev))
            .map_or(0, |entry| entry.tick);
        self.stage(index, Direction::Backward, |_| previous_tick.min(current_tick))
    }
    /// Take the staged frame if it changes anything in `flags`.
    pub fn take_staged(&self, flags: ChangeFlags) -> Option<StagedFrame> {
        let mut staged = self.staged.lock();
        if staged.as_ref()?.flags().intersects(flags) {
            staged.take()
        } else {
            None
        }
    }
    /// Advance the counters after `staged` was applied.
    pub fn mark_applied(&self, staged: &StagedFrame) {
        let index = staged.frame.entry.index;
        let played = match staged.direction {
            Direction::Forward => index + 1,
            Direction::Backward => index,
        };
        self.played.store(played, Ordering::Release);
        self.tick.store(staged.resume_tick, Ordering::Release);
    }
    /// Apply the staged frame directly to `doc` and `dynamic`, for callers without a view.
    pub fn apply_frame_to(
        &self,
        flags: ChangeFlags,
        factory: &ShapeFactory,
        doc: &mut ShapeDocument,
        dynamic: &mut Vec<Shape>,
    ) -> Result<ChangeFlags, FrameError> {
        let staged = self.take_staged(flags).ok_or(FrameError::NothingStaged)?;
        let applied = staged.apply(factory, doc, dynamic)?;
        self.mark_applied(&staged);
        Ok(applied)
    }
}
