//! # Recording and playback
//!
//! A recording is a sequence of [`Frame`]s, each one change to the document or to the dynamic shapes,
//! stamped with the milliseconds elapsed since recording began. Every frame carries both directions:
//! the forward payload brings the state at `index - 1` to the state at `index`, and the reverse payload
//! undoes exactly that. Playback can therefore seek backwards one frame at a time without replaying
//! anything from the start.
//!
//! Frame 0 is always a full document, so a recording can be played without any prior state.

mod player;
mod recorder;
mod store;

pub use player::{Direction, PlaybackPlayer, StagedFrame};
pub use recorder::PlaybackRecorder;
pub use store::{DirFrameStore, FrameStore, MemoryFrameStore};

use crate::{
    shape::ShapeID,
    snapshot::{ChangeFlags, Snapshot},
    storage::LoadError,
};

/// Position of a frame within a recording. Stored separately from payloads, so seeking needs only this.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct FrameIndexEntry {
    pub index: u32,
    /// Milliseconds since the recording started.
    pub tick: u32,
    pub flags: ChangeFlags,
}
impl FrameIndexEntry {
    /// Flatten into `[index, tick, flags, index, tick, flags, ...]`.
    #[must_use]
    pub fn flatten(entries: &[Self]) -> Vec<i64> {
        entries
            .iter()
            .flat_map(|entry| {
                [
                    i64::from(entry.index),
                    i64::from(entry.tick),
                    i64::from(entry.flags.bits()),
                ]
            })
            .collect()
    }
    /// Inverse of [`FrameIndexEntry::flatten`]. Fails on a trailing partial triple or values out of range.
    pub fn unflatten(flat: &[i64]) -> Result<Vec<Self>, FrameError> {
        use az::CheckedAs;
        if flat.len() % 3 != 0 {
            return Err(FrameError::BadIndex(format!(
                "{} values is not a whole number of entries",
                flat.len()
            )));
        }
        flat.chunks_exact(3)
            .map(|triple| -> Result<Self, FrameError> {
                let out_of_range = || FrameError::BadIndex(format!("entry {triple:?} out of range"));
                Ok(Self {
                    index: triple[0].checked_as::<u32>().ok_or_else(out_of_range)?,
                    tick: triple[1].checked_as::<u32>().ok_or_else(out_of_range)?,
                    flags: ChangeFlags::from_bits_truncate(triple[2].checked_as::<u32>().ok_or_else(out_of_range)?),
                })
            })
            .collect()
    }
}

/// How to step back over a frame.
#[derive(Clone, PartialEq, Debug)]
pub enum Reverse {
    /// The frame appended these shapes. Remove them again.
    RemoveShapes(smallvec::SmallVec<[ShapeID; 4]>),
    /// Replace the document with this one.
    Document(Snapshot),
    /// Replace the dynamic shapes with these.
    Dynamic(Snapshot),
}

#[derive(Clone, PartialEq, Debug)]
pub struct Frame {
    pub entry: FrameIndexEntry,
    pub forward: Snapshot,
    pub reverse: Reverse,
}

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("frame {} not found", .0)]
    Missing(u32),
    #[error("frame {index} is corrupt: checksum {found:08x}, expected {expected:08x}")]
    Checksum { index: u32, expected: u32, found: u32 },
    #[error("frame {} does not belong to this recording", .0)]
    Foreign(u32),
    #[error("frame {found} appended out of order, expected {expected}")]
    OutOfOrder { expected: u32, found: u32 },
    #[error("bad frame index: {}", .0)]
    BadIndex(String),
    #[error("nothing staged")]
    NothingStaged,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn index_flattening() {
        let entries = [
            FrameIndexEntry {
                index: 0,
                tick: 0,
                flags: ChangeFlags::DOC_CHANGED,
            },
            FrameIndexEntry {
                index: 1,
                tick: 40,
                flags: ChangeFlags::DYN_CHANGED,
            },
        ];
        let flat = FrameIndexEntry::flatten(&entries);
        assert_eq!(flat, vec![0, 0, 1, 1, 40, 4]);
        assert_eq!(FrameIndexEntry::unflatten(&flat).unwrap(), entries.to_vec());
        assert!(FrameIndexEntry::unflatten(&flat[..4]).is_err());
        assert!(FrameIndexEntry::unflatten(&[-1, 0, 0]).is_err());
    }
}
