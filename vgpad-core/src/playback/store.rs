//! Where recorded frames live.
//!
//! Both stores keep frames as JSON text with a checksum over the payloads, verified on every load.

use std::path::{Path, PathBuf};

use super::{Frame, FrameError, FrameIndexEntry, Reverse};
use crate::{
    shape::ShapeID,
    snapshot::{ChangeFlags, Snapshot, CHECKSUM},
};

/// Append-only frame storage. Shared between a recorder or player and a loader thread, so all
/// methods take `&self`.
pub trait FrameStore: Send + Sync {
    /// Append the next frame. Its index must be exactly one past the last.
    fn append(&self, frame: &Frame) -> Result<(), FrameError>;
    fn load(&self, index: u32) -> Result<Frame, FrameError>;
    fn index(&self) -> Result<Vec<FrameIndexEntry>, FrameError>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum StoredReverse {
    Remove { ids: smallvec::SmallVec<[ShapeID; 4]> },
    Document { payload: serde_json::Value },
    Dynamic { payload: serde_json::Value },
}

#[derive(serde::Serialize, serde::Deserialize)]
struct StoredFrame {
    index: u32,
    tick: u32,
    flags: u32,
    checksum: u32,
    forward: serde_json::Value,
    reverse: StoredReverse,
}
impl StoredFrame {
    fn compute_checksum(forward: &serde_json::Value, reverse: &StoredReverse) -> Result<u32, FrameError> {
        let mut digest = CHECKSUM.digest();
        digest.update(forward.to_string().as_bytes());
        digest.update(serde_json::to_string(reverse)?.as_bytes());
        Ok(digest.finalize())
    }
    fn from_frame(frame: &Frame) -> Result<Self, FrameError> {
        let reverse = match &frame.reverse {
            Reverse::RemoveShapes(ids) => StoredReverse::Remove { ids: ids.clone() },
            Reverse::Document(snap) => StoredReverse::Document {
                payload: snap.payload().clone(),
            },
            Reverse::Dynamic(snap) => StoredReverse::Dynamic {
                payload: snap.payload().clone(),
            },
        };
        let forward = frame.forward.payload().clone();
        Ok(Self {
            index: frame.entry.index,
            tick: frame.entry.tick,
            flags: frame.entry.flags.bits(),
            checksum: Self::compute_checksum(&forward, &reverse)?,
            forward,
            reverse,
        })
    }
    /// Verify and rebuild the frame, which must be the one stored at `index`.
    fn into_frame(self, index: u32) -> Result<Frame, FrameError> {
        if self.index != index {
            return Err(FrameError::Foreign(index));
        }
        let found = Self::compute_checksum(&self.forward, &self.reverse)?;
        if found != self.checksum {
            return Err(FrameError::Checksum {
                index: self.index,
                expected: self.checksum,
                found,
            });
        }
        let flags = ChangeFlags::from_bits_truncate(self.flags);
        let reverse = match self.reverse {
            StoredReverse::Remove { ids } => Reverse::RemoveShapes(ids),
            StoredReverse::Document { payload } => {
                Reverse::Document(Snapshot::from_payload(ChangeFlags::DOC_CHANGED, payload)?)
            }
            StoredReverse::Dynamic { payload } => {
                Reverse::Dynamic(Snapshot::from_payload(ChangeFlags::DYN_CHANGED, payload)?)
            }
        };
        Ok(Frame {
            entry: FrameIndexEntry {
                index: self.index,
                tick: self.tick,
                flags,
            },
            forward: Snapshot::from_payload(flags, self.forward)?,
            reverse,
        })
    }
}

fn check_order(len: usize, frame: &Frame) -> Result<(), FrameError> {
    let expected = u32::try_from(len).unwrap_or(u32::MAX);
    if frame.entry.index == expected {
        Ok(())
    } else {
        Err(FrameError::OutOfOrder {
            expected,
            found: frame.entry.index,
        })
    }
}

/// Frames kept in memory as serialized text. Cheap to clone, clones share the same frames.
#[derive(Clone, Default)]
pub struct MemoryFrameStore {
    frames: std::sync::Arc<parking_lot::RwLock<Vec<(FrameIndexEntry, String)>>>,
}
impl MemoryFrameStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Overwrite the stored text of a frame.
    #[cfg(test)]
    pub(crate) fn tamper(&self, index: usize, edit: impl FnOnce(&mut String)) {
        edit(&mut self.frames.write()[index].1);
    }
}
impl FrameStore for MemoryFrameStore {
    fn append(&self, frame: &Frame) -> Result<(), FrameError> {
        let text = serde_json::to_string(&StoredFrame::from_frame(frame)?)?;
        let mut frames = self.frames.write();
        check_order(frames.len(), frame)?;
        frames.push((frame.entry, text));
        Ok(())
    }
    fn load(&self, index: u32) -> Result<Frame, FrameError> {
        let frames = self.frames.read();
        let (_, text) = usize::try_from(index)
            .ok()
            .and_then(|idx| frames.get(idx))
            .ok_or(FrameError::Missing(index))?;
        serde_json::from_str::<StoredFrame>(text)?.into_frame(index)
    }
    fn index(&self) -> Result<Vec<FrameIndexEntry>, FrameError> {
        Ok(self.frames.read().iter().map(|(entry, _)| *entry).collect())
    }
    fn len(&self) -> usize {
        self.frames.read().len()
    }
}

/// Frames in a directory: `index.json` holding the flattened index, and `{index}.json` per frame.
pub struct DirFrameStore {
    root: PathBuf,
    pretty: bool,
    /// In-memory copy of `index.json`.
    index: parking_lot::RwLock<Vec<FrameIndexEntry>>,
}
impl DirFrameStore {
    pub const INDEX_FILE: &'static str = "index.json";

    /// Start a new recording in `root`, creating it if needed. Any existing frames are deleted.
    pub fn create(root: impl Into<PathBuf>, pretty: bool) -> Result<Self, FrameError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        for entry in std::fs::read_dir(&root)? {
            let path = entry?.path();
            let is_frame = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_stem()
                    .and_then(std::ffi::OsStr::to_str)
                    .is_some_and(|stem| stem.parse::<u32>().is_ok());
            if is_frame {
                std::fs::remove_file(&path)?;
            }
        }
        let this = Self {
            root,
            pretty,
            index: parking_lot::RwLock::new(Vec::new()),
        };
        this.write_index(&[])?;
        Ok(this)
    }
    /// Open an existing recording for playback.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, FrameError> {
        let root = root.into();
        let index = Self::read_index(&root)?;
        Ok(Self {
            root,
            pretty: false,
            index: parking_lot::RwLock::new(index),
        })
    }
    /// Read only the index of a recording in `root`.
    pub fn read_index(root: &Path) -> Result<Vec<FrameIndexEntry>, FrameError> {
        let text = std::fs::read_to_string(root.join(Self::INDEX_FILE))?;
        let flat: Vec<i64> = serde_json::from_str(&text)?;
        FrameIndexEntry::unflatten(&flat)
    }
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
    fn frame_path(&self, index: u32) -> PathBuf {
        self.root.join(format!("{index}.json"))
    }
    fn write_index(&self, entries: &[FrameIndexEntry]) -> Result<(), FrameError> {
        let flat = FrameIndexEntry::flatten(entries);
        std::fs::write(self.root.join(Self::INDEX_FILE), serde_json::to_string(&flat)?)?;
        Ok(())
    }
}
impl FrameStore for DirFrameStore {
    fn append(&self, frame: &Frame) -> Result<(), FrameError> {
        let stored = StoredFrame::from_frame(frame)?;
        let text = if self.pretty {
            serde_json::to_string_pretty(&stored)?
        } else {
            serde_json::to_string(&stored)?
        };
        let mut index = self.index.write();
        check_order(index.len(), frame)?;
        // Payload first, so the index never names a frame that isn't on disk.
        std::fs::write(self.frame_path(frame.entry.index), text)?;
        index.push(frame.entry);
        if let Err(e) = self.write_index(&index) {
            index.pop();
            return Err(e);
        }
        log::trace!("wrote frame {} to {}", frame.entry.index, self.root.display());
        Ok(())
    }
    fn load(&self, index: u32) -> Result<Frame, FrameError> {
        // Files past the index may be left over from an older recording.
        if usize::try_from(index).map_or(true, |idx| idx >= self.len()) {
            return Err(FrameError::Missing(index));
        }
        let path = self.frame_path(index);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(FrameError::Missing(index)),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str::<StoredFrame>(&text)?.into_frame(index)
    }
    fn index(&self) -> Result<Vec<FrameIndexEntry>, FrameError> {
        Ok(self.index.read().clone())
    }
    fn len(&self) -> usize {
        self.index.read().len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{document::ShapeDocument, geom::Point, shape::{Dot, Shape}};

    fn frame(index: u32, tick: u32) -> Frame {
        let mut doc = ShapeDocument::new();
        doc.add_shape(Shape::new(Box::new(Dot::new(Point::new(1.0, 2.0)))));
        Frame {
            entry: FrameIndexEntry {
                index,
                tick,
                flags: ChangeFlags::DOC_CHANGED,
            },
            forward: Snapshot::of_document(&doc),
            reverse: Reverse::Document(Snapshot::of_document(&ShapeDocument::new())),
        }
    }

    #[test]
    fn memory_store() {
        let store = MemoryFrameStore::new();
        store.append(&frame(0, 0)).unwrap();
        store.append(&frame(1, 16)).unwrap();
        assert!(matches!(
            store.append(&frame(5, 20)),
            Err(FrameError::OutOfOrder { expected: 2, found: 5 })
        ));
        assert_eq!(store.len(), 2);
        assert_eq!(store.load(1).unwrap(), frame(1, 16));
        assert!(matches!(store.load(2), Err(FrameError::Missing(2))));
    }
    #[test]
    fn corrupt_frame_is_detected() {
        let store = MemoryFrameStore::new();
        store.append(&frame(0, 0)).unwrap();
        // Move the dot without updating the checksum.
        store.tamper(0, |text| *text = text.replacen("2.0", "3.0", 1));
        assert!(matches!(store.load(0), Err(FrameError::Checksum { index: 0, .. })));
    }
    #[test]
    fn dir_store() {
        let root = std::env::temp_dir().join(format!("vgpad-frames-{}", std::process::id()));
        let store = DirFrameStore::create(&root, true).unwrap();
        store.append(&frame(0, 0)).unwrap();
        store.append(&frame(1, 33)).unwrap();

        let index = DirFrameStore::read_index(&root).unwrap();
        assert_eq!(index, store.index().unwrap());
        assert_eq!(index[1].tick, 33);

        let reopened = DirFrameStore::open(&root).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.load(0).unwrap(), frame(0, 0));

        std::fs::remove_dir_all(&root).unwrap();
    }
    #[test]
    fn reused_dir_forgets_old_frames() {
        let root = std::env::temp_dir().join(format!("vgpad-frames-reused-{}", std::process::id()));
        let store = DirFrameStore::create(&root, false).unwrap();
        for index in 0..3 {
            store.append(&frame(index, index * 10)).unwrap();
        }
        // A stray copy of frame 1 under another name is not frame 2.
        std::fs::copy(root.join("1.json"), root.join("2.json")).unwrap();
        assert!(matches!(store.load(2), Err(FrameError::Foreign(2))));

        let store = DirFrameStore::create(&root, false).unwrap();
        store.append(&frame(0, 0)).unwrap();
        assert!(!root.join("2.json").exists());
        assert!(matches!(store.load(2), Err(FrameError::Missing(2))));
        // Left over by hand, it is still outside the index.
        std::fs::write(root.join("2.json"), "{}").unwrap();
        assert!(matches!(store.load(2), Err(FrameError::Missing(2))));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
