//! # Snapshots
//!
//! Serialized, detached copies of document state. Undo history and recordings hold these rather than live
//! shapes, so restoring one always rebuilds fresh shapes through the factory and can never alias anything
//! still in use.

use crate::{
    document::{self, ShapeDocument},
    factory::ShapeFactory,
    shape::Shape,
    storage::{JsonStorage, LoadError, Storage},
};

bitflags::bitflags! {
    /// What kind of change a snapshot or frame describes.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    #[rustfmt::skip]
    pub struct ChangeFlags : u32 {
        /// The whole document was replaced or edited.
        const DOC_CHANGED =    0b001;
        /// Shapes were added on top of an otherwise unchanged document.
        const SHAPE_APPENDED = 0b010;
        /// The in-progress shapes of the active command changed.
        const DYN_CHANGED =    0b100;
    }
}

/// CRC of the compact JSON text of a payload.
pub(crate) static CHECKSUM: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISCSI);

#[derive(Clone, PartialEq, Debug)]
pub struct Snapshot {
    pub flags: ChangeFlags,
    payload: serde_json::Value,
}
impl Snapshot {
    /// A full copy of `doc`.
    #[must_use]
    pub fn of_document(doc: &ShapeDocument) -> Self {
        let mut s = JsonStorage::new();
        doc.save(&mut s);
        Self {
            flags: ChangeFlags::DOC_CHANGED,
            payload: s.into_value(),
        }
    }
    /// A copy of a loose set of shapes, such as the dynamic buffer or freshly appended shapes.
    #[must_use]
    pub fn of_shapes<'a>(shapes: impl IntoIterator<Item = &'a Shape>, flags: ChangeFlags) -> Self {
        let mut s = JsonStorage::new();
        let mut count = 0i64;
        for (i, shape) in shapes.into_iter().enumerate() {
            s.begin_write_node("shapes", Some(i));
            shape.save(&mut s);
            s.end_node();
            count += 1;
        }
        s.write_int("count", count);
        Self {
            flags,
            payload: s.into_value(),
        }
    }
    /// Wrap an already-serialized payload, such as one read back from a recording.
    pub fn from_payload(flags: ChangeFlags, payload: serde_json::Value) -> Result<Self, LoadError> {
        if payload.is_object() {
            Ok(Self { flags, payload })
        } else {
            Err(LoadError::Malformed("snapshot payload is not an object".to_owned()))
        }
    }
    #[must_use]
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
    #[must_use]
    pub fn into_payload(self) -> serde_json::Value {
        self.payload
    }
    /// Rebuild a whole document.
    pub fn document(&self, factory: &ShapeFactory) -> Result<ShapeDocument, LoadError> {
        let mut s = JsonStorage::from_value(self.payload.clone())?;
        ShapeDocument::load(factory, &mut s)
    }
    /// Rebuild the shapes in order, ignoring any document-level fields.
    pub fn shapes(&self, factory: &ShapeFactory) -> Result<Vec<Shape>, LoadError> {
        let mut s = JsonStorage::from_value(self.payload.clone())?;
        document::load_shape_list(factory, &mut s)
    }
    #[must_use]
    pub fn checksum(&self) -> u32 {
        CHECKSUM.checksum(self.payload.to_string().as_bytes())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geom::Point,
        shape::{Dot, Line},
    };

    #[test]
    fn snapshot_does_not_alias() {
        let factory = ShapeFactory::default();
        let mut doc = ShapeDocument::new();
        let id = doc.add_shape(Shape::new(Box::new(Line::new(Point::new(0.0, 0.0), Point::new(1.0, 0.0)))));
        let snap = Snapshot::of_document(&doc);

        doc.modify(id, |shape| shape.set_point(1, Point::new(9.0, 9.0)));
        let restored = snap.document(&factory).unwrap();
        assert_eq!(restored.get(id).unwrap().point(1), Point::new(1.0, 0.0));
        assert_eq!(restored.shape_count(), 1);
    }
    #[test]
    fn loose_shapes() {
        let factory = ShapeFactory::default();
        let shapes = [
            Shape::new(Box::new(Dot::new(Point::new(1.0, 2.0)))),
            Shape::new(Box::new(Dot::new(Point::new(3.0, 4.0)))),
        ];
        let snap = Snapshot::of_shapes(&shapes, ChangeFlags::DYN_CHANGED);
        assert_eq!(snap.flags, ChangeFlags::DYN_CHANGED);
        assert_eq!(snap.shapes(&factory).unwrap(), shapes.to_vec());
        // Stable across identical content.
        assert_eq!(snap.checksum(), Snapshot::of_shapes(&shapes, ChangeFlags::DYN_CHANGED).checksum());
    }
}
