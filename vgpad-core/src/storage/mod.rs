//! # Storage
//!
//! Shapes and documents never see a byte format. They read and write named fields through [`Storage`],
//! and the adapter decides how those fields are laid out. Field names are part of the format -
//! once written, a name must keep its meaning so older content stays readable.
//!
//! [`JsonStorage`] is the adapter used for content exchange, snapshots, and recordings.

mod json;
pub use json::JsonStorage;

/// Named-field reader and writer.
///
/// Reads report failure with sentinels rather than errors: a short count, `None`, or the supplied default.
/// Callers decide whether a missing field is fatal.
pub trait Storage {
    fn write_float_array(&mut self, name: &str, values: &[f32]);
    /// Read up to `values.len()` floats. Returns how many were actually read, which is less
    /// than requested if the field is missing or short.
    fn read_float_array(&mut self, name: &str, values: &mut [f32]) -> usize;

    fn write_float(&mut self, name: &str, value: f32);
    fn read_float(&mut self, name: &str, default: f32) -> f32;

    fn write_int(&mut self, name: &str, value: i64);
    fn read_int(&mut self, name: &str, default: i64) -> i64;

    fn write_string(&mut self, name: &str, value: &str);
    fn read_string(&mut self, name: &str) -> Option<String>;

    /// Begin writing a child node. With an `index`, the node is element `index` of a list called `name`.
    fn begin_write_node(&mut self, name: &str, index: Option<usize>);
    /// Enter an existing child node for reading. False if it does not exist, in which case
    /// [`Storage::end_node`] must *not* be called.
    fn begin_read_node(&mut self, name: &str, index: Option<usize>) -> bool;
    /// Leave the node most recently entered by `begin_*_node`.
    fn end_node(&mut self);
    /// Length of the indexed list `name` in the current node, counting entries that are not nodes.
    /// Zero if there is no such list.
    fn node_count(&mut self, name: &str) -> usize;
}

/// Reasons a shape or document could not be reconstructed from storage.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("field {} is missing", .0)]
    MissingField(&'static str),
    #[error("field {field} holds {found} values, expected {expected}")]
    Arity {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("shape type {:?} is not registered with the factory", .0)]
    UnknownType(String),
    #[error("shape #{index}: {source}")]
    Shape {
        index: usize,
        #[source]
        source: Box<LoadError>,
    },
    #[error("malformed content: {}", .0)]
    Malformed(String),
}

impl From<serde_json::Error> for LoadError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value.to_string())
    }
}
