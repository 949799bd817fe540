//! Editable-document core of a 2D vector drawing engine.
//!
//! A [`ShapeDocument`] of polymorphic [`Shape`]s is edited by named commands through a [`CoreView`],
//! which keeps undo history, records and plays back edits frame by frame, and hands immutable versions of
//! the document to concurrent readers.
#![warn(clippy::pedantic)]

pub mod commands;
pub mod context;
pub mod document;
pub mod factory;
pub mod geom;
pub mod handle;
pub mod playback;
pub mod settings;
pub mod shape;
pub mod snapshot;
pub mod storage;
pub mod undo;
pub mod view;

pub use document::ShapeDocument;
pub use factory::ShapeFactory;
pub use settings::CoreSettings;
pub use shape::{Shape, ShapeID};
pub use view::CoreView;
