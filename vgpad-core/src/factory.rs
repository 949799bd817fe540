//! # Shape factory
//!
//! Maps the persisted type tag of a shape to a constructor for its geometry. Builtin variants are registered
//! by [`ShapeFactory::default`], hosts may register more.

use crate::{
    shape::{Dot, Geometry, ImageRect, Line, RectShape, Shape},
    storage::{LoadError, Storage},
};

/// Builds an empty geometry, to be filled in by [`Geometry::load`] or a command.
pub type Constructor = fn() -> Box<dyn Geometry>;

/// Shape variants that ship with the core.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, strum::EnumIter, strum::EnumString, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum BuiltinKind {
    Line,
    Rect,
    Dot,
    Image,
}
impl BuiltinKind {
    #[must_use]
    pub fn constructor(self) -> Constructor {
        match self {
            Self::Line => construct::<Line>,
            Self::Rect => construct::<RectShape>,
            Self::Dot => construct::<Dot>,
            Self::Image => construct::<ImageRect>,
        }
    }
}
fn construct<G: Geometry + Default>() -> Box<dyn Geometry> {
    Box::new(G::default())
}

#[derive(Clone)]
pub struct ShapeFactory {
    constructors: hashbrown::HashMap<&'static str, Constructor>,
}
impl Default for ShapeFactory {
    /// A factory with every [`BuiltinKind`] registered.
    fn default() -> Self {
        let mut this = Self::empty();
        for kind in <BuiltinKind as strum::IntoEnumIterator>::iter() {
            this.register(kind.into(), kind.constructor());
        }
        this
    }
}
impl ShapeFactory {
    /// A factory that knows no types at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: hashbrown::HashMap::new(),
        }
    }
    /// Register a constructor under `type_name`, returning the one it replaced.
    ///
    /// The geometries produced must report the same `type_name`, or saved content won't load back.
    pub fn register(&mut self, type_name: &'static str, constructor: Constructor) -> Option<Constructor> {
        self.constructors.insert(type_name, constructor)
    }
    pub fn unregister(&mut self, type_name: &str) -> Option<Constructor> {
        self.constructors.remove(type_name)
    }
    #[must_use]
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }
    /// A fresh, degenerate shape of the given type, or None if the type is unknown.
    #[must_use]
    pub fn create(&self, type_name: &str) -> Option<Shape> {
        self.constructors
            .get(type_name)
            .map(|constructor| Shape::new(constructor()))
    }
    /// Read a whole shape from the current storage node: type tag first, then the shape's own fields.
    ///
    /// Nothing is returned on failure, so a partially read shape can never reach a document.
    pub fn load_shape(&self, s: &mut dyn Storage) -> Result<Shape, LoadError> {
        let type_name = s.read_string("type").ok_or(LoadError::MissingField("type"))?;
        let mut shape = self
            .create(&type_name)
            .ok_or(LoadError::UnknownType(type_name))?;
        shape.load(s)?;
        Ok(shape)
    }
}
