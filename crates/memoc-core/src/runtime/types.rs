//! Loaded unit types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::load::UnitResolver;

use super::construct;
use super::image::{ConstructorDecl, FieldDecl, UnitImage};
use super::value::{Instance, Value};

/// A unit defined into the running process.
///
/// Created by a loader from a [`UnitImage`]. The defining loader stays
/// attached as the resolver for units referenced by constructor bodies.
pub struct UnitType {
    image: UnitImage,
    origin: Option<PathBuf>,
    resolver: Arc<dyn UnitResolver>,
}

impl UnitType {
    pub(crate) fn define(
        image: UnitImage,
        origin: Option<PathBuf>,
        resolver: Arc<dyn UnitResolver>,
    ) -> Self {
        Self {
            image,
            origin,
            resolver,
        }
    }

    /// Fully qualified dotted name, e.g. `demo.Counter`.
    pub fn name(&self) -> &str {
        &self.image.name
    }

    /// Last segment of the name.
    pub fn simple_name(&self) -> &str {
        self.image
            .name
            .rsplit_once('.')
            .map_or(self.image.name.as_str(), |(_, simple)| simple)
    }

    /// Package part of the name (empty for top-level units).
    pub fn package(&self) -> &str {
        self.image.name.rsplit_once('.').map_or("", |(pkg, _)| pkg)
    }

    /// URI of the source the unit was compiled from.
    pub fn source(&self) -> &str {
        &self.image.source
    }

    /// Directory the unit was loaded from, if it came from disk.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.image.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.image.fields.iter().position(|f| f.name == name)
    }

    pub fn constructors(&self) -> &[ConstructorDecl] {
        &self.image.constructors
    }

    pub fn constructor(&self, name: &str) -> Option<&ConstructorDecl> {
        self.image.constructors.iter().find(|c| c.name == name)
    }

    /// Resolver used for units referenced from this unit's constructors.
    pub fn resolver(&self) -> &Arc<dyn UnitResolver> {
        &self.resolver
    }

    pub fn image(&self) -> &UnitImage {
        &self.image
    }

    /// Construct with the zero-argument constructor.
    pub fn new_instance(self: &Arc<Self>) -> Result<Instance> {
        self.construct(&[])
    }

    /// Construct with the constructor whose parameter types match the
    /// runtime types of `args`.
    pub fn construct(self: &Arc<Self>, args: &[Value]) -> Result<Instance> {
        construct::construct(self, args)
    }

    /// Construct with a named constructor.
    pub fn construct_with(self: &Arc<Self>, constructor: &str, args: &[Value]) -> Result<Instance> {
        construct::construct_named(self, constructor, args)
    }
}

impl fmt::Debug for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitType")
            .field("name", &self.image.name)
            .field("origin", &self.origin)
            .field("fields", &self.image.fields.len())
            .field("constructors", &self.image.constructors.len())
            .finish()
    }
}
