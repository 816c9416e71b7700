//! Seam between annotation queries and a live type system
//!
//! Decoding annotations only ever produces descriptors. Turning those into classes is the job of
//! whatever owns class loading, abstracted here as a [`TypeResolver`]. Every query that
//! materializes values takes a [`Resolution`], which either resolves eagerly through such a
//! resolver or leaves everything as descriptors.

mod class_table;

pub use class_table::*;

use std::convert::Infallible;
use std::fmt::Debug;

/// A type could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// No class with this descriptor is known
    NoClassDefFound(String),

    /// Descriptor doesn't parse as a field type
    BadDescriptor(String),
}

/// Something that can turn type descriptors into classes
///
/// Implementations choose their own notion of class identity (an arena reference, a handle, an
/// id...). The class loader to resolve against is implicit in the resolver: construct one
/// resolver per loader.
pub trait TypeResolver {
    type Class: Clone + Debug;

    /// Resolve a field type descriptor (eg. `I`, `[J`, `Ljava/lang/String;`)
    ///
    /// This may block (eg. on the resolver's own locks) and may load classes as a side effect.
    fn resolve_type(&self, descriptor: &str) -> Result<Self::Class, ResolutionError>;
}

impl<'r, R: TypeResolver + ?Sized> TypeResolver for &'r R {
    type Class = R::Class;

    fn resolve_type(&self, descriptor: &str) -> Result<R::Class, ResolutionError> {
        (**self).resolve_type(descriptor)
    }
}

/// Resolver that never resolves anything
///
/// Pair this with [`Resolution::DescriptorOnly`] when a query should never touch a type system.
#[derive(Copy, Clone, Debug, Default)]
pub struct DescriptorsOnly;

impl TypeResolver for DescriptorsOnly {
    type Class = Infallible;

    fn resolve_type(&self, descriptor: &str) -> Result<Infallible, ResolutionError> {
        Err(ResolutionError::NoClassDefFound(descriptor.to_owned()))
    }
}

/// How a materializing query should treat the type references it encounters
#[derive(Copy, Clone, Debug)]
pub enum Resolution<R: TypeResolver> {
    /// Resolve every type reference, failing the query if any can't be resolved
    Eager(R),

    /// Leave type references as descriptors (never loads anything)
    DescriptorOnly,
}

impl Resolution<DescriptorsOnly> {
    pub fn descriptors_only() -> Resolution<DescriptorsOnly> {
        Resolution::DescriptorOnly
    }
}

impl<R: TypeResolver> Resolution<R> {
    pub fn is_eager(&self) -> bool {
        matches!(self, Resolution::Eager(_))
    }

    pub fn resolve(&self, descriptor: &str) -> Result<TypeRef<R::Class>, ResolutionError> {
        match self {
            Resolution::Eager(resolver) => resolver.resolve_type(descriptor).map(TypeRef::Resolved),
            Resolution::DescriptorOnly => Ok(TypeRef::Symbolic(descriptor.to_owned())),
        }
    }
}

/// Type reference that may or may not have been resolved
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeRef<C> {
    Resolved(C),

    /// Field type descriptor
    Symbolic(String),
}

impl<C> TypeRef<C> {
    pub fn resolved(&self) -> Option<&C> {
        match self {
            TypeRef::Resolved(class) => Some(class),
            TypeRef::Symbolic(_) => None,
        }
    }

    pub fn descriptor(&self) -> Option<&str> {
        match self {
            TypeRef::Resolved(_) => None,
            TypeRef::Symbolic(descriptor) => Some(descriptor),
        }
    }
}
