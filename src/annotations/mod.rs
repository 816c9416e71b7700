//! Annotation directories, sets, and the queries over them
//!
//! Every class definition may point at an `annotations_directory_item`, which in turn points at
//! one annotation set for the class itself and one per annotated field, method, and method
//! parameter list. Queries go through [`Annotations`], which finds (and caches) the directory of
//! a class and then scans the relevant set.
//!
//! [0]: https://source.android.com/docs/core/runtime/dex-format#annotations-directory

mod directory;
mod errors;
mod extractors;
pub mod fast;
mod item;
mod query;
pub mod reachability;
mod value;
mod visitor;

pub use directory::*;
pub use errors::*;
pub use extractors::*;
pub use item::*;
pub use query::*;
pub use value::*;
pub use visitor::*;

/// Audience of an annotation
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum Visibility {
    /// Only meant for build tools (but still present in the file, and used as compiler hints)
    Build = 0x00,

    /// Visible through reflection at runtime
    Runtime = 0x01,

    /// Reserved for the `dalvik.annotation.*` metadata the platform itself reads
    System = 0x02,
}

impl Visibility {
    pub fn from_u8(visibility: u8) -> Option<Visibility> {
        match visibility {
            0x00 => Some(Visibility::Build),
            0x01 => Some(Visibility::Runtime),
            0x02 => Some(Visibility::System),
            _ => None,
        }
    }
}

impl Default for Visibility {
    fn default() -> Visibility {
        Visibility::Runtime
    }
}

/// Descriptors of the annotation types the platform gives special meaning to
pub mod well_known {
    pub const ANNOTATION_DEFAULT: &str = "Ldalvik/annotation/AnnotationDefault;";
    pub const ENCLOSING_CLASS: &str = "Ldalvik/annotation/EnclosingClass;";
    pub const ENCLOSING_METHOD: &str = "Ldalvik/annotation/EnclosingMethod;";
    pub const INNER_CLASS: &str = "Ldalvik/annotation/InnerClass;";
    pub const MEMBER_CLASSES: &str = "Ldalvik/annotation/MemberClasses;";
    pub const METHOD_PARAMETERS: &str = "Ldalvik/annotation/MethodParameters;";
    pub const NEST_HOST: &str = "Ldalvik/annotation/NestHost;";
    pub const NEST_MEMBERS: &str = "Ldalvik/annotation/NestMembers;";
    pub const PERMITTED_SUBCLASSES: &str = "Ldalvik/annotation/PermittedSubclasses;";
    pub const RECORD: &str = "Ldalvik/annotation/Record;";
    pub const SIGNATURE: &str = "Ldalvik/annotation/Signature;";
    pub const SOURCE_DEBUG_EXTENSION: &str = "Ldalvik/annotation/SourceDebugExtension;";
    pub const THROWS: &str = "Ldalvik/annotation/Throws;";

    pub const CRITICAL_NATIVE: &str = "Ldalvik/annotation/optimization/CriticalNative;";
    pub const DEAD_REFERENCE_SAFE: &str = "Ldalvik/annotation/optimization/DeadReferenceSafe;";
    pub const FAST_NATIVE: &str = "Ldalvik/annotation/optimization/FastNative;";
    pub const NEVER_COMPILE: &str = "Ldalvik/annotation/optimization/NeverCompile;";
    pub const NEVER_INLINE: &str = "Ldalvik/annotation/optimization/NeverInline;";
    pub const REACHABILITY_SENSITIVE: &str =
        "Ldalvik/annotation/optimization/ReachabilitySensitive;";
}
