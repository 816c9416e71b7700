//! Answer questions about the annotations embedded in a DEX file
//!
//! The crate is layered the same way as the data:
//!
//!   * [`dex`] reads the container: header, id tables, class definitions, class data, code
//!     items, and the tagged `encoded_value` format
//!   * [`annotations`] maps classes, fields, methods, and parameters to their annotation sets
//!     and answers presence checks, value lookups, the well-known `dalvik.annotation.*`
//!     extractors, and the build-time optimization predicates
//!   * [`runtime`] is the seam to whatever owns the live type system: queries that need to
//!     produce typed results resolve descriptors through a [`runtime::TypeResolver`]
//!
//! ```no_run
//! use dexannot::annotations::{Annotations, Target};
//! use dexannot::dex::DexFile;
//!
//! # fn main() -> Result<(), dexannot::annotations::Error> {
//! let bytes = std::fs::read("classes.dex")?;
//! let dex = DexFile::parse(&bytes)?;
//! let annotations = Annotations::new(dex);
//! if let Some(class_def) = annotations.dex().find_class_def_by_descriptor("Lcom/example/Foo;")? {
//!     let deprecated = annotations.is_present(
//!         &class_def,
//!         Target::Class,
//!         "Ljava/lang/Deprecated;",
//!     )?;
//!     println!("deprecated: {}", deprecated);
//! }
//! # Ok(())
//! # }
//! ```

pub mod annotations;
pub mod dex;
pub mod runtime;
