use super::{ResolutionError, TypeResolver};
use crate::dex::{
    ClassAccessFlags, DexFile, FieldType, FormatError, ParseDescriptor, RenderDescriptor,
};
use elsa::map::FrozenMap;
use std::fmt;
use typed_arena::Arena;

pub struct ClassTableArenas<'g> {
    class_arena: Arena<LoadedClass<'g>>,
}

impl<'g> ClassTableArenas<'g> {
    pub fn new() -> Self {
        ClassTableArenas {
            class_arena: Arena::new(),
        }
    }
}

impl<'g> Default for ClassTableArenas<'g> {
    fn default() -> Self {
        ClassTableArenas::new()
    }
}

/// Minimal type system: classes keyed by descriptor
///
/// Classes from DEX files get defined up front with [`ClassTable::load_dex_classes`]. Primitive
/// and array classes get defined the first time they are resolved. Nothing is ever removed, so
/// every class reference handed out stays valid for as long as the arenas live.
pub struct ClassTable<'g> {
    arenas: &'g ClassTableArenas<'g>,
    classes: FrozenMap<String, &'g LoadedClass<'g>>,
}

impl<'g> ClassTable<'g> {
    /// New empty table
    pub fn new(arenas: &'g ClassTableArenas<'g>) -> Self {
        ClassTable {
            arenas,
            classes: FrozenMap::new(),
        }
    }

    pub fn lookup(&self, descriptor: &str) -> Option<&'g LoadedClass<'g>> {
        self.classes.map_get(descriptor, |class| *class)
    }

    /// Add a new class to the table
    ///
    /// If a class with the same descriptor is already defined, that class is kept and returned.
    pub fn define(&self, class: LoadedClass<'g>) -> &'g LoadedClass<'g> {
        if let Some(existing) = self.lookup(&class.descriptor) {
            return existing;
        }
        let class: &'g LoadedClass<'g> = self.arenas.class_arena.alloc(class);
        self.classes.insert(class.descriptor.clone(), class);
        class
    }

    /// Define every class in a DEX file
    ///
    /// Class definitions are ordered so that superclasses defined in the same file come first,
    /// so superclass links get filled in whenever the superclass is in the table already.
    pub fn load_dex_classes(&self, dex: &DexFile) -> Result<usize, FormatError> {
        let mut loaded = 0;
        for class_def in dex.class_defs() {
            let class_def = class_def?;
            let superclass = match class_def.superclass {
                None => None,
                Some(superclass) => self.lookup(&dex.type_descriptor(superclass)?),
            };
            self.define(LoadedClass {
                descriptor: dex.type_descriptor(class_def.class)?.into_owned(),
                kind: ClassKind::Object {
                    access_flags: class_def.access_flags,
                    superclass,
                },
            });
            loaded += 1;
        }
        log::debug!("Defined {} classes from DEX file", loaded);
        Ok(loaded)
    }
}

impl<'g> TypeResolver for ClassTable<'g> {
    type Class = &'g LoadedClass<'g>;

    fn resolve_type(&self, descriptor: &str) -> Result<&'g LoadedClass<'g>, ResolutionError> {
        if let Some(class) = self.lookup(descriptor) {
            return Ok(class);
        }

        let field_type = FieldType::parse(descriptor)
            .map_err(|_| ResolutionError::BadDescriptor(descriptor.to_owned()))?;
        let kind = match field_type.component_type() {
            Some(component) => ClassKind::Array {
                component: self.resolve_type(&component.render())?,
            },
            None if field_type.is_object() => {
                return Err(ResolutionError::NoClassDefFound(descriptor.to_owned()))
            }
            None => ClassKind::Primitive,
        };
        log::trace!("Defining {}", descriptor);
        Ok(self.define(LoadedClass {
            descriptor: descriptor.to_owned(),
            kind,
        }))
    }
}

/// A class known to a [`ClassTable`]
pub struct LoadedClass<'g> {
    /// Field type descriptor (eg. `Ljava/lang/String;`, `[I`, `Z`)
    pub descriptor: String,
    pub kind: ClassKind<'g>,
}

pub enum ClassKind<'g> {
    Primitive,
    Array {
        component: &'g LoadedClass<'g>,
    },
    Object {
        access_flags: ClassAccessFlags,

        /// Missing for `java/lang/Object` and for superclasses outside the table
        superclass: Option<&'g LoadedClass<'g>>,
    },
}

impl<'g> LoadedClass<'g> {
    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, ClassKind::Primitive)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ClassKind::Array { .. })
    }

    pub fn superclass(&self) -> Option<&'g LoadedClass<'g>> {
        match self.kind {
            ClassKind::Object { superclass, .. } => superclass,
            _ => None,
        }
    }
}

impl<'g> PartialEq for LoadedClass<'g> {
    fn eq(&self, other: &LoadedClass<'g>) -> bool {
        self.descriptor == other.descriptor
    }
}

impl<'g> Eq for LoadedClass<'g> {}

impl<'g> fmt::Debug for LoadedClass<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor)
    }
}
