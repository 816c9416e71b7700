//! Does a method touch anything annotated `@ReachabilitySensitive`?
//!
//! Objects whose fields or methods are reachability sensitive (typically because a finalizer or
//! cleaner frees native memory they point to) must be kept alive until their last use, so a
//! compiler can't let their references die early in a method that accesses them.
//!
//! This is a may-access check with a deliberately narrow search: only members declared by the
//! method's own class or by the classes lexically enclosing it (following `EnclosingClass` and
//! `EnclosingMethod`) are considered. A sensitive member declared anywhere else (eg. in a
//! superclass, or an unrelated class) is missed, so a `false` result is not a guarantee.

use super::{fast, well_known, AnnotationDirectory, AnnotationItem, AnnotationSet, Visibility};
use crate::dex::code::{InstructionRef, MemberIndex};
use crate::dex::{ClassDef, DexFile, EncodedValue, FormatError, MethodIndex, TypeIndex};

/// Bound on how many enclosing classes are followed (guards against cyclic annotations)
const MAX_ENCLOSING_CLASSES: usize = 16;

/// Does the body of `method` (declared in `class_def`) access a reachability-sensitive field or
/// method of its own class or an enclosing class?
///
/// Malformed data is logged and treated as "no access".
pub fn method_contains_reachability_sensitive_access(
    dex: &DexFile,
    class_def: &ClassDef,
    method: MethodIndex,
) -> bool {
    match scan_method(dex, class_def, method) {
        Ok(found) => found,
        Err(err) => {
            log::warn!(
                "Assuming no reachability-sensitive access in method {}: {:?}",
                method.0,
                err
            );
            false
        }
    }
}

/// Same as [`method_contains_reachability_sensitive_access`], but reporting malformed data
pub fn scan_method(
    dex: &DexFile,
    class_def: &ClassDef,
    method: MethodIndex,
) -> Result<bool, FormatError> {
    let code_off = match dex.class_data(class_def)? {
        None => return Ok(false),
        Some(class_data) => match class_data.find_method(method) {
            None => return Ok(false),
            Some(encoded) => encoded.code_off,
        },
    };
    if code_off == 0 {
        return Ok(false);
    }
    let code = dex.code_item(code_off)?;
    let searched = searched_classes(dex, class_def)?;

    for instruction in code.instructions() {
        let instruction = match InstructionRef::from_instruction(dex, &instruction?)? {
            None => continue,
            Some(instruction) => instruction,
        };
        let declaring = searched
            .iter()
            .find(|class_def| class_def.class == instruction.declaring_class);
        let declaring = match declaring {
            None => continue,
            Some(declaring) => declaring,
        };
        let sensitive = match instruction.member {
            MemberIndex::Field(field) => fast::field_reachability_sensitive(dex, declaring, field),
            MemberIndex::Method(method) => fast::method_reachability_sensitive(dex, declaring, method),
        };
        if sensitive {
            if log::log_enabled!(log::Level::Trace) {
                let member = instruction
                    .describe(dex)
                    .unwrap_or_else(|_| format!("{:?}", instruction.member));
                log::trace!(
                    "Reachability-sensitive access to {} at dex pc {:#x}",
                    member,
                    instruction.dex_pc
                );
            }
            return Ok(true);
        }
    }
    Ok(false)
}

/// The class itself followed by its chain of enclosing classes (as far as they are defined in
/// this file)
fn searched_classes(dex: &DexFile, class_def: &ClassDef) -> Result<Vec<ClassDef>, FormatError> {
    let mut searched = vec![*class_def];
    let mut current = *class_def;
    while searched.len() <= MAX_ENCLOSING_CLASSES {
        let enclosing = match enclosing_type(dex, &current)? {
            None => break,
            Some(enclosing) => enclosing,
        };
        if searched.iter().any(|class_def| class_def.class == enclosing) {
            break;
        }
        match dex.find_class_def(enclosing)? {
            None => break,
            Some(enclosing) => {
                searched.push(enclosing);
                current = enclosing;
            }
        }
    }
    Ok(searched)
}

/// Type of the class lexically enclosing `class_def` (without resolving anything)
fn enclosing_type(dex: &DexFile, class_def: &ClassDef) -> Result<Option<TypeIndex>, FormatError> {
    let set = match AnnotationDirectory::build(dex, class_def)? {
        None => return Ok(None),
        Some(directory) => match directory.class_annotations(dex.data())? {
            None => return Ok(None),
            Some(set) => set,
        },
    };

    if let Some(EncodedValue::Type(type_index)) =
        system_value(dex, &set, well_known::ENCLOSING_CLASS)?
    {
        return Ok(Some(type_index));
    }
    if let Some(EncodedValue::Method(method)) =
        system_value(dex, &set, well_known::ENCLOSING_METHOD)?
    {
        return Ok(Some(dex.method_id(method)?.class));
    }
    Ok(None)
}

/// `value` element of a system annotation in a set
fn system_value<'a>(
    dex: &DexFile<'a>,
    set: &AnnotationSet<'a>,
    descriptor: &str,
) -> Result<Option<EncodedValue<'a>>, FormatError> {
    let type_index = match dex.find_type(descriptor)? {
        None => return Ok(None),
        Some(type_index) => type_index,
    };
    let mut found: Option<AnnotationItem<'a>> = None;
    for item in set.items() {
        let item = item?;
        if item.visibility == Visibility::System && item.type_index == type_index {
            found = Some(item);
            break;
        }
    }
    let item = match found {
        None => return Ok(None),
        Some(item) => item,
    };
    match dex.find_string("value")? {
        None => Ok(None),
        Some(name) => item.element_value(name),
    }
}
