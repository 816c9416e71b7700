//! Build-time optimization hints (`dalvik.annotation.optimization.*`)
//!
//! These are checked by compilers for every method they touch, so they skip the directory cache,
//! never resolve anything, and never fail: a malformed directory or set just means the hint is
//! absent (and gets logged). Each check has an `_in` variant taking an annotation set that was
//! already looked up, for callers that check several hints on the same member.

use super::{well_known, AnnotationDirectory, AnnotationSet, Visibility};
use crate::dex::{ClassDef, DexFile, FieldIndex, FormatError, MethodIndex, NativeMethodFlags};

fn or_absent<T>(result: Result<Option<T>, FormatError>, what: &str) -> Option<T> {
    match result {
        Ok(found) => found,
        Err(err) => {
            log::warn!("Treating {} as unannotated: {:?}", what, err);
            None
        }
    }
}

/// Annotation set of a method (for the `_in` variants)
pub fn method_annotation_set<'a>(
    dex: &DexFile<'a>,
    class_def: &ClassDef,
    method: MethodIndex,
) -> Option<AnnotationSet<'a>> {
    let set = AnnotationDirectory::build(dex, class_def).and_then(|directory| match directory {
        None => Ok(None),
        Some(directory) => directory.annotations_for_method(dex.data(), method),
    });
    or_absent(set, "method")
}

/// Annotation set of a field (for the `_in` variants)
pub fn field_annotation_set<'a>(
    dex: &DexFile<'a>,
    class_def: &ClassDef,
    field: FieldIndex,
) -> Option<AnnotationSet<'a>> {
    let set = AnnotationDirectory::build(dex, class_def).and_then(|directory| match directory {
        None => Ok(None),
        Some(directory) => directory.annotations_for_field(dex.data(), field),
    });
    or_absent(set, "field")
}

/// Annotation set of a class
pub fn class_annotation_set<'a>(dex: &DexFile<'a>, class_def: &ClassDef) -> Option<AnnotationSet<'a>> {
    let set = AnnotationDirectory::build(dex, class_def).and_then(|directory| match directory {
        None => Ok(None),
        Some(directory) => directory.class_annotations(dex.data()),
    });
    or_absent(set, "class")
}

/// Is there a build-visible annotation of the given type in the set?
fn is_build_annotation_present(dex: &DexFile, set: Option<&AnnotationSet>, descriptor: &str) -> bool {
    let set = match set {
        None => return false,
        Some(set) => set,
    };
    let found = dex.find_type(descriptor).and_then(|type_index| {
        let type_index = match type_index {
            None => return Ok(false),
            Some(type_index) => type_index,
        };
        for item in set.items() {
            let item = item?;
            if item.visibility == Visibility::Build && item.type_index == type_index {
                return Ok(true);
            }
        }
        Ok(false)
    });
    match found {
        Ok(found) => found,
        Err(err) => {
            log::warn!("Treating {} as absent: {:?}", descriptor, err);
            false
        }
    }
}

/// Extra access flags for a native method annotated `@FastNative` or `@CriticalNative`
pub fn native_method_flags(
    dex: &DexFile,
    class_def: &ClassDef,
    method: MethodIndex,
) -> NativeMethodFlags {
    native_method_flags_in(dex, method_annotation_set(dex, class_def, method).as_ref())
}

pub fn native_method_flags_in(dex: &DexFile, set: Option<&AnnotationSet>) -> NativeMethodFlags {
    let mut flags = NativeMethodFlags::empty();
    if is_build_annotation_present(dex, set, well_known::FAST_NATIVE) {
        flags |= NativeMethodFlags::FAST_NATIVE;
    }
    if is_build_annotation_present(dex, set, well_known::CRITICAL_NATIVE) {
        flags |= NativeMethodFlags::CRITICAL_NATIVE;
    }
    flags
}

/// Is the method annotated `@NeverCompile`?
pub fn never_compile(dex: &DexFile, class_def: &ClassDef, method: MethodIndex) -> bool {
    never_compile_in(dex, method_annotation_set(dex, class_def, method).as_ref())
}

pub fn never_compile_in(dex: &DexFile, set: Option<&AnnotationSet>) -> bool {
    is_build_annotation_present(dex, set, well_known::NEVER_COMPILE)
}

/// Is the method annotated `@NeverInline`?
pub fn never_inline(dex: &DexFile, class_def: &ClassDef, method: MethodIndex) -> bool {
    never_inline_in(dex, method_annotation_set(dex, class_def, method).as_ref())
}

pub fn never_inline_in(dex: &DexFile, set: Option<&AnnotationSet>) -> bool {
    is_build_annotation_present(dex, set, well_known::NEVER_INLINE)
}

/// Is the field annotated `@ReachabilitySensitive`?
pub fn field_reachability_sensitive(dex: &DexFile, class_def: &ClassDef, field: FieldIndex) -> bool {
    reachability_sensitive_in(dex, field_annotation_set(dex, class_def, field).as_ref())
}

/// Is the method annotated `@ReachabilitySensitive`?
pub fn method_reachability_sensitive(
    dex: &DexFile,
    class_def: &ClassDef,
    method: MethodIndex,
) -> bool {
    reachability_sensitive_in(dex, method_annotation_set(dex, class_def, method).as_ref())
}

/// Does the field or method annotation set contain `@ReachabilitySensitive`?
pub fn reachability_sensitive_in(dex: &DexFile, set: Option<&AnnotationSet>) -> bool {
    is_build_annotation_present(dex, set, well_known::REACHABILITY_SENSITIVE)
}

/// Is the class annotated `@DeadReferenceSafe`?
pub fn dead_reference_safe(dex: &DexFile, class_def: &ClassDef) -> bool {
    dead_reference_safe_in(dex, class_annotation_set(dex, class_def).as_ref())
}

pub fn dead_reference_safe_in(dex: &DexFile, set: Option<&AnnotationSet>) -> bool {
    is_build_annotation_present(dex, set, well_known::DEAD_REFERENCE_SAFE)
}
