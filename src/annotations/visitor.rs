use super::{AnnotationSet, Annotations, Target, Visibility};
use crate::dex::{
    ClassDef, DexFile, EncodedAnnotation, EncodedArray, EncodedValue, FormatError, ValueType,
};

/// What a visitor wants to happen next
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum VisitorStatus {
    /// Stop the whole traversal
    Break,

    /// Skip the contents of the current annotation, array, or nested annotation
    Next,

    /// Visit the contents of the current annotation, array, or nested annotation
    Inner,
}

/// Error slot of a visitor (only the first error is kept)
#[derive(Clone, Debug, Default)]
pub struct VisitorErrors {
    first: Option<FormatError>,
}

impl VisitorErrors {
    pub fn record(&mut self, error: FormatError) {
        if self.first.is_none() {
            self.first = Some(error);
        }
    }

    pub fn has_error(&self) -> bool {
        self.first.is_some()
    }

    pub fn error(&self) -> Option<&FormatError> {
        self.first.as_ref()
    }

    pub fn take(&mut self) -> Option<FormatError> {
        self.first.take()
    }
}

/// Streaming walk over annotations, without materializing any values
///
/// Annotations are visited in declaration order and their elements in increasing order of name
/// index. Scalars and references are passed as decoded but unresolved values. The contents of an
/// annotation, array, or nested annotation are only visited if the callback for it returned
/// [`VisitorStatus::Inner`].
///
/// Decoding errors are recorded in [`AnnotationVisitor::errors`] and end the traversal.
pub trait AnnotationVisitor {
    fn visit_annotation(&mut self, descriptor: &str, visibility: Visibility) -> VisitorStatus;

    fn visit_annotation_element(
        &mut self,
        name: &str,
        value_type: ValueType,
        value: &EncodedValue,
    ) -> VisitorStatus;

    /// Element of an array value
    ///
    /// `depth` is 0 for arrays that are element values and increases by one for each array
    /// nested inside.
    fn visit_array_element(
        &mut self,
        depth: usize,
        index: usize,
        value_type: ValueType,
        value: &EncodedValue,
    ) -> VisitorStatus;

    /// Called once all elements of an annotation (top-level or nested) have been visited
    ///
    /// Not called for annotations whose contents were skipped, nor when the traversal breaks.
    fn leave_annotation(&mut self) {}

    fn errors(&mut self) -> &mut VisitorErrors;
}

/// Visit every annotation in a set
///
/// Returns `Break` if the traversal was cut short (by the visitor or by an error).
pub fn visit_set<V: AnnotationVisitor + ?Sized>(
    dex: &DexFile,
    set: &AnnotationSet,
    visitor: &mut V,
) -> VisitorStatus {
    match walk_set(dex, set, visitor) {
        Ok(status) => status,
        Err(err) => {
            visitor.errors().record(err);
            VisitorStatus::Break
        }
    }
}

fn walk_set<V: AnnotationVisitor + ?Sized>(
    dex: &DexFile,
    set: &AnnotationSet,
    visitor: &mut V,
) -> Result<VisitorStatus, FormatError> {
    for item in set.items() {
        let item = item?;
        let annotation = item.annotation()?;
        if walk_annotation(dex, item.visibility, &annotation, visitor)? == VisitorStatus::Break {
            return Ok(VisitorStatus::Break);
        }
    }
    Ok(VisitorStatus::Next)
}

fn walk_annotation<V: AnnotationVisitor + ?Sized>(
    dex: &DexFile,
    visibility: Visibility,
    annotation: &EncodedAnnotation,
    visitor: &mut V,
) -> Result<VisitorStatus, FormatError> {
    let descriptor = dex.type_descriptor(annotation.type_index)?;
    match visitor.visit_annotation(&descriptor, visibility) {
        VisitorStatus::Break => return Ok(VisitorStatus::Break),
        VisitorStatus::Next => return Ok(VisitorStatus::Next),
        VisitorStatus::Inner => (),
    }

    for element in annotation.elements() {
        let element = element?;
        let name = dex.string(element.name)?;
        let value = element.value;
        match visitor.visit_annotation_element(&name, value.value_type(), &value) {
            VisitorStatus::Break => return Ok(VisitorStatus::Break),
            VisitorStatus::Next => continue,
            VisitorStatus::Inner => (),
        }
        if walk_value(dex, visibility, &value, 0, visitor)? == VisitorStatus::Break {
            return Ok(VisitorStatus::Break);
        }
    }
    visitor.leave_annotation();
    Ok(VisitorStatus::Next)
}

/// Descend into an array or nested annotation (other values have nothing inside)
fn walk_value<V: AnnotationVisitor + ?Sized>(
    dex: &DexFile,
    visibility: Visibility,
    value: &EncodedValue,
    depth: usize,
    visitor: &mut V,
) -> Result<VisitorStatus, FormatError> {
    match value {
        EncodedValue::Array(array) => walk_array(dex, visibility, array, depth, visitor),
        EncodedValue::Annotation(nested) => walk_annotation(dex, visibility, nested, visitor),
        _ => Ok(VisitorStatus::Next),
    }
}

fn walk_array<V: AnnotationVisitor + ?Sized>(
    dex: &DexFile,
    visibility: Visibility,
    array: &EncodedArray,
    depth: usize,
    visitor: &mut V,
) -> Result<VisitorStatus, FormatError> {
    for (index, value) in array.iter().enumerate() {
        let value = value?;
        match visitor.visit_array_element(depth, index, value.value_type(), &value) {
            VisitorStatus::Break => return Ok(VisitorStatus::Break),
            VisitorStatus::Next => continue,
            VisitorStatus::Inner => (),
        }
        if walk_value(dex, visibility, &value, depth + 1, visitor)? == VisitorStatus::Break {
            return Ok(VisitorStatus::Break);
        }
    }
    Ok(VisitorStatus::Next)
}

impl<'a> Annotations<'a> {
    /// Stream the annotations of a class or member through a visitor
    pub fn visit<V: AnnotationVisitor + ?Sized>(
        &self,
        class_def: &ClassDef,
        target: Target,
        visitor: &mut V,
    ) -> VisitorStatus {
        match self.annotation_set(class_def, target) {
            Ok(None) => VisitorStatus::Next,
            Ok(Some(set)) => visit_set(self.dex(), &set, visitor),
            Err(err) => {
                visitor.errors().record(err);
                VisitorStatus::Break
            }
        }
    }

    pub fn visit_class_annotations<V: AnnotationVisitor + ?Sized>(
        &self,
        class_def: &ClassDef,
        visitor: &mut V,
    ) -> VisitorStatus {
        self.visit(class_def, Target::Class, visitor)
    }
}
