use super::{
    Annotation, AnnotationDirectory, AnnotationItem, AnnotationSet, AnnotationSetRefList, Error,
    MemberRef, TypeRef, Value, Visibility,
};
use crate::dex::{
    ClassDef, DexFile, EncodedAnnotation, EncodedValue, FieldIndex, FormatError, MethodIndex,
    RenderDescriptor, TypeIndex,
};
use crate::runtime::{Resolution, TypeResolver};
use elsa::sync::FrozenMap;

/// What an annotation set is attached to, within one class
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Target {
    Class,
    Field(FieldIndex),
    Method(MethodIndex),
}

/// Annotation queries over one DEX file
///
/// Directories are parsed the first time a class is queried and cached by offset. The cache is
/// insert-if-absent: two threads querying the same class for the first time may both parse the
/// directory, and whichever inserts first wins (the results are identical anyway).
///
/// Type comparisons never resolve anything. Type ids in a DEX file are unique per descriptor, so
/// looking up the descriptor once and comparing type indices is the same as comparing
/// descriptors.
pub struct Annotations<'a> {
    dex: DexFile<'a>,
    directories: FrozenMap<u32, Box<AnnotationDirectory>>,
}

impl<'a> Annotations<'a> {
    pub fn new(dex: DexFile<'a>) -> Annotations<'a> {
        Annotations {
            dex,
            directories: FrozenMap::new(),
        }
    }

    pub fn dex(&self) -> &DexFile<'a> {
        &self.dex
    }

    /// Annotations directory of a class
    pub fn directory(&self, class_def: &ClassDef) -> Result<Option<AnnotationDirectory>, FormatError> {
        let offset = class_def.annotations_off;
        if offset == 0 {
            return Ok(None);
        }
        if let Some(directory) = self.directories.get(&offset) {
            return Ok(Some(*directory));
        }
        let directory = AnnotationDirectory::parse(self.dex.data(), offset)?;
        Ok(Some(*self.directories.insert(offset, Box::new(directory))))
    }

    /// Annotation set attached to a class or one of its members
    pub fn annotation_set(
        &self,
        class_def: &ClassDef,
        target: Target,
    ) -> Result<Option<AnnotationSet<'a>>, FormatError> {
        let directory = match self.directory(class_def)? {
            None => return Ok(None),
            Some(directory) => directory,
        };
        let data = self.dex.data();
        match target {
            Target::Class => directory.class_annotations(data),
            Target::Field(field) => directory.annotations_for_field(data, field),
            Target::Method(method) => directory.annotations_for_method(data, method),
        }
    }

    /// Annotation sets of the parameters of a method
    pub fn parameter_annotation_sets(
        &self,
        class_def: &ClassDef,
        method: MethodIndex,
    ) -> Result<Option<AnnotationSetRefList<'a>>, FormatError> {
        match self.directory(class_def)? {
            None => Ok(None),
            Some(directory) => directory.annotations_for_parameters(self.dex.data(), method),
        }
    }

    /// First item in a set with the given type and exactly the given visibility
    pub fn find_in_set(
        &self,
        set: &AnnotationSet<'a>,
        descriptor: &str,
        visibility: Visibility,
    ) -> Result<Option<AnnotationItem<'a>>, FormatError> {
        // A type that isn't in the file can't annotate anything in it
        let type_index = match self.dex.find_type(descriptor)? {
            None => return Ok(None),
            Some(type_index) => type_index,
        };
        for item in set.items() {
            let item = item?;
            if item.visibility == visibility && item.type_index == type_index {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    pub fn is_present_in_set(
        &self,
        set: &AnnotationSet<'a>,
        descriptor: &str,
        visibility: Visibility,
    ) -> Result<bool, FormatError> {
        self.find_in_set(set, descriptor, visibility)
            .map(|item| item.is_some())
    }

    /// First annotation of the given type and visibility on a class or member
    pub fn find(
        &self,
        class_def: &ClassDef,
        target: Target,
        descriptor: &str,
        visibility: Visibility,
    ) -> Result<Option<AnnotationItem<'a>>, FormatError> {
        match self.annotation_set(class_def, target)? {
            None => Ok(None),
            Some(set) => self.find_in_set(&set, descriptor, visibility),
        }
    }

    /// Is there a runtime-visible annotation of the given type on a class or member?
    pub fn is_present(
        &self,
        class_def: &ClassDef,
        target: Target,
        descriptor: &str,
    ) -> Result<bool, FormatError> {
        self.is_present_with_visibility(class_def, target, descriptor, Visibility::Runtime)
    }

    pub fn is_present_with_visibility(
        &self,
        class_def: &ClassDef,
        target: Target,
        descriptor: &str,
        visibility: Visibility,
    ) -> Result<bool, FormatError> {
        self.find(class_def, target, descriptor, visibility)
            .map(|item| item.is_some())
    }

    /// Value of one element of the first matching annotation, without decoding anything else
    pub fn find_element_value(
        &self,
        class_def: &ClassDef,
        target: Target,
        descriptor: &str,
        visibility: Visibility,
        element_name: &str,
    ) -> Result<Option<EncodedValue<'a>>, FormatError> {
        let item = match self.find(class_def, target, descriptor, visibility)? {
            None => return Ok(None),
            Some(item) => item,
        };
        match self.dex.find_string(element_name)? {
            None => Ok(None),
            Some(name) => item.element_value(name),
        }
    }

    /// Decode the first runtime-visible annotation of the given type on a class or member
    pub fn get<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        target: Target,
        descriptor: &str,
        resolution: &Resolution<R>,
    ) -> Result<Option<Annotation<R::Class>>, Error> {
        self.get_with_visibility(class_def, target, descriptor, Visibility::Runtime, resolution)
    }

    pub fn get_with_visibility<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        target: Target,
        descriptor: &str,
        visibility: Visibility,
        resolution: &Resolution<R>,
    ) -> Result<Option<Annotation<R::Class>>, Error> {
        match self.annotation_set(class_def, target)? {
            None => Ok(None),
            Some(set) => self.get_from_set(&set, descriptor, visibility, resolution),
        }
    }

    pub fn get_from_set<R: TypeResolver>(
        &self,
        set: &AnnotationSet<'a>,
        descriptor: &str,
        visibility: Visibility,
        resolution: &Resolution<R>,
    ) -> Result<Option<Annotation<R::Class>>, Error> {
        match self.find_in_set(set, descriptor, visibility)? {
            None => Ok(None),
            Some(item) => self.materialize(&item, resolution).map(Some),
        }
    }

    /// Decode all runtime-visible annotations on a class or member, in declaration order
    ///
    /// When resolving eagerly, annotations whose own type can't be resolved are skipped (the
    /// annotation class isn't available, so there is nothing to hand back). Failing to resolve
    /// anything inside an annotation is still an error.
    pub fn get_all<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        target: Target,
        resolution: &Resolution<R>,
    ) -> Result<Vec<Annotation<R::Class>>, Error> {
        match self.annotation_set(class_def, target)? {
            None => Ok(vec![]),
            Some(set) => self.get_all_from_set(&set, resolution),
        }
    }

    pub fn get_all_from_set<R: TypeResolver>(
        &self,
        set: &AnnotationSet<'a>,
        resolution: &Resolution<R>,
    ) -> Result<Vec<Annotation<R::Class>>, Error> {
        let mut annotations = vec![];
        for item in set.items() {
            let item = item?;
            if item.visibility != Visibility::Runtime {
                continue;
            }
            if let Resolution::Eager(resolver) = resolution {
                let descriptor = self.dex.type_descriptor(item.type_index)?;
                if let Err(err) = resolver.resolve_type(&descriptor) {
                    log::debug!("Skipping annotation {}: {:?}", descriptor, err);
                    continue;
                }
            }
            annotations.push(self.materialize(&item, resolution)?);
        }
        Ok(annotations)
    }

    /// Number of entries in the parameter annotations of a method
    ///
    /// This can be less than the number of declared parameters (eg. for synthetic parameters
    /// that javac doesn't track).
    pub fn annotated_parameter_count(
        &self,
        class_def: &ClassDef,
        method: MethodIndex,
    ) -> Result<usize, FormatError> {
        Ok(self
            .parameter_annotation_sets(class_def, method)?
            .map_or(0, |refs| refs.len()))
    }

    /// Decode the first runtime-visible annotation of a type on one parameter of a method
    pub fn get_parameter_annotation<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        method: MethodIndex,
        parameter: usize,
        descriptor: &str,
        resolution: &Resolution<R>,
    ) -> Result<Option<Annotation<R::Class>>, Error> {
        let refs = match self.parameter_annotation_sets(class_def, method)? {
            None => return Ok(None),
            Some(refs) => refs,
        };
        match refs.set(parameter)? {
            None => Ok(None),
            Some(set) => self.get_from_set(&set, descriptor, Visibility::Runtime, resolution),
        }
    }

    /// Decode all runtime-visible annotations of every parameter of a method
    ///
    /// There is one entry per entry in the parameter annotations list (see
    /// [`Annotations::annotated_parameter_count`]).
    pub fn get_parameter_annotations<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        method: MethodIndex,
        resolution: &Resolution<R>,
    ) -> Result<Vec<Vec<Annotation<R::Class>>>, Error> {
        let refs = match self.parameter_annotation_sets(class_def, method)? {
            None => return Ok(vec![]),
            Some(refs) => refs,
        };
        let mut parameters = Vec::with_capacity(refs.len());
        for set in refs.sets() {
            parameters.push(match set? {
                None => vec![],
                Some(set) => self.get_all_from_set(&set, resolution)?,
            });
        }
        Ok(parameters)
    }

    /// Decode an annotation item, resolving types as requested
    pub fn materialize<R: TypeResolver>(
        &self,
        item: &AnnotationItem<'a>,
        resolution: &Resolution<R>,
    ) -> Result<Annotation<R::Class>, Error> {
        self.materialize_annotation(&item.annotation()?, item.visibility, resolution)
    }

    /// Decode an encoded annotation (nested annotations take on `visibility`)
    pub fn materialize_annotation<R: TypeResolver>(
        &self,
        annotation: &EncodedAnnotation<'a>,
        visibility: Visibility,
        resolution: &Resolution<R>,
    ) -> Result<Annotation<R::Class>, Error> {
        let annotation_type = self.resolve_type(annotation.type_index, resolution)?;
        let mut elements = Vec::with_capacity(annotation.len());
        for element in annotation.elements() {
            let element = element?;
            let name = self.dex.string(element.name)?.into_owned();
            let value = self.materialize_value(&element.value, visibility, resolution)?;
            elements.push((name, value));
        }
        Ok(Annotation {
            annotation_type,
            visibility,
            elements,
        })
    }

    /// Decode one value, resolving types as requested
    pub fn materialize_value<R: TypeResolver>(
        &self,
        value: &EncodedValue<'a>,
        visibility: Visibility,
        resolution: &Resolution<R>,
    ) -> Result<Value<R::Class>, Error> {
        let value = match *value {
            EncodedValue::Byte(byte) => Value::Byte(byte),
            EncodedValue::Short(short) => Value::Short(short),
            EncodedValue::Char(character) => Value::Char(character),
            EncodedValue::Int(int) => Value::Int(int),
            EncodedValue::Long(long) => Value::Long(long),
            EncodedValue::Float(float) => Value::Float(float),
            EncodedValue::Double(double) => Value::Double(double),
            EncodedValue::Boolean(boolean) => Value::Boolean(boolean),
            EncodedValue::Null => Value::Null,
            EncodedValue::String(string) => Value::String(self.dex.string(string)?.into_owned()),
            EncodedValue::Type(type_index) => Value::Type(self.resolve_type(type_index, resolution)?),
            EncodedValue::Field(field) => Value::Field(self.field_ref(field, resolution)?),
            EncodedValue::Enum(field) => Value::Enum(self.field_ref(field, resolution)?),
            EncodedValue::Method(method) => Value::Method(self.method_ref(method, resolution)?),
            EncodedValue::MethodType(proto) => {
                Value::MethodType(self.dex.proto_descriptor(proto)?.render())
            }
            EncodedValue::MethodHandle(handle) => Value::MethodHandle(handle),
            EncodedValue::Array(array) => {
                let mut values = Vec::with_capacity(array.len());
                for element in &array {
                    values.push(self.materialize_value(&element?, visibility, resolution)?);
                }
                Value::Array(values)
            }
            EncodedValue::Annotation(annotation) => {
                Value::Annotation(self.materialize_annotation(&annotation, visibility, resolution)?)
            }
        };
        Ok(value)
    }

    pub fn resolve_type<R: TypeResolver>(
        &self,
        type_index: TypeIndex,
        resolution: &Resolution<R>,
    ) -> Result<TypeRef<R::Class>, Error> {
        let descriptor = self.dex.type_descriptor(type_index)?;
        Ok(resolution.resolve(&descriptor)?)
    }

    pub fn field_ref<R: TypeResolver>(
        &self,
        field: FieldIndex,
        resolution: &Resolution<R>,
    ) -> Result<MemberRef<R::Class>, Error> {
        let field_id = self.dex.field_id(field)?;
        Ok(MemberRef {
            declaring_class: self.resolve_type(field_id.class, resolution)?,
            name: self.dex.string(field_id.name)?.into_owned(),
            descriptor: self.dex.type_descriptor(field_id.field_type)?.into_owned(),
        })
    }

    pub fn method_ref<R: TypeResolver>(
        &self,
        method: MethodIndex,
        resolution: &Resolution<R>,
    ) -> Result<MemberRef<R::Class>, Error> {
        let method_id = self.dex.method_id(method)?;
        Ok(MemberRef {
            declaring_class: self.resolve_type(method_id.class, resolution)?,
            name: self.dex.string(method_id.name)?.into_owned(),
            descriptor: self.dex.proto_descriptor(method_id.proto)?.render(),
        })
    }
}
