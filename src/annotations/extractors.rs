//! Accessors for the `dalvik.annotation.*` system annotations
//!
//! Compilers record Java-level metadata that has no place in the DEX format itself (generic
//! signatures, `throws` clauses, inner class names, ...) as system-visible annotations. Each
//! accessor here looks up one well-known annotation and pulls out its elements by name.
//!
//! An element with an unexpected type is treated like a missing annotation (and logged), since
//! there is no sensible value to return for it.

use super::{
    well_known, Annotations, Error, MemberRef, Target, TypeRef, Value, Visibility,
};
use crate::dex::{
    ClassAccessFlags, ClassDef, EncodedArray, EncodedValue, FormatError, InnerClassAccessFlags,
    MethodIndex,
};
use crate::runtime::{Resolution, TypeResolver};

/// Contents of `dalvik.annotation.InnerClass`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InnerClass {
    /// Simple name of the class (`None` for anonymous classes)
    pub name: Option<String>,

    /// Flags the class was declared with in source
    pub access_flags: InnerClassAccessFlags,
}

/// Contents of `dalvik.annotation.MethodParameters`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodParameters {
    /// Parameter names (`None` where the name wasn't recorded)
    pub names: Vec<Option<String>>,
    pub access_flags: Vec<u32>,
}

fn unexpected(descriptor: &str, element: &str, value: &EncodedValue) {
    log::debug!(
        "Ignoring {} with unexpected {:?} value for '{}'",
        descriptor,
        value.value_type(),
        element
    );
}

impl<'a> Annotations<'a> {
    /// Element of a system annotation
    fn system_element(
        &self,
        class_def: &ClassDef,
        target: Target,
        descriptor: &str,
        element_name: &str,
    ) -> Result<Option<EncodedValue<'a>>, FormatError> {
        self.find_element_value(class_def, target, descriptor, Visibility::System, element_name)
    }

    /// Strings of an array of strings
    fn strings(&self, array: &EncodedArray<'a>) -> Result<Option<Vec<String>>, FormatError> {
        let mut strings = Vec::with_capacity(array.len());
        for value in array {
            match value? {
                EncodedValue::String(string) => strings.push(self.dex().string(string)?.into_owned()),
                _ => return Ok(None),
            }
        }
        Ok(Some(strings))
    }

    /// Types of an array of types
    fn types<R: TypeResolver>(
        &self,
        array: &EncodedArray<'a>,
        resolution: &Resolution<R>,
    ) -> Result<Option<Vec<TypeRef<R::Class>>>, Error> {
        let mut types = Vec::with_capacity(array.len());
        for value in array {
            match value? {
                EncodedValue::Type(type_index) => types.push(self.resolve_type(type_index, resolution)?),
                _ => return Ok(None),
            }
        }
        Ok(Some(types))
    }

    /// Array-of-types element of a system annotation
    fn system_type_array<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        target: Target,
        descriptor: &str,
        element_name: &str,
        resolution: &Resolution<R>,
    ) -> Result<Option<Vec<TypeRef<R::Class>>>, Error> {
        match self.system_element(class_def, target, descriptor, element_name)? {
            None => Ok(None),
            Some(EncodedValue::Array(array)) => {
                let types = self.types(&array, resolution)?;
                if types.is_none() {
                    log::debug!("Ignoring {} with non-type entries", descriptor);
                }
                Ok(types)
            }
            Some(other) => {
                unexpected(descriptor, element_name, &other);
                Ok(None)
            }
        }
    }

    /// Type element of a system annotation
    fn system_type<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        descriptor: &str,
        element_name: &str,
        resolution: &Resolution<R>,
    ) -> Result<Option<TypeRef<R::Class>>, Error> {
        match self.system_element(class_def, Target::Class, descriptor, element_name)? {
            None => Ok(None),
            Some(EncodedValue::Type(type_index)) => {
                self.resolve_type(type_index, resolution).map(Some)
            }
            Some(other) => {
                unexpected(descriptor, element_name, &other);
                Ok(None)
            }
        }
    }

    /// Generic signature of a class, field, or method
    ///
    /// The signature is stored as an array of string fragments (split so that the fragments can
    /// share string ids), which get concatenated back together here.
    pub fn signature(
        &self,
        class_def: &ClassDef,
        target: Target,
    ) -> Result<Option<String>, FormatError> {
        let descriptor = well_known::SIGNATURE;
        match self.system_element(class_def, target, descriptor, "value")? {
            None => Ok(None),
            Some(EncodedValue::Array(array)) => match self.strings(&array)? {
                Some(fragments) => Ok(Some(fragments.concat())),
                None => {
                    log::debug!("Ignoring {} with non-string fragments", descriptor);
                    Ok(None)
                }
            },
            Some(other) => {
                unexpected(descriptor, "value", &other);
                Ok(None)
            }
        }
    }

    /// Checked exceptions a method declares it throws
    pub fn exceptions<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        method: MethodIndex,
        resolution: &Resolution<R>,
    ) -> Result<Option<Vec<TypeRef<R::Class>>>, Error> {
        self.system_type_array(
            class_def,
            Target::Method(method),
            well_known::THROWS,
            "value",
            resolution,
        )
    }

    /// Default value of an annotation type's element
    ///
    /// Defaults aren't stored on the element's method but on its declaring class, as one
    /// `AnnotationDefault` annotation whose value is an annotation instance with one element per
    /// method that has a default. Only annotation types have defaults.
    pub fn annotation_default<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        method: MethodIndex,
        resolution: &Resolution<R>,
    ) -> Result<Option<Value<R::Class>>, Error> {
        if !class_def.access_flags.contains(ClassAccessFlags::ANNOTATION) {
            return Ok(None);
        }
        let descriptor = well_known::ANNOTATION_DEFAULT;
        let defaults = match self.system_element(class_def, Target::Class, descriptor, "value")? {
            None => return Ok(None),
            Some(EncodedValue::Annotation(defaults)) => defaults,
            Some(other) => {
                unexpected(descriptor, "value", &other);
                return Ok(None);
            }
        };

        // Element names are string ids, so the method's name id is the key
        let method_name = self.dex().method_id(method)?.name;
        match defaults.element_value(method_name)? {
            None => Ok(None),
            Some(value) => self
                .materialize_value(&value, Visibility::Runtime, resolution)
                .map(Some),
        }
    }

    /// Class that lexically declares a member class
    ///
    /// Local and anonymous classes have no declaring class (see
    /// [`Annotations::enclosing_class`]).
    pub fn declaring_class<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        resolution: &Resolution<R>,
    ) -> Result<Option<TypeRef<R::Class>>, Error> {
        self.system_type(class_def, well_known::ENCLOSING_CLASS, "value", resolution)
    }

    /// Class that lexically encloses a class
    ///
    /// This is the declaring class for member classes and the class of the enclosing method for
    /// local and anonymous classes.
    pub fn enclosing_class<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        resolution: &Resolution<R>,
    ) -> Result<Option<TypeRef<R::Class>>, Error> {
        if let Some(declaring) = self.declaring_class(class_def, resolution)? {
            return Ok(Some(declaring));
        }
        Ok(self
            .enclosing_method(class_def, resolution)?
            .map(|method| method.declaring_class))
    }

    /// Method that lexically encloses a local or anonymous class
    pub fn enclosing_method<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        resolution: &Resolution<R>,
    ) -> Result<Option<MemberRef<R::Class>>, Error> {
        let descriptor = well_known::ENCLOSING_METHOD;
        match self.system_element(class_def, Target::Class, descriptor, "value")? {
            None => Ok(None),
            Some(EncodedValue::Method(method)) => self.method_ref(method, resolution).map(Some),
            Some(other) => {
                unexpected(descriptor, "value", &other);
                Ok(None)
            }
        }
    }

    /// Source name and flags of an inner class
    pub fn inner_class(&self, class_def: &ClassDef) -> Result<Option<InnerClass>, FormatError> {
        let descriptor = well_known::INNER_CLASS;
        let item = match self.find(class_def, Target::Class, descriptor, Visibility::System)? {
            None => return Ok(None),
            Some(item) => item,
        };
        let annotation = item.annotation()?;

        let mut name = None;
        let mut access_flags = None;
        for element in annotation.elements() {
            let element = element?;
            match (self.dex().string(element.name)?.as_ref(), element.value) {
                ("name", EncodedValue::Null) => name = Some(None),
                ("name", EncodedValue::String(string)) => {
                    name = Some(Some(self.dex().string(string)?.into_owned()))
                }
                ("accessFlags", EncodedValue::Int(flags)) => {
                    access_flags = Some(InnerClassAccessFlags::from_bits_truncate(flags as u32))
                }
                (other, value) => unexpected(descriptor, other, &value),
            }
        }

        match (name, access_flags) {
            (Some(name), Some(access_flags)) => Ok(Some(InnerClass { name, access_flags })),
            _ => {
                log::debug!("Ignoring incomplete {}", descriptor);
                Ok(None)
            }
        }
    }

    /// Simple source name of an inner class (`Some(None)` for anonymous classes)
    pub fn inner_class_name(
        &self,
        class_def: &ClassDef,
    ) -> Result<Option<Option<String>>, FormatError> {
        Ok(self.inner_class(class_def)?.map(|inner| inner.name))
    }

    pub fn inner_class_flags(
        &self,
        class_def: &ClassDef,
    ) -> Result<Option<InnerClassAccessFlags>, FormatError> {
        Ok(self.inner_class(class_def)?.map(|inner| inner.access_flags))
    }

    /// Host of the nest a class belongs to
    pub fn nest_host<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        resolution: &Resolution<R>,
    ) -> Result<Option<TypeRef<R::Class>>, Error> {
        self.system_type(class_def, well_known::NEST_HOST, "host", resolution)
    }

    /// Members of the nest hosted by a class
    pub fn nest_members<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        resolution: &Resolution<R>,
    ) -> Result<Option<Vec<TypeRef<R::Class>>>, Error> {
        self.system_type_array(
            class_def,
            Target::Class,
            well_known::NEST_MEMBERS,
            "classes",
            resolution,
        )
    }

    /// Permitted subclasses of a sealed class
    pub fn permitted_subclasses<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        resolution: &Resolution<R>,
    ) -> Result<Option<Vec<TypeRef<R::Class>>>, Error> {
        self.system_type_array(
            class_def,
            Target::Class,
            well_known::PERMITTED_SUBCLASSES,
            "value",
            resolution,
        )
    }

    /// Member classes declared by a class
    pub fn member_classes<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        resolution: &Resolution<R>,
    ) -> Result<Option<Vec<TypeRef<R::Class>>>, Error> {
        self.system_type_array(
            class_def,
            Target::Class,
            well_known::MEMBER_CLASSES,
            "value",
            resolution,
        )
    }

    /// `SourceDebugExtension` attribute (eg. an SMAP) carried over from the class file
    pub fn source_debug_extension(&self, class_def: &ClassDef) -> Result<Option<String>, FormatError> {
        let descriptor = well_known::SOURCE_DEBUG_EXTENSION;
        match self.system_element(class_def, Target::Class, descriptor, "value")? {
            None => Ok(None),
            Some(EncodedValue::String(string)) => Ok(Some(self.dex().string(string)?.into_owned())),
            Some(other) => {
                unexpected(descriptor, "value", &other);
                Ok(None)
            }
        }
    }

    /// Names and flags of a method's parameters (from javac's `-parameters`)
    ///
    /// The two arrays must have the same length; otherwise the metadata is ignored.
    pub fn method_parameters(
        &self,
        class_def: &ClassDef,
        method: MethodIndex,
    ) -> Result<Option<MethodParameters>, FormatError> {
        let descriptor = well_known::METHOD_PARAMETERS;
        let target = Target::Method(method);
        let names = self.system_element(class_def, target, descriptor, "names")?;
        let flags = self.system_element(class_def, target, descriptor, "accessFlags")?;
        let (names, flags) = match (names, flags) {
            (Some(EncodedValue::Array(names)), Some(EncodedValue::Array(flags))) => (names, flags),
            (None, None) => return Ok(None),
            _ => {
                log::debug!("Ignoring {} without name and flag arrays", descriptor);
                return Ok(None);
            }
        };
        if names.len() != flags.len() {
            log::debug!(
                "Ignoring {} with {} names but {} flags",
                descriptor,
                names.len(),
                flags.len()
            );
            return Ok(None);
        }

        let mut parameters = MethodParameters {
            names: Vec::with_capacity(names.len()),
            access_flags: Vec::with_capacity(flags.len()),
        };
        for name in &names {
            match name? {
                EncodedValue::Null => parameters.names.push(None),
                EncodedValue::String(string) => parameters
                    .names
                    .push(Some(self.dex().string(string)?.into_owned())),
                other => {
                    unexpected(descriptor, "names", &other);
                    return Ok(None);
                }
            }
        }
        for flag in &flags {
            match flag? {
                EncodedValue::Int(flag) => parameters.access_flags.push(flag as u32),
                other => {
                    unexpected(descriptor, "accessFlags", &other);
                    return Ok(None);
                }
            }
        }
        Ok(Some(parameters))
    }

    /// One element of a record class's `Record` annotation (eg. `componentNames`)
    pub fn record_element<R: TypeResolver>(
        &self,
        class_def: &ClassDef,
        element_name: &str,
        resolution: &Resolution<R>,
    ) -> Result<Option<Value<R::Class>>, Error> {
        let descriptor = well_known::RECORD;
        match self.system_element(class_def, Target::Class, descriptor, element_name)? {
            None => Ok(None),
            Some(value) => self
                .materialize_value(&value, Visibility::System, resolution)
                .map(Some),
        }
    }
}
