use super::{
    ByteReader, ClassDef, DexFile, FieldAccessFlags, FieldIndex, FormatError, MethodAccessFlags,
    MethodIndex,
};

/// Field declared in a `class_data_item`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EncodedField {
    pub field_index: FieldIndex,
    pub access_flags: FieldAccessFlags,
}

/// Method declared in a `class_data_item`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EncodedMethod {
    pub method_index: MethodIndex,
    pub access_flags: MethodAccessFlags,
    /// Offset of the `code_item` (0 for abstract and native methods)
    pub code_off: u32,
}

/// Members declared by a class
///
/// In the file, member indices are delta-encoded within each of the four lists. Here they are
/// absolute.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassData {
    pub static_fields: Vec<EncodedField>,
    pub instance_fields: Vec<EncodedField>,
    pub direct_methods: Vec<EncodedMethod>,
    pub virtual_methods: Vec<EncodedMethod>,
}

impl ClassData {
    pub fn fields(&self) -> impl Iterator<Item = &EncodedField> {
        self.static_fields.iter().chain(self.instance_fields.iter())
    }

    pub fn methods(&self) -> impl Iterator<Item = &EncodedMethod> {
        self.direct_methods.iter().chain(self.virtual_methods.iter())
    }

    pub fn find_method(&self, method_index: MethodIndex) -> Option<&EncodedMethod> {
        self.methods().find(|method| method.method_index == method_index)
    }

    pub fn find_field(&self, field_index: FieldIndex) -> Option<&EncodedField> {
        self.fields().find(|field| field.field_index == field_index)
    }
}

fn read_fields(reader: &mut ByteReader, count: u32) -> Result<Vec<EncodedField>, FormatError> {
    let mut fields = Vec::with_capacity(count.min(1024) as usize);
    let mut field_index: u32 = 0;
    for _ in 0..count {
        field_index = field_index.wrapping_add(reader.uleb128()?);
        fields.push(EncodedField {
            field_index: FieldIndex(field_index),
            access_flags: FieldAccessFlags::from_bits_truncate(reader.uleb128()?),
        });
    }
    Ok(fields)
}

fn read_methods(reader: &mut ByteReader, count: u32) -> Result<Vec<EncodedMethod>, FormatError> {
    let mut methods = Vec::with_capacity(count.min(1024) as usize);
    let mut method_index: u32 = 0;
    for _ in 0..count {
        method_index = method_index.wrapping_add(reader.uleb128()?);
        methods.push(EncodedMethod {
            method_index: MethodIndex(method_index),
            access_flags: MethodAccessFlags::from_bits_truncate(reader.uleb128()?),
            code_off: reader.uleb128()?,
        });
    }
    Ok(methods)
}

impl<'a> DexFile<'a> {
    /// Members declared by a class (`None` for marker interfaces and the like)
    pub fn class_data(&self, class_def: &ClassDef) -> Result<Option<ClassData>, FormatError> {
        if class_def.class_data_off == 0 {
            return Ok(None);
        }
        let mut reader = ByteReader::new(self.data(), class_def.class_data_off as usize);
        let static_fields_size = reader.uleb128()?;
        let instance_fields_size = reader.uleb128()?;
        let direct_methods_size = reader.uleb128()?;
        let virtual_methods_size = reader.uleb128()?;
        Ok(Some(ClassData {
            static_fields: read_fields(&mut reader, static_fields_size)?,
            instance_fields: read_fields(&mut reader, instance_fields_size)?,
            direct_methods: read_methods(&mut reader, direct_methods_size)?,
            virtual_methods: read_methods(&mut reader, virtual_methods_size)?,
        }))
    }
}
