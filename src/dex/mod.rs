//! Read-only access to the tables of a DEX file
//!
//! Everything here borrows the underlying bytes: the `DexFile` itself, the encoded values, and
//! the code items all point back into the original slice, so nothing gets copied unless it
//! needs to be converted (eg. a modified UTF-8 string that isn't valid UTF-8).
//!
//! [0]: https://source.android.com/docs/core/runtime/dex-format

mod access_flags;
mod binary_format;
mod class_data;
pub mod code;
mod descriptors;
mod encoded_value;
mod errors;
pub mod mutf8;

pub use access_flags::*;
pub use binary_format::*;
pub use class_data::*;
pub use descriptors::*;
pub use encoded_value::*;
pub use errors::*;

use std::borrow::Cow;
use std::cmp::Ordering;

/// Marker for "no index" in 32-bit index fields
pub const NO_INDEX: u32 = 0xffff_ffff;

const HEADER_SIZE: usize = 0x70;

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        pub struct $name(pub u32);
    };
}

index_type!(
    /// Index into `string_ids`
    StringIndex
);
index_type!(
    /// Index into `type_ids`
    TypeIndex
);
index_type!(
    /// Index into `proto_ids`
    ProtoIndex
);
index_type!(
    /// Index into `field_ids`
    FieldIndex
);
index_type!(
    /// Index into `method_ids`
    MethodIndex
);
index_type!(
    /// Index into `class_defs`
    ClassDefIndex
);

/// Location of one of the fixed-size id tables
#[derive(Copy, Clone, Debug, Default)]
pub struct Table {
    pub size: u32,
    pub offset: u32,
}

impl Table {
    fn read(reader: &mut ByteReader) -> Result<Table, FormatError> {
        let size = reader.u32()?;
        let offset = reader.u32()?;
        Ok(Table { size, offset })
    }
}

#[derive(Clone, Debug)]
pub struct Header {
    /// Three ASCII digits (eg. `035`)
    pub version: [u8; 3],
    pub file_size: u32,
    pub string_ids: Table,
    pub type_ids: Table,
    pub proto_ids: Table,
    pub field_ids: Table,
    pub method_ids: Table,
    pub class_defs: Table,
    pub data: Table,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldId {
    pub class: TypeIndex,
    pub field_type: TypeIndex,
    pub name: StringIndex,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MethodId {
    pub class: TypeIndex,
    pub proto: ProtoIndex,
    pub name: StringIndex,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProtoId {
    pub shorty: StringIndex,
    pub return_type: TypeIndex,
    pub parameters_off: u32,
}

/// Entry in `class_defs`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClassDef {
    /// Position of this entry in `class_defs`
    pub index: ClassDefIndex,
    pub class: TypeIndex,
    pub access_flags: ClassAccessFlags,
    pub superclass: Option<TypeIndex>,
    pub interfaces_off: u32,
    pub source_file: Option<StringIndex>,
    /// Offset of the `annotations_directory_item` (0 if the class has no annotations)
    pub annotations_off: u32,
    pub class_data_off: u32,
    pub static_values_off: u32,
}

/// A parsed DEX file header, along with the bytes it describes
#[derive(Clone, Debug)]
pub struct DexFile<'a> {
    data: &'a [u8],
    header: Header,
}

impl<'a> DexFile<'a> {
    /// Check the magic and read the header
    ///
    /// This does not verify checksums or the overall structure of the file. Every later access
    /// is bounds checked instead.
    pub fn parse(data: &'a [u8]) -> Result<DexFile<'a>, FormatError> {
        let mut reader = ByteReader::new(data, 0);
        let magic = reader.bytes(8)?;
        let version = [magic[4], magic[5], magic[6]];
        if &magic[0..4] != b"dex\n" || !version.iter().all(u8::is_ascii_digit) || magic[7] != 0 {
            let mut bad = [0u8; 8];
            bad.copy_from_slice(magic);
            return Err(FormatError::BadMagic(bad));
        }

        reader.skip(4 + 20)?; // checksum, signature
        let file_size = reader.u32()?;
        let _header_size = reader.u32()?;
        let _endian_tag = reader.u32()?;
        let _link = Table::read(&mut reader)?;
        let _map_off = reader.u32()?;
        let string_ids = Table::read(&mut reader)?;
        let type_ids = Table::read(&mut reader)?;
        let proto_ids = Table::read(&mut reader)?;
        let field_ids = Table::read(&mut reader)?;
        let method_ids = Table::read(&mut reader)?;
        let class_defs = Table::read(&mut reader)?;
        let data_table = Table::read(&mut reader)?;
        debug_assert_eq!(reader.position(), HEADER_SIZE);

        let header = Header {
            version,
            file_size,
            string_ids,
            type_ids,
            proto_ids,
            field_ids,
            method_ids,
            class_defs,
            data: data_table,
        };

        // Check up front that the id tables are in bounds
        for (table, entry_size) in [
            (&header.string_ids, 4),
            (&header.type_ids, 4),
            (&header.proto_ids, 12),
            (&header.field_ids, 8),
            (&header.method_ids, 8),
            (&header.class_defs, 32),
        ] {
            ByteReader::new(data, table.offset as usize).skip(table.size as usize * entry_size)?;
        }

        log::trace!(
            "Parsed DEX header: version {}, {} strings, {} types, {} classes",
            String::from_utf8_lossy(&version),
            header.string_ids.size,
            header.type_ids.size,
            header.class_defs.size
        );

        Ok(DexFile { data, header })
    }

    /// All of the bytes in the file
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Offset of the `index`-th entry in a table
    fn entry(
        &self,
        table: &Table,
        name: &'static str,
        index: u32,
        entry_size: usize,
    ) -> Result<usize, FormatError> {
        if index >= table.size {
            Err(FormatError::IndexOutOfRange {
                table: name,
                index,
                size: table.size,
            })
        } else {
            Ok(table.offset as usize + index as usize * entry_size)
        }
    }

    pub fn string_count(&self) -> u32 {
        self.header.string_ids.size
    }

    /// Raw modified UTF-8 bytes of a string (without the NUL terminator)
    pub fn string_data(&self, index: StringIndex) -> Result<&'a [u8], FormatError> {
        let entry = self.entry(&self.header.string_ids, "string_ids", index.0, 4)?;
        let mut reader = ByteReader::new(self.data, u32_at(self.data, entry)? as usize);
        let _utf16_size = reader.uleb128()?;
        let start = reader.position();
        let length = self.data[start..]
            .iter()
            .position(|b| *b == 0)
            .ok_or(FormatError::UnexpectedEof {
                offset: start,
                needed: self.data.len() - start + 1,
            })?;
        Ok(&self.data[start..start + length])
    }

    /// Decoded string (borrowed unless it needed converting from modified UTF-8)
    pub fn string(&self, index: StringIndex) -> Result<Cow<'a, str>, FormatError> {
        let bytes = self.string_data(index)?;
        mutf8::decode(bytes).ok_or_else(|| FormatError::InvalidString {
            offset: bytes.as_ptr() as usize - self.data.as_ptr() as usize,
        })
    }

    /// Look up the index of a string (the string table is sorted, so this is a binary search)
    pub fn find_string(&self, string: &str) -> Result<Option<StringIndex>, FormatError> {
        let mut low = 0;
        let mut high = self.header.string_ids.size;
        while low < high {
            let mid = low + (high - low) / 2;
            match mutf8::compare_str(self.string_data(StringIndex(mid))?, string) {
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid,
                Ordering::Equal => return Ok(Some(StringIndex(mid))),
            }
        }
        Ok(None)
    }

    pub fn type_count(&self) -> u32 {
        self.header.type_ids.size
    }

    /// String index of a type's descriptor
    pub fn type_descriptor_index(&self, index: TypeIndex) -> Result<StringIndex, FormatError> {
        let entry = self.entry(&self.header.type_ids, "type_ids", index.0, 4)?;
        Ok(StringIndex(u32_at(self.data, entry)?))
    }

    /// Raw descriptor bytes of a type (eg. `Ljava/lang/Object;`)
    pub fn type_descriptor_data(&self, index: TypeIndex) -> Result<&'a [u8], FormatError> {
        self.string_data(self.type_descriptor_index(index)?)
    }

    pub fn type_descriptor(&self, index: TypeIndex) -> Result<Cow<'a, str>, FormatError> {
        self.string(self.type_descriptor_index(index)?)
    }

    /// Look up the index of a type by its descriptor
    ///
    /// Type ids are sorted by string index, so this is two binary searches.
    pub fn find_type(&self, descriptor: &str) -> Result<Option<TypeIndex>, FormatError> {
        let string_index = match self.find_string(descriptor)? {
            None => return Ok(None),
            Some(idx) => idx,
        };
        let mut low = 0;
        let mut high = self.header.type_ids.size;
        while low < high {
            let mid = low + (high - low) / 2;
            match self.type_descriptor_index(TypeIndex(mid))?.cmp(&string_index) {
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid,
                Ordering::Equal => return Ok(Some(TypeIndex(mid))),
            }
        }
        Ok(None)
    }

    pub fn field_id(&self, index: FieldIndex) -> Result<FieldId, FormatError> {
        let entry = self.entry(&self.header.field_ids, "field_ids", index.0, 8)?;
        let mut reader = ByteReader::new(self.data, entry);
        Ok(FieldId {
            class: TypeIndex(reader.u16()? as u32),
            field_type: TypeIndex(reader.u16()? as u32),
            name: StringIndex(reader.u32()?),
        })
    }

    pub fn method_id(&self, index: MethodIndex) -> Result<MethodId, FormatError> {
        let entry = self.entry(&self.header.method_ids, "method_ids", index.0, 8)?;
        let mut reader = ByteReader::new(self.data, entry);
        Ok(MethodId {
            class: TypeIndex(reader.u16()? as u32),
            proto: ProtoIndex(reader.u16()? as u32),
            name: StringIndex(reader.u32()?),
        })
    }

    pub fn proto_id(&self, index: ProtoIndex) -> Result<ProtoId, FormatError> {
        let entry = self.entry(&self.header.proto_ids, "proto_ids", index.0, 12)?;
        let mut reader = ByteReader::new(self.data, entry);
        Ok(ProtoId {
            shorty: StringIndex(reader.u32()?),
            return_type: TypeIndex(reader.u32()?),
            parameters_off: reader.u32()?,
        })
    }

    /// Parameter types of a prototype, in declaration order
    pub fn proto_parameters(&self, proto: &ProtoId) -> Result<Vec<TypeIndex>, FormatError> {
        if proto.parameters_off == 0 {
            return Ok(vec![]);
        }
        let mut reader = ByteReader::new(self.data, proto.parameters_off as usize);
        let size = reader.u32()?;
        (0..size)
            .map(|_| reader.u16().map(|idx| TypeIndex(idx as u32)))
            .collect()
    }

    /// Parsed descriptor of a method prototype
    pub fn proto_descriptor(&self, index: ProtoIndex) -> Result<MethodDescriptor, FormatError> {
        let proto = self.proto_id(index)?;
        let mut parameters = vec![];
        for parameter in self.proto_parameters(&proto)? {
            parameters.push(FieldType::parse(&self.type_descriptor(parameter)?)?);
        }
        let return_type = match self.type_descriptor(proto.return_type)?.as_ref() {
            "V" => None,
            other => Some(FieldType::parse(other)?),
        };
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }

    pub fn class_def_count(&self) -> u32 {
        self.header.class_defs.size
    }

    pub fn class_def(&self, index: ClassDefIndex) -> Result<ClassDef, FormatError> {
        let entry = self.entry(&self.header.class_defs, "class_defs", index.0, 32)?;
        let mut reader = ByteReader::new(self.data, entry);
        let class = TypeIndex(reader.u32()?);
        let access_flags = ClassAccessFlags::from_bits_truncate(reader.u32()?);
        let superclass = Some(reader.u32()?)
            .filter(|idx| *idx != NO_INDEX)
            .map(TypeIndex);
        let interfaces_off = reader.u32()?;
        let source_file = Some(reader.u32()?)
            .filter(|idx| *idx != NO_INDEX)
            .map(StringIndex);
        Ok(ClassDef {
            index,
            class,
            access_flags,
            superclass,
            interfaces_off,
            source_file,
            annotations_off: reader.u32()?,
            class_data_off: reader.u32()?,
            static_values_off: reader.u32()?,
        })
    }

    /// Iterate through all class definitions, in file order
    pub fn class_defs(&self) -> impl Iterator<Item = Result<ClassDef, FormatError>> + '_ {
        (0..self.class_def_count()).map(move |idx| self.class_def(ClassDefIndex(idx)))
    }

    /// Find the class definition for a type (if the type is defined in this file)
    ///
    /// This is a linear scan: the class definitions are ordered so that superclasses come before
    /// subclasses, not by type.
    pub fn find_class_def(&self, class: TypeIndex) -> Result<Option<ClassDef>, FormatError> {
        for class_def in self.class_defs() {
            let class_def = class_def?;
            if class_def.class == class {
                return Ok(Some(class_def));
            }
        }
        Ok(None)
    }

    /// Find the class definition for a class by descriptor (eg. `Lfoo/Bar;`)
    pub fn find_class_def_by_descriptor(
        &self,
        descriptor: &str,
    ) -> Result<Option<ClassDef>, FormatError> {
        match self.find_type(descriptor)? {
            None => Ok(None),
            Some(class) => self.find_class_def(class),
        }
    }

    /// Initial values of the static fields of a class
    ///
    /// Values are in the same order as the static fields in the class data. Trailing fields
    /// whose value is the default (`0`/`null`) may be omitted.
    pub fn static_values(&self, class_def: &ClassDef) -> Result<Option<EncodedArray<'a>>, FormatError> {
        if class_def.static_values_off == 0 {
            return Ok(None);
        }
        decode_array_item(self.data, class_def.static_values_off as usize).map(Some)
    }

    /// Render `Lfoo/Bar;.name:(I)V` style description of a method (for diagnostics)
    pub fn pretty_method(&self, index: MethodIndex) -> Result<String, FormatError> {
        let method_id = self.method_id(index)?;
        Ok(format!(
            "{}.{}:{}",
            self.type_descriptor(method_id.class)?,
            self.string(method_id.name)?,
            self.proto_descriptor(method_id.proto)?.render()
        ))
    }

    /// Render `Lfoo/Bar;.name:I` style description of a field (for diagnostics)
    pub fn pretty_field(&self, index: FieldIndex) -> Result<String, FormatError> {
        let field_id = self.field_id(index)?;
        Ok(format!(
            "{}.{}:{}",
            self.type_descriptor(field_id.class)?,
            self.string(field_id.name)?,
            self.type_descriptor(field_id.field_type)?
        ))
    }
}
