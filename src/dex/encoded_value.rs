//! Decoder for `encoded_value`, the tagged variable-width format used for annotation elements
//! and static field initializers
//!
//! Every value starts with a tag byte: the low five bits are the `ValueType` and the high three
//! bits are a type-specific argument (for scalars, one less than the number of payload bytes).
//! Arrays and annotations are length-prefixed with unsigned LEB128 and contain further values.
//!
//! Decoding never resolves anything: string, type, field, and method references stay as raw
//! indices. Arrays and annotations are decoded into views that point back into the data, so
//! decoding a value never allocates. It does, however, walk over the entire value once, so that
//! malformed nested data is reported as soon as the outer value is decoded.

use super::{
    ByteReader, FieldIndex, FormatError, MethodIndex, ProtoIndex, StringIndex, TypeIndex,
};

/// Maximum nesting depth of arrays and annotations
///
/// The format itself has no limit, but the data could come from anywhere.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Type of an encoded value (low five bits of the tag byte)
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum ValueType {
    Byte = 0x00,
    Short = 0x02,
    Char = 0x03,
    Int = 0x04,
    Long = 0x06,
    Float = 0x10,
    Double = 0x11,
    MethodType = 0x15,
    MethodHandle = 0x16,
    String = 0x17,
    Type = 0x18,
    Field = 0x19,
    Method = 0x1a,
    Enum = 0x1b,
    Array = 0x1c,
    Annotation = 0x1d,
    Null = 0x1e,
    Boolean = 0x1f,
}

impl ValueType {
    /// Extract the value type from a full tag byte
    pub fn from_tag(tag: u8) -> Option<ValueType> {
        use ValueType::*;
        Some(match tag & 0x1f {
            0x00 => Byte,
            0x02 => Short,
            0x03 => Char,
            0x04 => Int,
            0x06 => Long,
            0x10 => Float,
            0x11 => Double,
            0x15 => MethodType,
            0x16 => MethodHandle,
            0x17 => String,
            0x18 => Type,
            0x19 => Field,
            0x1a => Method,
            0x1b => Enum,
            0x1c => Array,
            0x1d => Annotation,
            0x1e => Null,
            0x1f => Boolean,
            _ => return None,
        })
    }

    /// Largest allowed `arg + 1`
    ///
    /// For types without payload bytes, this bounds the argument itself: booleans store their
    /// value there and everything else requires it to be zero.
    const fn max_size(self) -> usize {
        use ValueType::*;
        match self {
            Byte | Array | Annotation | Null => 1,
            Short | Char | Boolean => 2,
            Int | Float | MethodType | MethodHandle | String | Type | Field | Method | Enum => 4,
            Long | Double => 8,
        }
    }
}

/// One decoded value
///
/// Scalars are fully decoded; references are raw indices; arrays and annotations are lazy views.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum EncodedValue<'a> {
    /// Signed like Java's `byte`: the payload byte `0xff` is `-1`, not 255
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    MethodType(ProtoIndex),
    MethodHandle(u32),
    String(StringIndex),
    Type(TypeIndex),
    Field(FieldIndex),
    Method(MethodIndex),
    Enum(FieldIndex),
    Array(EncodedArray<'a>),
    Annotation(EncodedAnnotation<'a>),
    Null,
    Boolean(bool),
}

impl<'a> EncodedValue<'a> {
    pub fn value_type(&self) -> ValueType {
        match self {
            EncodedValue::Byte(_) => ValueType::Byte,
            EncodedValue::Short(_) => ValueType::Short,
            EncodedValue::Char(_) => ValueType::Char,
            EncodedValue::Int(_) => ValueType::Int,
            EncodedValue::Long(_) => ValueType::Long,
            EncodedValue::Float(_) => ValueType::Float,
            EncodedValue::Double(_) => ValueType::Double,
            EncodedValue::MethodType(_) => ValueType::MethodType,
            EncodedValue::MethodHandle(_) => ValueType::MethodHandle,
            EncodedValue::String(_) => ValueType::String,
            EncodedValue::Type(_) => ValueType::Type,
            EncodedValue::Field(_) => ValueType::Field,
            EncodedValue::Method(_) => ValueType::Method,
            EncodedValue::Enum(_) => ValueType::Enum,
            EncodedValue::Array(_) => ValueType::Array,
            EncodedValue::Annotation(_) => ValueType::Annotation,
            EncodedValue::Null => ValueType::Null,
            EncodedValue::Boolean(_) => ValueType::Boolean,
        }
    }
}

/// Decode one value starting at `position`, returning it and the position just past it
pub fn decode_one(
    data: &[u8],
    position: usize,
) -> Result<(EncodedValue<'_>, usize), FormatError> {
    let mut reader = ByteReader::new(data, position);
    let value = read_value(&mut reader, 0)?;
    Ok((value, reader.position()))
}

/// Decode an `encoded_annotation` (no leading tag byte) starting at `position`
pub fn decode_annotation(
    data: &[u8],
    position: usize,
) -> Result<(EncodedAnnotation<'_>, usize), FormatError> {
    let mut reader = ByteReader::new(data, position);
    let annotation = read_annotation(&mut reader, 1)?;
    Ok((annotation, reader.position()))
}

/// Decode an `encoded_array_item` (no leading tag byte) at `position`
pub fn decode_array_item(data: &[u8], position: usize) -> Result<EncodedArray<'_>, FormatError> {
    read_array(&mut ByteReader::new(data, position), 1)
}

fn read_value<'a>(
    reader: &mut ByteReader<'a>,
    depth: usize,
) -> Result<EncodedValue<'a>, FormatError> {
    let offset = reader.position();
    let tag = reader.u8()?;
    let value_type = ValueType::from_tag(tag).ok_or(FormatError::InvalidValueType { tag, offset })?;
    let arg = (tag >> 5) as usize;
    let size = arg + 1;
    if size > value_type.max_size() {
        return Err(FormatError::InvalidValueSize {
            value_type,
            size,
            offset,
        });
    }

    let value = match value_type {
        ValueType::Byte => EncodedValue::Byte(read_signed(reader, size)? as i8),
        ValueType::Short => EncodedValue::Short(read_signed(reader, size)? as i16),
        ValueType::Char => EncodedValue::Char(reader.uint_n(size)? as u16),
        ValueType::Int => EncodedValue::Int(read_signed(reader, size)? as i32),
        ValueType::Long => EncodedValue::Long(read_signed(reader, size)?),
        ValueType::Float => {
            let bits = reader.uint_n(size)? << ((4 - size) * 8);
            EncodedValue::Float(f32::from_bits(bits as u32))
        }
        ValueType::Double => {
            let bits = reader.uint_n(size)? << ((8 - size) * 8);
            EncodedValue::Double(f64::from_bits(bits))
        }
        ValueType::MethodType => EncodedValue::MethodType(ProtoIndex(read_index(reader, size)?)),
        ValueType::MethodHandle => EncodedValue::MethodHandle(read_index(reader, size)?),
        ValueType::String => EncodedValue::String(StringIndex(read_index(reader, size)?)),
        ValueType::Type => EncodedValue::Type(TypeIndex(read_index(reader, size)?)),
        ValueType::Field => EncodedValue::Field(FieldIndex(read_index(reader, size)?)),
        ValueType::Method => EncodedValue::Method(MethodIndex(read_index(reader, size)?)),
        ValueType::Enum => EncodedValue::Enum(FieldIndex(read_index(reader, size)?)),
        ValueType::Array => EncodedValue::Array(read_array(reader, depth + 1)?),
        ValueType::Annotation => EncodedValue::Annotation(read_annotation(reader, depth + 1)?),
        ValueType::Null => EncodedValue::Null,
        ValueType::Boolean => EncodedValue::Boolean(arg == 1),
    };
    Ok(value)
}

/// Little-endian, sign-extended from `size` bytes
fn read_signed(reader: &mut ByteReader, size: usize) -> Result<i64, FormatError> {
    let shift = 64 - 8 * size as u32;
    Ok(((reader.uint_n(size)? << shift) as i64) >> shift)
}

/// Little-endian, zero-extended from `size` bytes
fn read_index(reader: &mut ByteReader, size: usize) -> Result<u32, FormatError> {
    Ok(reader.uint_n(size)? as u32)
}

fn check_depth(reader: &ByteReader, depth: usize) -> Result<(), FormatError> {
    if depth > MAX_NESTING_DEPTH {
        Err(FormatError::NestingTooDeep(reader.position()))
    } else {
        Ok(())
    }
}

fn read_array<'a>(reader: &mut ByteReader<'a>, depth: usize) -> Result<EncodedArray<'a>, FormatError> {
    check_depth(reader, depth)?;
    let len = reader.uleb128()?;
    let offset = reader.position();
    for _ in 0..len {
        read_value(reader, depth)?;
    }
    Ok(EncodedArray {
        data: reader.data(),
        offset,
        len,
        depth,
    })
}

fn read_annotation<'a>(
    reader: &mut ByteReader<'a>,
    depth: usize,
) -> Result<EncodedAnnotation<'a>, FormatError> {
    check_depth(reader, depth)?;
    let start = reader.position();
    let type_index = TypeIndex(reader.uleb128()?);
    let len = reader.uleb128()?;
    let offset = reader.position();
    let mut previous: Option<u32> = None;
    for _ in 0..len {
        let name = reader.uleb128()?;
        if previous.map_or(false, |prev| prev >= name) {
            return Err(FormatError::UnsortedElements { offset: start });
        }
        previous = Some(name);
        read_value(reader, depth)?;
    }
    Ok(EncodedAnnotation {
        type_index,
        data: reader.data(),
        offset,
        len,
        depth,
    })
}

/// View of an `encoded_array`
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct EncodedArray<'a> {
    data: &'a [u8],
    /// Position of the first element
    offset: usize,
    len: u32,
    depth: usize,
}

impl<'a> EncodedArray<'a> {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// How many arrays/annotations enclose this one (top-level values are at depth 1)
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn iter(&self) -> EncodedArrayIter<'a> {
        EncodedArrayIter {
            reader: ByteReader::new(self.data, self.offset),
            remaining: self.len,
            depth: self.depth,
        }
    }
}

impl<'a> IntoIterator for &EncodedArray<'a> {
    type Item = Result<EncodedValue<'a>, FormatError>;
    type IntoIter = EncodedArrayIter<'a>;

    fn into_iter(self) -> EncodedArrayIter<'a> {
        self.iter()
    }
}

pub struct EncodedArrayIter<'a> {
    reader: ByteReader<'a>,
    remaining: u32,
    depth: usize,
}

impl<'a> Iterator for EncodedArrayIter<'a> {
    type Item = Result<EncodedValue<'a>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let value = read_value(&mut self.reader, self.depth);
        if value.is_err() {
            self.remaining = 0;
        }
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

/// View of an `encoded_annotation`: a type and elements sorted by name
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct EncodedAnnotation<'a> {
    pub type_index: TypeIndex,
    data: &'a [u8],
    /// Position of the first element
    offset: usize,
    len: u32,
    depth: usize,
}

/// Name-value pair in an annotation
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct AnnotationElement<'a> {
    pub name: StringIndex,
    pub value: EncodedValue<'a>,
}

impl<'a> EncodedAnnotation<'a> {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Elements, in increasing order of name index
    pub fn elements(&self) -> AnnotationElements<'a> {
        AnnotationElements {
            reader: ByteReader::new(self.data, self.offset),
            remaining: self.len,
            depth: self.depth,
        }
    }

    /// Look up the value of the element with the given name
    ///
    /// Elements are variable-width, so this first collects the position of each element then
    /// binary searches those by name.
    pub fn element_value(&self, name: StringIndex) -> Result<Option<EncodedValue<'a>>, FormatError> {
        let mut reader = ByteReader::new(self.data, self.offset);
        let mut positions: Vec<(StringIndex, usize)> = Vec::with_capacity(self.len());
        for _ in 0..self.len {
            let element_name = StringIndex(reader.uleb128()?);
            positions.push((element_name, reader.position()));
            read_value(&mut reader, self.depth)?;
        }

        match positions.binary_search_by_key(&name, |(element_name, _)| *element_name) {
            Err(_) => Ok(None),
            Ok(found) => {
                let mut reader = ByteReader::new(self.data, positions[found].1);
                read_value(&mut reader, self.depth).map(Some)
            }
        }
    }
}

pub struct AnnotationElements<'a> {
    reader: ByteReader<'a>,
    remaining: u32,
    depth: usize,
}

impl<'a> Iterator for AnnotationElements<'a> {
    type Item = Result<AnnotationElement<'a>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let element = self.reader.uleb128().and_then(|name| {
            let value = read_value(&mut self.reader, self.depth)?;
            Ok(AnnotationElement {
                name: StringIndex(name),
                value,
            })
        });
        if element.is_err() {
            self.remaining = 0;
        }
        Some(element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}
