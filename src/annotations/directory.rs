use super::{AnnotationSet, AnnotationSetRefList};
use crate::dex::{u32_at, ByteReader, ClassDef, DexFile, FieldIndex, FormatError, MethodIndex};
use std::cmp::Ordering;

const HEADER_SIZE: usize = 16;
const ENTRY_SIZE: usize = 8;

/// Header of an `annotations_directory_item`
///
/// This is plain data (offsets and counts), so it can be cached independently of the bytes.
/// Lookups take the file bytes again and binary search the member tables in place: those tables
/// are sorted by member index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AnnotationDirectory {
    /// Offset of the directory itself
    pub offset: u32,

    /// Offset of the class annotation set (0 if the class itself has no annotations)
    pub class_annotations_off: u32,

    pub fields_size: u32,
    pub methods_size: u32,
    pub parameters_size: u32,
}

impl AnnotationDirectory {
    /// Read the directory header and check that the member tables are in bounds
    pub fn parse(data: &[u8], offset: u32) -> Result<AnnotationDirectory, FormatError> {
        let mut reader = ByteReader::new(data, offset as usize);
        let class_annotations_off = reader.u32()?;
        let fields_size = reader.u32()?;
        let methods_size = reader.u32()?;
        let parameters_size = reader.u32()?;
        let entries = fields_size as usize + methods_size as usize + parameters_size as usize;
        reader.skip(entries * ENTRY_SIZE)?;

        log::trace!(
            "Annotation directory at {:#x}: {} fields, {} methods, {} parameter lists",
            offset,
            fields_size,
            methods_size,
            parameters_size
        );
        Ok(AnnotationDirectory {
            offset,
            class_annotations_off,
            fields_size,
            methods_size,
            parameters_size,
        })
    }

    /// Directory of a class (`None` if the class has no annotations at all)
    pub fn build(
        dex: &DexFile,
        class_def: &ClassDef,
    ) -> Result<Option<AnnotationDirectory>, FormatError> {
        match class_def.annotations_off {
            0 => Ok(None),
            offset => AnnotationDirectory::parse(dex.data(), offset).map(Some),
        }
    }

    fn fields_start(&self) -> usize {
        self.offset as usize + HEADER_SIZE
    }

    fn methods_start(&self) -> usize {
        self.fields_start() + self.fields_size as usize * ENTRY_SIZE
    }

    fn parameters_start(&self) -> usize {
        self.methods_start() + self.methods_size as usize * ENTRY_SIZE
    }

    pub fn class_annotations<'a>(
        &self,
        data: &'a [u8],
    ) -> Result<Option<AnnotationSet<'a>>, FormatError> {
        match self.class_annotations_off {
            0 => Ok(None),
            offset => AnnotationSet::parse(data, offset).map(Some),
        }
    }

    pub fn annotations_for_field<'a>(
        &self,
        data: &'a [u8],
        field: FieldIndex,
    ) -> Result<Option<AnnotationSet<'a>>, FormatError> {
        match search(data, self.fields_start(), self.fields_size, field.0)? {
            None => Ok(None),
            Some(offset) => AnnotationSet::parse(data, offset).map(Some),
        }
    }

    pub fn annotations_for_method<'a>(
        &self,
        data: &'a [u8],
        method: MethodIndex,
    ) -> Result<Option<AnnotationSet<'a>>, FormatError> {
        match search(data, self.methods_start(), self.methods_size, method.0)? {
            None => Ok(None),
            Some(offset) => AnnotationSet::parse(data, offset).map(Some),
        }
    }

    pub fn annotations_for_parameters<'a>(
        &self,
        data: &'a [u8],
        method: MethodIndex,
    ) -> Result<Option<AnnotationSetRefList<'a>>, FormatError> {
        match search(data, self.parameters_start(), self.parameters_size, method.0)? {
            None => Ok(None),
            Some(offset) => AnnotationSetRefList::parse(data, offset).map(Some),
        }
    }

    /// Annotated fields with the offsets of their annotation sets, in index order
    pub fn field_entries<'a>(
        &self,
        data: &'a [u8],
    ) -> impl Iterator<Item = Result<(FieldIndex, u32), FormatError>> + 'a {
        entries(data, self.fields_start(), self.fields_size)
            .map(|entry| entry.map(|(idx, offset)| (FieldIndex(idx), offset)))
    }

    /// Annotated methods with the offsets of their annotation sets, in index order
    pub fn method_entries<'a>(
        &self,
        data: &'a [u8],
    ) -> impl Iterator<Item = Result<(MethodIndex, u32), FormatError>> + 'a {
        entries(data, self.methods_start(), self.methods_size)
            .map(|entry| entry.map(|(idx, offset)| (MethodIndex(idx), offset)))
    }

    /// Methods with annotated parameters with the offsets of their set ref lists, in index order
    pub fn parameter_entries<'a>(
        &self,
        data: &'a [u8],
    ) -> impl Iterator<Item = Result<(MethodIndex, u32), FormatError>> + 'a {
        entries(data, self.parameters_start(), self.parameters_size)
            .map(|entry| entry.map(|(idx, offset)| (MethodIndex(idx), offset)))
    }
}

fn entry(data: &[u8], start: usize, index: u32) -> Result<(u32, u32), FormatError> {
    let position = start + index as usize * ENTRY_SIZE;
    Ok((u32_at(data, position)?, u32_at(data, position + 4)?))
}

fn entries(
    data: &[u8],
    start: usize,
    count: u32,
) -> impl Iterator<Item = Result<(u32, u32), FormatError>> + '_ {
    (0..count).map(move |index| entry(data, start, index))
}

/// Binary search a table of `(member index, offset)` entries sorted by member index
fn search(data: &[u8], start: usize, count: u32, target: u32) -> Result<Option<u32>, FormatError> {
    let mut low = 0;
    let mut high = count;
    while low < high {
        let mid = low + (high - low) / 2;
        let (member, offset) = entry(data, start, mid)?;
        match member.cmp(&target) {
            Ordering::Less => low = mid + 1,
            Ordering::Greater => high = mid,
            Ordering::Equal => return Ok(Some(offset)),
        }
    }
    Ok(None)
}
