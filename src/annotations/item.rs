use super::Visibility;
use crate::dex::{
    decode_annotation, u32_at, ByteReader, EncodedAnnotation, EncodedValue, FormatError,
    StringIndex, TypeIndex,
};

/// View of an `annotation_set_item`: offsets of annotation items, in declaration order
///
/// Nothing about the items themselves is decoded until asked for.
#[derive(Copy, Clone, Debug)]
pub struct AnnotationSet<'a> {
    data: &'a [u8],
    /// Position of the first item offset
    entries: usize,
    len: u32,
}

impl<'a> AnnotationSet<'a> {
    pub fn parse(data: &'a [u8], offset: u32) -> Result<AnnotationSet<'a>, FormatError> {
        let mut reader = ByteReader::new(data, offset as usize);
        let len = reader.u32()?;
        let entries = reader.position();
        reader.skip(len as usize * 4)?;
        Ok(AnnotationSet { data, entries, len })
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of the `index`-th item
    pub fn item_offset(&self, index: usize) -> Result<u32, FormatError> {
        if index >= self.len() {
            return Err(FormatError::IndexOutOfRange {
                table: "annotation_set_item",
                index: index as u32,
                size: self.len,
            });
        }
        u32_at(self.data, self.entries + index * 4)
    }

    pub fn item(&self, index: usize) -> Result<AnnotationItem<'a>, FormatError> {
        AnnotationItem::parse(self.data, self.item_offset(index)?)
    }

    pub fn items(&self) -> AnnotationItems<'a> {
        AnnotationItems {
            set: *self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &AnnotationSet<'a> {
    type Item = Result<AnnotationItem<'a>, FormatError>;
    type IntoIter = AnnotationItems<'a>;

    fn into_iter(self) -> AnnotationItems<'a> {
        self.items()
    }
}

pub struct AnnotationItems<'a> {
    set: AnnotationSet<'a>,
    next: usize,
}

impl<'a> Iterator for AnnotationItems<'a> {
    type Item = Result<AnnotationItem<'a>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.set.len() {
            return None;
        }
        let item = self.set.item(self.next);
        self.next = if item.is_ok() {
            self.next + 1
        } else {
            self.set.len()
        };
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.set.len() - self.next;
        (remaining, Some(remaining))
    }
}

/// One `annotation_item`: visibility and type are decoded, elements are left for later
#[derive(Copy, Clone, Debug)]
pub struct AnnotationItem<'a> {
    /// Offset of the item in the file
    pub offset: u32,
    pub visibility: Visibility,
    pub type_index: TypeIndex,
    data: &'a [u8],
}

impl<'a> AnnotationItem<'a> {
    pub fn parse(data: &'a [u8], offset: u32) -> Result<AnnotationItem<'a>, FormatError> {
        let mut reader = ByteReader::new(data, offset as usize);
        let visibility = reader.u8()?;
        let visibility =
            Visibility::from_u8(visibility).ok_or(FormatError::InvalidVisibility {
                visibility,
                offset: offset as usize,
            })?;
        let type_index = TypeIndex(reader.uleb128()?);
        Ok(AnnotationItem {
            offset,
            visibility,
            type_index,
            data,
        })
    }

    /// Decode the annotation (this walks, and so validates, every element)
    pub fn annotation(&self) -> Result<EncodedAnnotation<'a>, FormatError> {
        decode_annotation(self.data, self.offset as usize + 1).map(|(annotation, _)| annotation)
    }

    /// Value of one element, found by binary search over the element names
    pub fn element_value(&self, name: StringIndex) -> Result<Option<EncodedValue<'a>>, FormatError> {
        self.annotation()?.element_value(name)
    }
}

/// View of an `annotation_set_ref_list`: one optional annotation set per method parameter
#[derive(Copy, Clone, Debug)]
pub struct AnnotationSetRefList<'a> {
    data: &'a [u8],
    entries: usize,
    len: u32,
}

impl<'a> AnnotationSetRefList<'a> {
    pub fn parse(data: &'a [u8], offset: u32) -> Result<AnnotationSetRefList<'a>, FormatError> {
        let mut reader = ByteReader::new(data, offset as usize);
        let len = reader.u32()?;
        let entries = reader.position();
        reader.skip(len as usize * 4)?;
        Ok(AnnotationSetRefList { data, entries, len })
    }

    /// Number of entries (which may be less than the number of declared parameters)
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Annotations on the `index`-th parameter
    ///
    /// Both a missing entry and a null set offset mean the parameter has no annotations.
    pub fn set(&self, index: usize) -> Result<Option<AnnotationSet<'a>>, FormatError> {
        if index >= self.len() {
            return Ok(None);
        }
        match u32_at(self.data, self.entries + index * 4)? {
            0 => Ok(None),
            offset => AnnotationSet::parse(self.data, offset).map(Some),
        }
    }

    pub fn sets(&self) -> impl Iterator<Item = Result<Option<AnnotationSet<'a>>, FormatError>> + '_ {
        (0..self.len()).map(move |index| self.set(index))
    }
}
