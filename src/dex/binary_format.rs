use super::FormatError;
use byteorder::{ByteOrder, LittleEndian};

/// Bounds-checked little-endian reader over a borrowed byte slice
///
/// DEX files have a few peculiarities that make it useful to have this instead of just using
/// `std::io::Cursor`:
///
///   - offsets are absolute positions in the file, so the reader tracks its position and
///     reports it in errors
///   - sizes and indices inside the data section are unsigned LEB128
///   - running out of bytes is a format error, not an IO error
///
#[derive(Clone, Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    /// Start reading at `position` (which may be past the end, in which case every read fails)
    pub fn new(data: &'a [u8], position: usize) -> ByteReader<'a> {
        ByteReader { data, position }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Borrow the next `len` bytes and advance past them
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let eof = FormatError::UnexpectedEof {
            offset: self.position,
            needed: len,
        };
        let end = self.position.checked_add(len).ok_or_else(|| eof.clone())?;
        let bytes = self.data.get(self.position..end).ok_or(eof)?;
        self.position = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), FormatError> {
        self.bytes(len).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, FormatError> {
        Ok(LittleEndian::read_u16(self.bytes(2)?))
    }

    pub fn u32(&mut self) -> Result<u32, FormatError> {
        Ok(LittleEndian::read_u32(self.bytes(4)?))
    }

    /// Read `size` (1 to 8) bytes as a little-endian unsigned integer
    pub fn uint_n(&mut self, size: usize) -> Result<u64, FormatError> {
        Ok(LittleEndian::read_uint(self.bytes(size)?, size))
    }

    /// Unsigned LEB128, at most 5 bytes long
    pub fn uleb128(&mut self) -> Result<u32, FormatError> {
        let start = self.position;
        let mut result: u32 = 0;
        for i in 0..5 {
            let byte = self.u8()?;
            result |= ((byte & 0x7f) as u32) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(FormatError::InvalidLeb128(start))
    }

    /// Unsigned LEB128 that may be one less than its real value (`-1` encodes "no index")
    pub fn uleb128p1(&mut self) -> Result<Option<u32>, FormatError> {
        Ok(self.uleb128()?.checked_sub(1))
    }
}

/// Read a `u32` at an absolute offset
pub fn u32_at(data: &[u8], offset: usize) -> Result<u32, FormatError> {
    ByteReader::new(data, offset).u32()
}

/// Read a `u16` at an absolute offset
pub fn u16_at(data: &[u8], offset: usize) -> Result<u16, FormatError> {
    ByteReader::new(data, offset).u16()
}
