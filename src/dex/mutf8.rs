//! Modified UTF-8, as used for every string in a DEX file
//!
//! The differences from standard UTF-8 are that `U+0000` is encoded as `0xc0 0x80` and that
//! supplementary characters are encoded as surrogate pairs (each half taking three bytes). Most
//! strings (and nearly all descriptors) are plain ASCII, for which both encodings agree, so
//! decoding borrows whenever the input is already valid UTF-8.

use std::borrow::Cow;
use std::char::decode_utf16;

/// Decode modified UTF-8, borrowing when possible
///
/// Returns `None` on malformed input.
pub fn decode(bytes: &[u8]) -> Option<Cow<'_, str>> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Some(Cow::Borrowed(s));
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    while let Some(b0) = iter.next() {
        let unit = if b0 & 0x80 == 0 {
            b0 as u16
        } else if b0 & 0xe0 == 0xc0 {
            let b1 = continuation(iter.next())?;
            ((b0 as u16 & 0x1f) << 6) | b1
        } else if b0 & 0xf0 == 0xe0 {
            let b1 = continuation(iter.next())?;
            let b2 = continuation(iter.next())?;
            ((b0 as u16 & 0x0f) << 12) | (b1 << 6) | b2
        } else {
            return None;
        };
        units.push(unit);
    }

    decode_utf16(units)
        .collect::<Result<String, _>>()
        .ok()
        .map(Cow::Owned)
}

fn continuation(byte: Option<u8>) -> Option<u16> {
    match byte {
        Some(b) if b & 0xc0 == 0x80 => Some((b & 0x3f) as u16),
        _ => None,
    }
}

/// Compare two modified UTF-8 strings the way the string table is sorted (by UTF-16 code unit)
///
/// For the common case of strings without supplementary or NUL characters this is the same as
/// comparing the bytes.
pub fn compare(left: &[u8], right: &[u8]) -> std::cmp::Ordering {
    let left_units = Utf16Units(left.iter());
    let right_units = Utf16Units(right.iter());
    left_units.cmp(right_units)
}

/// Compare a modified UTF-8 string from the file with a Rust string, by UTF-16 code unit
pub fn compare_str(stored: &[u8], query: &str) -> std::cmp::Ordering {
    Utf16Units(stored.iter()).cmp(query.encode_utf16())
}

/// Lossy iterator of UTF-16 code units in a modified UTF-8 string
struct Utf16Units<'a>(std::slice::Iter<'a, u8>);

impl<'a> Iterator for Utf16Units<'a> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        let b0 = *self.0.next()?;
        let mut rest = |n: usize| -> u16 {
            let mut acc = 0;
            for _ in 0..n {
                acc = (acc << 6) | self.0.next().map_or(0, |b| (b & 0x3f) as u16);
            }
            acc
        };
        Some(if b0 & 0x80 == 0 {
            b0 as u16
        } else if b0 & 0xe0 == 0xc0 {
            ((b0 as u16 & 0x1f) << 6) | rest(1)
        } else {
            ((b0 as u16 & 0x0f) << 12) | rest(2)
        })
    }
}
