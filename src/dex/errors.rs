use super::ValueType;

/// Malformed or truncated container data
///
/// These are always fatal to the decode in progress, but never to the process: they get
/// propagated back to whoever asked the question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Tried to read `needed` bytes at `offset`, but the data ended first
    UnexpectedEof { offset: usize, needed: usize },

    /// File doesn't start with `dex\n???\0`
    BadMagic([u8; 8]),

    /// Unsigned LEB128 longer than 5 bytes
    InvalidLeb128(usize),

    /// Low 5 bits of an encoded value tag don't name a known type
    InvalidValueType { tag: u8, offset: usize },

    /// Encoded value claims more bytes than its type can hold
    InvalidValueSize {
        value_type: ValueType,
        size: usize,
        offset: usize,
    },

    /// Annotation visibility byte outside of build/runtime/system
    InvalidVisibility { visibility: u8, offset: usize },

    /// Arrays or annotations nested deeper than `MAX_NESTING_DEPTH`
    NestingTooDeep(usize),

    /// Annotation elements must be sorted by strictly increasing name index
    UnsortedElements { offset: usize },

    /// Index into one of the id tables (strings, types, ...) is past its end
    IndexOutOfRange {
        table: &'static str,
        index: u32,
        size: u32,
    },

    /// String data that isn't valid modified UTF-8
    InvalidString { offset: usize },

    /// Instruction stream ends in the middle of an instruction
    TruncatedInstruction { dex_pc: u32 },

    /// Type or method descriptor that doesn't parse
    InvalidDescriptor(String),
}
