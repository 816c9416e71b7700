//! Just enough of the Dalvik instruction format to walk a method body and pick out the fields
//! and methods it refers to
//!
//! Instructions are sequences of 16-bit code units. The low byte of the first unit is the opcode,
//! which fixes the width of the instruction. The exceptions are the three payload
//! pseudo-instructions (switch tables and array data), which sit behind a `nop` opcode and carry
//! their own size.

use super::{
    u16_at, u32_at, ByteReader, DexFile, FieldIndex, FormatError, MethodIndex, StringIndex,
    TypeIndex,
};
use std::borrow::Cow;

/// Body of a method
#[derive(Copy, Clone, Debug)]
pub struct CodeItem<'a> {
    pub registers_size: u16,
    pub ins_size: u16,
    pub outs_size: u16,
    pub tries_size: u16,
    pub debug_info_off: u32,
    /// Instruction bytes (two per code unit)
    insns: &'a [u8],
}

impl<'a> CodeItem<'a> {
    /// Number of 16-bit code units
    pub fn insns_size(&self) -> u32 {
        (self.insns.len() / 2) as u32
    }

    pub fn instructions(&self) -> Instructions<'a> {
        Instructions {
            insns: self.insns,
            dex_pc: 0,
            failed: false,
        }
    }
}

impl<'a> DexFile<'a> {
    /// Read the `code_item` at `offset`
    pub fn code_item(&self, offset: u32) -> Result<CodeItem<'a>, FormatError> {
        let mut reader = ByteReader::new(self.data(), offset as usize);
        let registers_size = reader.u16()?;
        let ins_size = reader.u16()?;
        let outs_size = reader.u16()?;
        let tries_size = reader.u16()?;
        let debug_info_off = reader.u32()?;
        let insns_size = reader.u32()?;
        let insns = reader.bytes(insns_size as usize * 2)?;
        Ok(CodeItem {
            registers_size,
            ins_size,
            outs_size,
            tries_size,
            debug_info_off,
            insns,
        })
    }
}

/// Width in code units of every (non-payload) opcode
const fn opcode_width(opcode: u8) -> usize {
    match opcode {
        0x00 | 0x01 | 0x04 | 0x07 => 1,
        0x02 | 0x05 | 0x08 => 2,
        0x03 | 0x06 | 0x09 => 3,
        0x0a..=0x12 => 1,
        0x13 | 0x15 | 0x16 | 0x19 => 2,
        0x14 | 0x17 => 3,
        0x18 => 5,
        0x1a | 0x1c => 2,
        0x1b => 3,
        0x1d | 0x1e => 1,
        0x1f | 0x20 => 2,
        0x21 => 1,
        0x22 | 0x23 => 2,
        0x24..=0x26 => 3,
        0x27 | 0x28 => 1,
        0x29 => 2,
        0x2a..=0x2c => 3,
        0x2d..=0x3d => 2,
        0x3e..=0x43 => 1,
        0x44..=0x6d => 2,
        0x6e..=0x72 => 3,
        0x73 => 1,
        0x74..=0x78 => 3,
        0x79..=0x8f => 1,
        0x90..=0xaf => 2,
        0xb0..=0xcf => 1,
        0xd0..=0xe2 => 2,
        0xe3..=0xf9 => 1,
        0xfa | 0xfb => 4,
        0xfc | 0xfd => 3,
        0xfe | 0xff => 2,
    }
}

const PACKED_SWITCH_PAYLOAD: u16 = 0x0100;
const SPARSE_SWITCH_PAYLOAD: u16 = 0x0200;
const FILL_ARRAY_DATA_PAYLOAD: u16 = 0x0300;

/// One instruction (or payload) in a method body
#[derive(Copy, Clone, Debug)]
pub struct Instruction<'a> {
    /// Offset of the instruction, in code units from the start of the method
    pub dex_pc: u32,
    /// Bytes of the instruction (two per code unit)
    units: &'a [u8],
}

impl<'a> Instruction<'a> {
    pub fn opcode(&self) -> u8 {
        self.units[0]
    }

    /// Width in code units
    pub fn width(&self) -> usize {
        self.units.len() / 2
    }

    pub fn is_payload(&self) -> bool {
        self.opcode() == 0x00 && self.units[1] != 0x00
    }

    fn unit(&self, index: usize) -> u16 {
        u16::from_le_bytes([self.units[2 * index], self.units[2 * index + 1]])
    }

    /// Field or method this instruction accesses, if any
    ///
    /// Only field gets/puts and the five `invoke-*` kinds (with their `/range` forms) are
    /// reported. `invoke-polymorphic` and `invoke-custom` are deliberately skipped: their targets
    /// are reached indirectly (through method handles and call sites).
    pub fn member_access(&self) -> Option<(AccessKind, MemberIndex)> {
        let opcode = self.opcode();
        let (kind, member) = match opcode {
            0x52..=0x58 => (AccessKind::InstanceGet, MemberIndex::Field(FieldIndex(self.unit(1) as u32))),
            0x59..=0x5f => (AccessKind::InstancePut, MemberIndex::Field(FieldIndex(self.unit(1) as u32))),
            0x60..=0x66 => (AccessKind::StaticGet, MemberIndex::Field(FieldIndex(self.unit(1) as u32))),
            0x67..=0x6d => (AccessKind::StaticPut, MemberIndex::Field(FieldIndex(self.unit(1) as u32))),
            0x6e..=0x72 | 0x74..=0x78 => {
                let invoke_kind = match opcode {
                    0x6e | 0x74 => InvokeKind::Virtual,
                    0x6f | 0x75 => InvokeKind::Super,
                    0x70 | 0x76 => InvokeKind::Direct,
                    0x71 | 0x77 => InvokeKind::Static,
                    _ => InvokeKind::Interface,
                };
                (
                    AccessKind::Invoke(invoke_kind),
                    MemberIndex::Method(MethodIndex(self.unit(1) as u32)),
                )
            }
            _ => return None,
        };
        Some((kind, member))
    }
}

/// Iterator over the instructions of a method body
pub struct Instructions<'a> {
    insns: &'a [u8],
    dex_pc: u32,
    failed: bool,
}

impl<'a> Instructions<'a> {
    /// Width of the instruction starting at the current position
    fn current_width(&self) -> Result<usize, FormatError> {
        let offset = self.dex_pc as usize * 2;
        let truncated = FormatError::TruncatedInstruction {
            dex_pc: self.dex_pc,
        };
        let first = u16_at(self.insns, offset).map_err(|_| truncated.clone())?;
        let opcode = (first & 0xff) as u8;
        if opcode != 0x00 {
            return Ok(opcode_width(opcode));
        }
        let width = match first {
            PACKED_SWITCH_PAYLOAD => {
                let size = u16_at(self.insns, offset + 2).map_err(|_| truncated)? as usize;
                4 + size * 2
            }
            SPARSE_SWITCH_PAYLOAD => {
                let size = u16_at(self.insns, offset + 2).map_err(|_| truncated)? as usize;
                2 + size * 4
            }
            FILL_ARRAY_DATA_PAYLOAD => {
                let element_width = u16_at(self.insns, offset + 2).map_err(|_| truncated.clone())?;
                let size = u32_at(self.insns, offset + 4).map_err(|_| truncated)?;
                let data_bytes = element_width as usize * size as usize;
                4 + (data_bytes + 1) / 2
            }
            _ => 1,
        };
        Ok(width)
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.dex_pc as usize * 2;
        if self.failed || offset >= self.insns.len() {
            return None;
        }
        let instruction = self.current_width().and_then(|width| {
            let units = self.insns.get(offset..offset + width * 2).ok_or(
                FormatError::TruncatedInstruction {
                    dex_pc: self.dex_pc,
                },
            )?;
            Ok(Instruction {
                dex_pc: self.dex_pc,
                units,
            })
        });
        match &instruction {
            Ok(instruction) => self.dex_pc += instruction.width() as u32,
            Err(_) => self.failed = true,
        }
        Some(instruction)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum InvokeKind {
    Virtual,
    Super,
    Direct,
    Static,
    Interface,
}

/// How an instruction uses the member it refers to
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AccessKind {
    InstanceGet,
    InstancePut,
    StaticGet,
    StaticPut,
    Invoke(InvokeKind),
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MemberIndex {
    Field(FieldIndex),
    Method(MethodIndex),
}

/// Field or method reference extracted from one instruction, along with its symbolic declaring
/// class and name (nothing is resolved)
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct InstructionRef {
    pub dex_pc: u32,
    pub kind: AccessKind,
    pub member: MemberIndex,
    pub declaring_class: TypeIndex,
    pub name: StringIndex,
}

impl InstructionRef {
    /// Extract the member reference from an instruction, if it has one
    pub fn from_instruction(
        dex: &DexFile,
        instruction: &Instruction,
    ) -> Result<Option<InstructionRef>, FormatError> {
        let (kind, member) = match instruction.member_access() {
            None => return Ok(None),
            Some(access) => access,
        };
        let (declaring_class, name) = match member {
            MemberIndex::Field(field) => {
                let field_id = dex.field_id(field)?;
                (field_id.class, field_id.name)
            }
            MemberIndex::Method(method) => {
                let method_id = dex.method_id(method)?;
                (method_id.class, method_id.name)
            }
        };
        Ok(Some(InstructionRef {
            dex_pc: instruction.dex_pc,
            kind,
            member,
            declaring_class,
            name,
        }))
    }

    /// Descriptor of the class declaring the referenced member
    pub fn declaring_class_descriptor<'a>(
        &self,
        dex: &DexFile<'a>,
    ) -> Result<Cow<'a, str>, FormatError> {
        dex.type_descriptor(self.declaring_class)
    }

    /// `Lfoo/Bar;.name:I` style description of the referenced member
    pub fn describe(&self, dex: &DexFile) -> Result<String, FormatError> {
        match self.member {
            MemberIndex::Field(field) => dex.pretty_field(field),
            MemberIndex::Method(method) => dex.pretty_method(method),
        }
    }
}
