// This file is part of OpenFA.
//
// OpenFA is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// OpenFA is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with OpenFA.  If not, see <http://www.gnu.org/licenses/>.
use crate::lut::OperandSize;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// The numeric value of a register carries both its 3-bit ModR/M number (the low three bits)
/// and its size class (the range it sits in).
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    TryFromPrimitive,
    IntoPrimitive,
    strum::Display,
    strum::EnumIter,
)]
#[repr(u8)]
#[strum(serialize_all = "lowercase")]
pub enum Register {
    Al = 0,
    Cl = 1,
    Dl = 2,
    Bl = 3,
    Ah = 4,
    Ch = 5,
    Dh = 6,
    Bh = 7,

    Ax = 8,
    Cx = 9,
    Dx = 10,
    Bx = 11,
    Sp = 12,
    Bp = 13,
    Si = 14,
    Di = 15,

    Es = 16,
    Cs = 17,
    Ss = 18,
    Ds = 19,
    Fs = 20,
    Gs = 21,

    Eax = 32,
    Ecx = 33,
    Edx = 34,
    Ebx = 35,
    Esp = 36,
    Ebp = 37,
    Esi = 38,
    Edi = 39,
}

impl Register {
    const SEGMENT_BASE: u8 = 16;

    /// The register number as it appears in a ModR/M, SIB or opcode field.
    pub fn number(self) -> u8 {
        u8::from(self) & 7
    }

    /// The member of the family `number` in the register class for `size`.
    pub fn sized(number: u8, size: OperandSize) -> Option<Register> {
        let base = size.register_base()?;
        Register::try_from(base + (number & 7)).ok()
    }

    pub fn dword(number: u8) -> Register {
        match number & 7 {
            0 => Register::Eax,
            1 => Register::Ecx,
            2 => Register::Edx,
            3 => Register::Ebx,
            4 => Register::Esp,
            5 => Register::Ebp,
            6 => Register::Esi,
            _ => Register::Edi,
        }
    }

    pub fn segment(number: u8) -> Option<Register> {
        if number > 5 {
            return None;
        }
        Register::try_from(Self::SEGMENT_BASE + number).ok()
    }

    pub fn is_segment(self) -> bool {
        matches!(u8::from(self), 16..=21)
    }

    pub fn size(self) -> OperandSize {
        match u8::from(self) {
            0..=7 => OperandSize::Byte,
            8..=21 => OperandSize::Word,
            _ => OperandSize::Dword,
        }
    }
}

/// An unsigned value, tagged with the width it was read with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Immediate {
    Byte(u8),
    Word(u16),
    Dword(u32),
    // Far pointer: the selector in bits 32..48, the offset below it.
    Fword(u64),
}

impl Immediate {
    pub fn far(selector: u16, offset: u32) -> Self {
        Immediate::Fword((u64::from(selector) << 32) | u64::from(offset))
    }

    pub fn size(&self) -> OperandSize {
        match self {
            Immediate::Byte(_) => OperandSize::Byte,
            Immediate::Word(_) => OperandSize::Word,
            Immediate::Dword(_) => OperandSize::Dword,
            Immediate::Fword(_) => OperandSize::Fword,
        }
    }

    pub fn value(&self) -> u64 {
        match *self {
            Immediate::Byte(v) => u64::from(v),
            Immediate::Word(v) => u64::from(v),
            Immediate::Dword(v) => u64::from(v),
            Immediate::Fword(v) => v,
        }
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Immediate::Fword(v) => write!(f, "0x{:X}:0x{:X}", v >> 32, v & 0xFFFF_FFFF),
            _ => write!(f, "0x{:X}", self.value()),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OperandValue {
    Register(Register),
    Immediate(Immediate),

    // Absolute address: a memory offset, an EBP-direct address, or a resolved branch target.
    Address(u32),
}

impl fmt::Display for OperandValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OperandValue::Register(r) => write!(f, "{}", r),
            OperandValue::Immediate(i) => write!(f, "{}", i),
            OperandValue::Address(a) => write!(f, "0x{:X}", a),
        }
    }
}

/// Displacement from the base of a memory operand, kept at the width it was encoded with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Correction {
    Short(i8),
    Long(i32),
}

impl Correction {
    pub fn value(&self) -> i32 {
        match *self {
            Correction::Short(v) => i32::from(v),
            Correction::Long(v) => v,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            Correction::Short(_) => 1,
            Correction::Long(_) => 4,
        }
    }
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let v = self.value();
        match v.cmp(&0) {
            std::cmp::Ordering::Equal => Ok(()),
            std::cmp::Ordering::Greater => write!(f, "+0x{:X}", v),
            std::cmp::Ordering::Less => write!(f, "-0x{:X}", v.unsigned_abs()),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ScaledIndex {
    pub register: Register,
    pub multiplier: u8,
}

impl ScaledIndex {
    pub fn new(register: Register, multiplier: u8) -> Self {
        Self {
            register,
            multiplier,
        }
    }
}

impl fmt::Display for ScaledIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.multiplier == 1 {
            write!(f, "+{}", self.register)
        } else {
            write!(f, "+{}*{}", self.register, self.multiplier)
        }
    }
}

/// How an operand is rendered: either as a bare value or as a sized memory reference.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OperandUsage {
    Normal,
    BytePointer,
    WordPointer,
    DwordPointer,
    FwordPointer,
}

impl OperandUsage {
    pub fn for_size(size: OperandSize) -> Self {
        match size {
            OperandSize::Byte => OperandUsage::BytePointer,
            OperandSize::Word => OperandUsage::WordPointer,
            OperandSize::Dword | OperandSize::WordOrDword => OperandUsage::DwordPointer,
            OperandSize::Fword => OperandUsage::FwordPointer,
            _ => OperandUsage::Normal,
        }
    }

    pub fn is_pointer(&self) -> bool {
        *self != OperandUsage::Normal
    }

    fn prefix(&self) -> Option<&'static str> {
        match self {
            OperandUsage::Normal => None,
            OperandUsage::BytePointer => Some("byte"),
            OperandUsage::WordPointer => Some("word"),
            OperandUsage::DwordPointer => Some("dword"),
            OperandUsage::FwordPointer => Some("fword"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Operand {
    pub value: OperandValue,
    pub scaled_index: Option<ScaledIndex>,
    pub correction: Option<Correction>,
    pub usage: OperandUsage,
}

impl Operand {
    pub fn new(value: OperandValue) -> Self {
        Self {
            value,
            scaled_index: None,
            correction: None,
            usage: OperandUsage::Normal,
        }
    }

    pub fn register(register: Register) -> Self {
        Self::new(OperandValue::Register(register))
    }

    pub fn immediate(immediate: Immediate) -> Self {
        Self::new(OperandValue::Immediate(immediate))
    }

    pub fn address(address: u32) -> Self {
        Self::new(OperandValue::Address(address))
    }

    pub fn with_usage(mut self, usage: OperandUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_scaled_index(mut self, register: Register, multiplier: u8) -> Self {
        self.scaled_index = Some(ScaledIndex::new(register, multiplier));
        self
    }

    pub fn with_correction(mut self, correction: Correction) -> Self {
        self.correction = Some(correction);
        self
    }

    pub fn as_register(&self) -> Option<Register> {
        match self.value {
            OperandValue::Register(r) => Some(r),
            _ => None,
        }
    }

    // Anything beyond a bare value must be rendered in brackets.
    pub fn is_memory(&self) -> bool {
        self.usage.is_pointer() || self.scaled_index.is_some() || self.correction.is_some()
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.is_memory() {
            return write!(f, "{}", self.value);
        }
        if let Some(prefix) = self.usage.prefix() {
            write!(f, "{} ", prefix)?;
        }
        write!(f, "[{}", self.value)?;
        if let Some(index) = &self.scaled_index {
            write!(f, "{}", index)?;
        }
        if let Some(correction) = &self.correction {
            write!(f, "{}", correction)?;
        }
        write!(f, "]")
    }
}
