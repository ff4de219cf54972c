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
use crate::{error::TableError, opcodes};
use lazy_static::lazy_static;
use log::{debug, trace};
use std::fmt;

// Specifies where to find the operand.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AddressingMethod {
    // The slot is unused.
    None,

    // The reg field of the ModR/M byte selects a general register (for example, AX (000)).
    Register,

    // A ModR/M byte follows the opcode and specifies the operand. The operand is either a
    // general-purpose register or a memory address. If it is a memory address, the address is
    // computed from a base register, an optional scaled index register and an optional
    // displacement.
    RegisterOrMemoryAddress,

    // The instruction has no ModR/M byte; the three least-significant bits of the opcode byte
    // select a general-purpose register.
    OpCodeRegister,

    // Immediate data. The operand value is encoded in subsequent bytes of the instruction.
    ImmediateData,

    // The constant 1, implied by the opcode (the D0-D3 shift group). No bytes are consumed.
    ImmediateOne,

    // The instruction contains a relative offset to be added to the address of the next
    // instruction (for example, JMP (E9), LOOP).
    RelativeOffset,

    // The instruction has no ModR/M byte; the address of the operand is encoded in the
    // instruction as a selector and offset (far CALL (9A) and far JMP (EA)).
    DirectAddress,

    // The instruction has no ModR/M byte; the offset of the operand is coded as a double word
    // in the instruction. No base register, index register, or scaling factor can be applied
    // (only MOV (A0, A1, A2, A3)).
    MemoryAddress,

    // Implicit registers, no bytes consumed.
    RegisterAl,
    RegisterCl,
    RegisterDx,
    RegisterEax,

    // The reg field of the ModR/M byte selects a segment register.
    SegmentRegister,
}

// Specifies what size the operand is.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OperandSize {
    None,

    // Byte, regardless of operand-size attribute.
    Byte,

    // Word, regardless of operand-size attribute (for example, ENTER).
    Word,

    // Doubleword, regardless of operand-size attribute.
    Dword,

    // Word or doubleword, depending on operand-size attribute (for example, INC (40),
    // PUSH (50)). Without an operand-size override this is always a doubleword.
    WordOrDword,

    // 32-bit offset plus 16-bit selector.
    Fword,

    // Floating point formats. Reserved; nothing in the tables uses these yet.
    Qword,
    Tword,
}

impl OperandSize {
    /// Number of bytes an operand of this size occupies in the instruction stream.
    pub fn width(self) -> Option<usize> {
        Some(match self {
            OperandSize::Byte => 1,
            OperandSize::Word => 2,
            OperandSize::Dword | OperandSize::WordOrDword => 4,
            OperandSize::Fword => 6,
            OperandSize::Qword => 8,
            OperandSize::Tword => 10,
            OperandSize::None => return None,
        })
    }

    /// The numeric base of the register family for this size: a register number from a ModR/M
    /// field plus this base gives the raw `Register` value.
    pub fn register_base(self) -> Option<u8> {
        match self {
            OperandSize::Byte => Some(0),
            OperandSize::Word => Some(8),
            OperandSize::Dword | OperandSize::WordOrDword => Some(32),
            _ => None,
        }
    }
}

#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum Mnemonic {
    Aaa,
    Aad,
    Aam,
    Aas,
    Adc,
    Add,
    And,
    Arpl,
    Bound,
    Bsf,
    Bsr,
    Bt,
    Btc,
    Btr,
    Bts,
    Call,
    #[strum(serialize = "call far")]
    CallFar,
    Cdq,
    Clc,
    Cld,
    Cli,
    Cmc,
    Cmp,
    Cmpsb,
    Cmpsd,
    Cmpxchg,
    Cwde,
    Daa,
    Das,
    Dec,
    Div,
    Enter,
    Hlt,
    Idiv,
    Imul,
    In,
    Inc,
    Insb,
    Insd,
    Int,
    Int1,
    Int3,
    Into,
    Iretd,
    Ja,
    Jb,
    Jbe,
    Je,
    Jecxz,
    Jg,
    Jge,
    Jl,
    Jle,
    Jmp,
    #[strum(serialize = "jmp far")]
    JmpFar,
    Jnb,
    Jne,
    Jno,
    Jns,
    Jo,
    Jpe,
    Jpo,
    Js,
    Lahf,
    Lds,
    Lea,
    Leave,
    Les,
    Lock,
    Lodsb,
    Lodsd,
    Loop,
    Loope,
    Loopne,
    Mov,
    Movsb,
    Movsd,
    Movsx,
    Movzx,
    Mul,
    Neg,
    Nop,
    Not,
    Or,
    Out,
    Outsb,
    Outsd,
    Pop,
    Popad,
    Popfd,
    Push,
    Pushad,
    Pushfd,
    Rcl,
    Rcr,
    Rep,
    Retf,
    Retn,
    Rol,
    Ror,
    Sahf,
    Sal,
    Salc,
    Sar,
    Sbb,
    Scasb,
    Scasd,
    Shl,
    Shr,
    Stc,
    Std,
    Sti,
    Stosb,
    Stosd,
    Sub,
    Test,
    Wait,
    Xchg,
    Xlatb,
    Xor,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct OperandDef {
    pub method: AddressingMethod,
    pub size: OperandSize,
}

impl OperandDef {
    pub const NONE: OperandDef = OperandDef {
        method: AddressingMethod::None,
        size: OperandSize::None,
    };

    pub fn is_none(&self) -> bool {
        self.method == AddressingMethod::None
    }
}

/// One candidate decoding of an opcode: the mnemonic and how to find each of its operands.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Form {
    pub mnemonic: Mnemonic,
    pub operand1: OperandDef,
    pub operand2: OperandDef,
}

impl Form {
    pub fn operand(&self, slot: usize) -> &OperandDef {
        match slot {
            0 => &self.operand1,
            1 => &self.operand2,
            _ => &OperandDef::NONE,
        }
    }
}

/// A single opcode definition.
///
/// Only `op1` is used to index the tables; `prefix` and `op2` are carried for completeness
/// and are always zero in the standard definitions. An opcode with `two_byte_prefix` set to
/// 0x0F lives in the two-byte table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OpCode {
    pub prefix: u8,
    pub two_byte_prefix: u8,
    pub op1: u8,
    pub op2: u8,

    // Candidates, indexed by the reg field of the ModR/M byte when `has_opcode_modifier`.
    pub forms: &'static [Form],

    // A ModR/M byte follows the opcode.
    pub has_register_token: bool,

    // The reg field of the ModR/M byte selects the form instead of a register.
    pub has_opcode_modifier: bool,
}

impl OpCode {
    pub const TWO_BYTE_ESCAPE: u8 = 0x0F;

    pub fn is_two_byte(&self) -> bool {
        self.two_byte_prefix == Self::TWO_BYTE_ESCAPE
    }

    // The opcode as it appears in the stream, e.g. 0x0FB6 for movzx.
    pub fn code(&self) -> u16 {
        if self.is_two_byte() {
            (u16::from(Self::TWO_BYTE_ESCAPE) << 8) | u16::from(self.op1)
        } else {
            u16::from(self.op1)
        }
    }

    pub fn mnemonics(&self) -> impl Iterator<Item = Mnemonic> + '_ {
        self.forms.iter().map(|form| form.mnemonic)
    }

    pub fn form(&self, index: usize) -> Option<&Form> {
        self.forms.get(index)
    }

    // First candidate with the given mnemonic; aliased candidates always resolve to the
    // lowest index.
    pub fn index_of(&self, mnemonic: Mnemonic) -> Option<usize> {
        self.forms.iter().position(|form| form.mnemonic == mnemonic)
    }

    pub fn opcode_size(&self) -> usize {
        if self.is_two_byte() {
            2
        } else {
            1
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_two_byte() {
            write!(f, "0x0F 0x{:02X}", self.op1)
        } else {
            write!(f, "0x{:02X}", self.op1)
        }
    }
}

/// The one- and two-byte opcode maps, indexed by the raw opcode byte.
#[derive(Clone, Debug)]
pub struct OpCodeTable {
    single_byte: [Option<OpCode>; 256],
    two_byte: [Option<OpCode>; 256],
}

impl OpCodeTable {
    pub fn builder() -> OpCodeTableBuilder {
        OpCodeTableBuilder::default()
    }

    /// Build a table from every definition in `opcodes::ALL`.
    pub fn standard() -> Result<Self, TableError> {
        let mut builder = Self::builder();
        builder.register_all(opcodes::ALL)?;
        Ok(builder.build())
    }

    pub fn lookup(&self, is_two_byte: bool, op: u8) -> Option<&OpCode> {
        if is_two_byte {
            self.two_byte[usize::from(op)].as_ref()
        } else {
            self.single_byte[usize::from(op)].as_ref()
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpCode> {
        self.single_byte
            .iter()
            .chain(self.two_byte.iter())
            .filter_map(|slot| slot.as_ref())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects opcode definitions into an `OpCodeTable`, refusing to let two definitions share
/// a slot.
pub struct OpCodeTableBuilder {
    table: OpCodeTable,
}

impl Default for OpCodeTableBuilder {
    fn default() -> Self {
        Self {
            table: OpCodeTable {
                single_byte: [None; 256],
                two_byte: [None; 256],
            },
        }
    }
}

impl OpCodeTableBuilder {
    pub fn register(&mut self, op: OpCode) -> Result<&mut Self, TableError> {
        Self::validate(&op)?;
        let slots = if op.is_two_byte() {
            &mut self.table.two_byte
        } else {
            &mut self.table.single_byte
        };
        let slot = &mut slots[usize::from(op.op1)];
        if let Some(existing) = slot {
            return Err(TableError::Occupied {
                opcode: op.code(),
                existing: existing.forms[0].mnemonic,
            });
        }
        trace!("registering {} as {}", op, op.forms[0].mnemonic);
        *slot = Some(op);
        Ok(self)
    }

    pub fn register_all(&mut self, ops: &[OpCode]) -> Result<&mut Self, TableError> {
        for op in ops {
            self.register(*op)?;
        }
        Ok(self)
    }

    pub fn build(self) -> OpCodeTable {
        debug!(
            "built opcode table: {} single byte, {} two byte",
            self.table.single_byte.iter().flatten().count(),
            self.table.two_byte.iter().flatten().count()
        );
        self.table
    }

    fn validate(op: &OpCode) -> Result<(), TableError> {
        let malformed = |reason| TableError::Malformed {
            opcode: op.code(),
            reason,
        };
        if op.forms.is_empty() || op.forms.len() > 8 {
            return Err(malformed("an opcode needs between 1 and 8 forms"));
        }
        if op.two_byte_prefix != 0 && !op.is_two_byte() {
            return Err(malformed("0x0F is the only supported escape byte"));
        }
        if op.prefix != 0 {
            return Err(malformed("prefixed opcodes are not supported"));
        }
        if op.has_opcode_modifier && !op.has_register_token {
            return Err(malformed("an opcode modifier needs a ModR/M byte"));
        }
        if !op.has_opcode_modifier && op.forms.len() > 1 {
            return Err(malformed("multiple forms need an opcode modifier"));
        }
        let uses_modrm = op.forms.iter().any(|form| {
            [form.operand1.method, form.operand2.method].iter().any(|m| {
                matches!(
                    m,
                    AddressingMethod::Register
                        | AddressingMethod::RegisterOrMemoryAddress
                        | AddressingMethod::SegmentRegister
                )
            })
        });
        if uses_modrm && !op.has_register_token {
            return Err(malformed("ModR/M operands need a ModR/M byte"));
        }
        Ok(())
    }
}

lazy_static! {
    pub static ref OPCODES: OpCodeTable =
        OpCodeTable::standard().expect("standard opcode definitions must not share a slot");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::*;
    use anyhow::Result;

    #[test]
    fn every_definition_resolves_to_itself() {
        for op in ALL {
            let found = OPCODES
                .lookup(op.is_two_byte(), op.op1)
                .unwrap_or_else(|| panic!("missing {}", op));
            assert_eq!(found, op);
            assert!(!found.forms.is_empty() && found.forms.len() <= 8);
            if !found.has_opcode_modifier {
                assert_eq!(found.forms.len(), 1, "{}", op);
            }
        }
        assert_eq!(OPCODES.len(), ALL.len());
    }

    #[test]
    fn gaps_are_empty() {
        assert!(OPCODES.lookup(false, 0x0F).is_none());
        assert!(OPCODES.lookup(false, 0x26).is_none());
        assert!(OPCODES.lookup(false, 0x66).is_none());
        assert!(OPCODES.lookup(false, 0xD8).is_none());
        assert!(OPCODES.lookup(true, 0x05).is_none());
        assert!(OPCODES.lookup(true, 0x84).is_some());
    }

    #[test]
    fn single_and_two_byte_tables_are_separate() {
        // 0x0F 0x80 (jo rel32) and 0x80 (arithmetic group) share op1.
        let group = OPCODES.lookup(false, 0x80).unwrap();
        let jo = OPCODES.lookup(true, 0x80).unwrap();
        assert_eq!(group.forms.len(), 8);
        assert_eq!(jo.forms[0].mnemonic, Mnemonic::Jo);
        assert_eq!(jo.code(), 0x0F80);
    }

    #[test]
    fn builder_refuses_duplicate_slots() -> Result<()> {
        let mut builder = OpCodeTable::builder();
        builder.register(ADD_RM8_R8)?;
        builder.register(JO_REL1632)?;
        builder.register(ARITHMETIC_RM8_IMM8)?;
        match builder.register(ADD_RM8_R8) {
            Err(TableError::Occupied { opcode, existing }) => {
                assert_eq!(opcode, 0x00);
                assert_eq!(existing, Mnemonic::Add);
            }
            other => panic!("expected an occupied slot, got {:?}", other.map(|_| ())),
        }
        assert_eq!(builder.build().len(), 3);
        Ok(())
    }

    #[test]
    fn builder_refuses_malformed_definitions() {
        let mut builder = OpCodeTable::builder();

        let no_forms = OpCode {
            forms: &[],
            ..NOP
        };
        assert!(matches!(
            builder.register(no_forms),
            Err(TableError::Malformed { .. })
        ));

        let modifier_without_token = OpCode {
            has_register_token: false,
            ..ARITHMETIC_RM8_IMM8
        };
        assert!(matches!(
            builder.register(modifier_without_token),
            Err(TableError::Malformed { .. })
        ));

        let bad_escape = OpCode {
            two_byte_prefix: 0x0E,
            ..NOP
        };
        assert!(matches!(
            builder.register(bad_escape),
            Err(TableError::Malformed { .. })
        ));
        assert!(builder.build().is_empty());
    }

    #[test]
    fn group_candidates_follow_the_reg_field() {
        let shifts = OPCODES.lookup(false, 0xC1).unwrap();
        let names = shifts.mnemonics().collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                Mnemonic::Rol,
                Mnemonic::Ror,
                Mnemonic::Rcl,
                Mnemonic::Rcr,
                Mnemonic::Shl,
                Mnemonic::Shr,
                Mnemonic::Sal,
                Mnemonic::Sar
            ]
        );
        assert_eq!(shifts.index_of(Mnemonic::Sar), Some(7));
        assert_eq!(shifts.index_of(Mnemonic::Mov), None);
    }

    #[test]
    fn mnemonic_names_render_lowercase() {
        assert_eq!(Mnemonic::Add.to_string(), "add");
        assert_eq!(Mnemonic::Int3.to_string(), "int3");
        assert_eq!(Mnemonic::CallFar.to_string(), "call far");
        assert_eq!(Mnemonic::JmpFar.to_string(), "jmp far");
    }

    #[test]
    fn operand_sizes() {
        assert_eq!(OperandSize::WordOrDword.width(), Some(4));
        assert_eq!(OperandSize::Fword.width(), Some(6));
        assert_eq!(OperandSize::None.width(), None);
        assert_eq!(OperandSize::Word.register_base(), Some(8));
        assert_eq!(OperandSize::Fword.register_base(), None);
    }
}
