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
use crate::{
    error::CodecError,
    instruction::{ByteCode, Instruction},
    lut::{AddressingMethod, OpCode, OpCodeTable, OperandDef, OperandSize, OPCODES},
    operand::{Correction, Immediate, Operand, OperandUsage, Register},
    stream::BinaryReader,
};
use log::{debug, trace};
use std::io::{self, Cursor};

const RM_SIB: u8 = 4;
const RM_DISP32: u8 = 5;

const MOD_INDIRECT: u8 = 0b00;
const MOD_DISP8: u8 = 0b01;
const MOD_DISP32: u8 = 0b10;
const MOD_REGISTER: u8 = 0b11;

/// Decodes one instruction at a time from a byte stream.
pub struct Disassembler<'t, R> {
    table: &'t OpCodeTable,
    reader: R,

    // Address of stream position 0.
    base_address: u32,
}

impl<R: BinaryReader> Disassembler<'static, R> {
    pub fn new(reader: R) -> Self {
        Self::with_table(&OPCODES, reader)
    }
}

impl<'t, R: BinaryReader> Disassembler<'t, R> {
    pub fn with_table(table: &'t OpCodeTable, reader: R) -> Self {
        Self {
            table,
            reader,
            base_address: 0,
        }
    }

    pub fn with_base_address(mut self, base_address: u32) -> Self {
        self.base_address = base_address;
        self
    }

    pub fn base_address(&self) -> u32 {
        self.base_address
    }

    pub fn position(&self) -> usize {
        self.reader.position()
    }

    pub fn is_exhausted(&self) -> bool {
        self.reader.is_exhausted()
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    pub fn decode_next(&mut self) -> Result<Instruction, CodecError> {
        let start = self.reader.position();
        let offset = self.address_of(start);

        let mut op = self.read_u8("opcode")?;
        let is_two_byte = op == OpCode::TWO_BYTE_ESCAPE;
        let mut code = u16::from(op);
        if is_two_byte {
            op = self.read_u8("two byte opcode")?;
            code = (code << 8) | u16::from(op);
        }
        let opcode = *self
            .table
            .lookup(is_two_byte, op)
            .ok_or(CodecError::UnsupportedOpcode {
                offset: start,
                opcode: code,
                extension: None,
            })?;

        let token = if opcode.has_register_token {
            self.read_u8("modrm")?
        } else {
            0
        };
        let index = if opcode.has_opcode_modifier {
            (token >> 3) & 7
        } else {
            0
        };
        let form = *opcode
            .form(usize::from(index))
            .ok_or(CodecError::UnsupportedOpcode {
                offset: start,
                opcode: code,
                extension: Some(index),
            })?;

        // Operand 2 may consume bytes that follow operand 1's.
        let operand1 = self.decode_operand(&form.operand1, op, token)?;
        let operand2 = self.decode_operand(&form.operand2, op, token)?;

        let instr = Instruction {
            offset,
            opcode,
            mnemonic: form.mnemonic,
            operand1,
            operand2,
        };
        trace!("@{:08X}: {}", offset, instr);
        Ok(instr)
    }

    /// Decode every remaining instruction in the stream.
    pub fn decode_remaining(&mut self) -> Result<Vec<Instruction>, CodecError> {
        let mut instrs = Vec::new();
        while !self.reader.is_exhausted() {
            instrs.push(self.decode_next()?);
        }
        Ok(instrs)
    }

    fn address_of(&self, position: usize) -> u32 {
        self.base_address.wrapping_add(position as u32)
    }

    fn decode_operand(
        &mut self,
        def: &OperandDef,
        op: u8,
        token: u8,
    ) -> Result<Option<Operand>, CodecError> {
        Ok(Some(match def.method {
            AddressingMethod::None => return Ok(None),
            AddressingMethod::OpCodeRegister => Operand::register(Self::sized_register(op, def)?),
            AddressingMethod::Register => Operand::register(Self::sized_register(token >> 3, def)?),
            AddressingMethod::SegmentRegister => {
                let number = (token >> 3) & 7;
                let sreg = Register::segment(number).ok_or_else(|| {
                    CodecError::invalid(format!("no segment register {}", number))
                })?;
                Operand::register(sreg)
            }
            AddressingMethod::RegisterOrMemoryAddress => self.decode_modrm(def, token)?,
            AddressingMethod::ImmediateData => Operand::immediate(self.read_immediate(def)?),
            AddressingMethod::ImmediateOne => Operand::immediate(Immediate::Byte(1)),
            AddressingMethod::RelativeOffset => {
                let delta = match def.size {
                    OperandSize::Byte => i32::from(self.read_i8("relative offset")?),
                    OperandSize::Word => i32::from(self.read_i16("relative offset")?),
                    OperandSize::Dword | OperandSize::WordOrDword => {
                        self.read_i32("relative offset")?
                    }
                    _ => return Err(Self::unsupported(def)),
                };
                // Relative to the first byte after the displacement.
                let next = self.address_of(self.reader.position());
                Operand::address(next.wrapping_add(delta as u32))
            }
            AddressingMethod::DirectAddress => {
                if def.size != OperandSize::Fword {
                    return Err(Self::unsupported(def));
                }
                Operand::immediate(self.read_far()?)
            }
            AddressingMethod::MemoryAddress => Operand::address(self.read_u32("memory offset")?)
                .with_usage(OperandUsage::for_size(def.size)),
            AddressingMethod::RegisterAl => Operand::register(Register::Al),
            AddressingMethod::RegisterCl => Operand::register(Register::Cl),
            AddressingMethod::RegisterDx => Operand::register(Register::Dx),
            AddressingMethod::RegisterEax => Operand::register(Register::Eax),
        }))
    }

    fn decode_modrm(&mut self, def: &OperandDef, token: u8) -> Result<Operand, CodecError> {
        let mode = token >> 6;
        let rm = token & 7;
        trace!(
            "modrm: mod={:02b} reg={:03b} rm={:03b}",
            mode,
            (token >> 3) & 7,
            rm
        );
        if mode == MOD_REGISTER {
            return Ok(Operand::register(Self::sized_register(rm, def)?));
        }

        // Memory addressing is always 32 bit, whatever the size of the value.
        let operand = if mode == MOD_INDIRECT && rm == RM_DISP32 {
            Operand::address(self.read_u32("direct address")?)
        } else if rm == RM_SIB {
            self.decode_sib(mode)?
        } else {
            Operand::register(Register::dword(rm))
        };
        let correction = match mode {
            MOD_DISP8 => Some(Correction::Short(self.read_i8("displacement")?)),
            MOD_DISP32 => Some(Correction::Long(self.read_i32("displacement")?)),
            _ => None,
        };
        Ok(Operand {
            correction,
            usage: OperandUsage::for_size(def.size),
            ..operand
        })
    }

    fn decode_sib(&mut self, mode: u8) -> Result<Operand, CodecError> {
        let sib = self.read_u8("sib")?;
        let scale = sib >> 6;
        let index = (sib >> 3) & 7;
        let base = sib & 7;
        trace!("sib: scale={} index={:03b} base={:03b}", scale, index, base);

        // Without a displacement, a base of EBP means there is no base at all.
        let operand = if mode == MOD_INDIRECT && base == RM_DISP32 {
            Operand::address(self.read_u32("sib displacement")?)
        } else {
            Operand::register(Register::dword(base))
        };
        // ESP cannot be scaled; an index of 100 means no index.
        if index == RM_SIB {
            return Ok(operand);
        }
        Ok(operand.with_scaled_index(Register::dword(index), 1 << scale))
    }

    fn read_immediate(&mut self, def: &OperandDef) -> Result<Immediate, CodecError> {
        Ok(match def.size {
            OperandSize::Byte => Immediate::Byte(self.read_u8("immediate")?),
            OperandSize::Word => Immediate::Word(self.read_u16("immediate")?),
            OperandSize::Dword | OperandSize::WordOrDword => {
                Immediate::Dword(self.read_u32("immediate")?)
            }
            OperandSize::Fword => self.read_far()?,
            _ => return Err(Self::unsupported(def)),
        })
    }

    // ptr16:32 is stored offset first.
    fn read_far(&mut self) -> Result<Immediate, CodecError> {
        let offset = self.read_u32("far pointer")?;
        let selector = self.read_u16("far pointer selector")?;
        Ok(Immediate::far(selector, offset))
    }

    fn sized_register(number: u8, def: &OperandDef) -> Result<Register, CodecError> {
        Register::sized(number, def.size).ok_or_else(|| Self::unsupported(def))
    }

    fn unsupported(def: &OperandDef) -> CodecError {
        CodecError::UnsupportedAddressingMethod {
            method: def.method,
            size: def.size,
        }
    }

    fn too_short(e: io::Error, phase: &'static str) -> CodecError {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::TooShort { phase }
        } else {
            CodecError::Io(e)
        }
    }

    fn read_u8(&mut self, phase: &'static str) -> Result<u8, CodecError> {
        self.reader.read_u8().map_err(|e| Self::too_short(e, phase))
    }

    fn read_u16(&mut self, phase: &'static str) -> Result<u16, CodecError> {
        self.reader.read_u16().map_err(|e| Self::too_short(e, phase))
    }

    fn read_u32(&mut self, phase: &'static str) -> Result<u32, CodecError> {
        self.reader.read_u32().map_err(|e| Self::too_short(e, phase))
    }

    fn read_i8(&mut self, phase: &'static str) -> Result<i8, CodecError> {
        self.reader.read_i8().map_err(|e| Self::too_short(e, phase))
    }

    fn read_i16(&mut self, phase: &'static str) -> Result<i16, CodecError> {
        self.reader.read_i16().map_err(|e| Self::too_short(e, phase))
    }

    fn read_i32(&mut self, phase: &'static str) -> Result<i32, CodecError> {
        self.reader.read_i32().map_err(|e| Self::too_short(e, phase))
    }
}

impl<'t, T: AsRef<[u8]>> Disassembler<'t, Cursor<T>> {
    /// Decode from the current position to the end of the buffer.
    pub fn decode_all(&mut self) -> Result<ByteCode, CodecError> {
        let start = BinaryReader::position(&self.reader);
        let instrs = self.decode_remaining()?;
        let end = BinaryReader::position(&self.reader);
        let code = self.reader.get_ref().as_ref()[start..end].to_vec();
        debug!(
            "decoded {} instructions from {} bytes at 0x{:08X}",
            instrs.len(),
            code.len(),
            self.address_of(start)
        );
        Ok(ByteCode {
            start_addr: self.address_of(start),
            code,
            instrs,
        })
    }
}

/// Decode all of `code`, which will be loaded at `base_address`.
pub fn disassemble(code: &[u8], base_address: u32) -> Result<ByteCode, CodecError> {
    Disassembler::new(Cursor::new(code))
        .with_base_address(base_address)
        .decode_all()
}
