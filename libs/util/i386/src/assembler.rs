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
    instruction::Instruction,
    lut::{AddressingMethod, OpCode, OperandDef, OperandSize},
    operand::{Correction, Immediate, Operand, OperandValue, Register, ScaledIndex},
    stream::BinaryWriter,
};
use log::trace;

const RM_SIB: u8 = 4;
const RM_DISP32: u8 = 5;

const MOD_INDIRECT: u8 = 0b00;
const MOD_DISP8: u8 = 0b01;
const MOD_DISP32: u8 = 0b10;
const MOD_REGISTER: u8 = 0b11;

// The ModR/M mod and rm bits for an operand, plus the SIB and displacement bytes after it.
struct ModRm {
    bits: u8,
    tail: Vec<u8>,
}

/// Writes instructions back out as machine code.
pub struct Assembler<W> {
    writer: W,

    // Address of writer position 0.
    base_address: u32,
}

impl<W: BinaryWriter> Assembler<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            base_address: 0,
        }
    }

    pub fn with_base_address(mut self, base_address: u32) -> Self {
        self.base_address = base_address;
        self
    }

    pub fn position(&self) -> usize {
        self.writer.position()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Encode one instruction. Nothing is written if the instruction cannot be encoded.
    pub fn encode(&mut self, instr: &Instruction) -> Result<(), CodecError> {
        let opcode = &instr.opcode;
        let index = opcode
            .index_of(instr.mnemonic)
            .ok_or(CodecError::UnsupportedMnemonic {
                mnemonic: instr.mnemonic,
                opcode: opcode.code(),
            })?;
        let form = opcode.forms[index];
        let defs = [form.operand1, form.operand2];
        let operands = [instr.operand1.as_ref(), instr.operand2.as_ref()];
        for (slot, (def, operand)) in defs.iter().zip(operands.iter()).enumerate() {
            match (def.is_none(), operand) {
                (true, Some(_)) => {
                    return Err(CodecError::invalid(format!(
                        "{} takes no operand {}",
                        instr.mnemonic,
                        slot + 1
                    )))
                }
                (false, None) => {
                    return Err(CodecError::invalid(format!(
                        "{} is missing operand {}",
                        instr.mnemonic,
                        slot + 1
                    )))
                }
                _ => {}
            }
        }

        let mut token = 0u8;
        let mut modrm = None;
        for (def, operand) in defs.iter().zip(operands.iter()) {
            if let Some(operand) = operand {
                match def.method {
                    AddressingMethod::Register => {
                        token |= Self::general_register(operand, def)?.number() << 3;
                    }
                    AddressingMethod::SegmentRegister => {
                        token |= Self::segment_register(operand)?.number() << 3;
                    }
                    AddressingMethod::RegisterOrMemoryAddress => {
                        let encoded = Self::modrm(operand, def)?;
                        token |= encoded.bits;
                        modrm = Some(encoded);
                    }
                    _ => {}
                }
            }
        }
        if opcode.has_opcode_modifier {
            token |= (index as u8) << 3;
        }

        let mut out: Vec<u8> = Vec::with_capacity(16);
        if opcode.is_two_byte() {
            out.write_u8(OpCode::TWO_BYTE_ESCAPE)?;
        }
        out.write_u8(opcode.op1)?;
        if opcode.has_register_token {
            out.write_u8(token)?;
        }
        for (def, operand) in defs.iter().zip(operands.iter()) {
            if let Some(operand) = operand {
                self.encode_operand(&mut out, opcode, def, operand, modrm.as_ref())?;
            }
        }

        for b in &out {
            self.writer.write_u8(*b)?;
        }
        trace!("encoded {} as {:02X?}", instr, out);
        Ok(())
    }

    fn encode_operand(
        &self,
        out: &mut Vec<u8>,
        opcode: &OpCode,
        def: &OperandDef,
        operand: &Operand,
        modrm: Option<&ModRm>,
    ) -> Result<(), CodecError> {
        match def.method {
            AddressingMethod::None | AddressingMethod::Register => {}
            AddressingMethod::SegmentRegister => {}
            AddressingMethod::OpCodeRegister => {
                let expect = Register::sized(opcode.op1, def.size);
                if operand.is_memory() || operand.as_register() != expect {
                    return Err(CodecError::invalid(format!(
                        "opcode {} encodes {:?}, not {}",
                        opcode, expect, operand
                    )));
                }
            }
            AddressingMethod::RegisterAl => Self::fixed(operand, Register::Al)?,
            AddressingMethod::RegisterCl => Self::fixed(operand, Register::Cl)?,
            AddressingMethod::RegisterDx => Self::fixed(operand, Register::Dx)?,
            AddressingMethod::RegisterEax => Self::fixed(operand, Register::Eax)?,
            AddressingMethod::ImmediateOne => {
                if Self::immediate(operand)?.value() != 1 {
                    return Err(CodecError::invalid(format!("{} is not 1", operand)));
                }
            }
            AddressingMethod::ImmediateData => {
                let imm = Self::immediate(operand)?;
                Self::write_sized(out, imm, def)?;
            }
            AddressingMethod::DirectAddress => {
                let imm = Self::immediate(operand)?;
                if def.size != OperandSize::Fword {
                    return Err(Self::unsupported(def));
                }
                Self::write_sized(out, imm, def)?;
            }
            AddressingMethod::MemoryAddress => match operand.value {
                OperandValue::Address(address)
                    if operand.scaled_index.is_none() && operand.correction.is_none() =>
                {
                    out.write_u32(address)?;
                }
                _ => {
                    return Err(CodecError::invalid(format!(
                        "{} is not an absolute address",
                        operand
                    )))
                }
            },
            AddressingMethod::RelativeOffset => {
                let target = match operand.value {
                    OperandValue::Address(target) if !operand.is_memory() => target,
                    _ => {
                        return Err(CodecError::invalid(format!(
                            "{} is not a branch target",
                            operand
                        )))
                    }
                };
                let width = def.size.width().ok_or_else(|| Self::unsupported(def))?;
                let next = self
                    .base_address
                    .wrapping_add((self.writer.position() + out.len() + width) as u32);
                let delta = target.wrapping_sub(next) as i32;
                let out_of_range = || {
                    CodecError::invalid(format!(
                        "target 0x{:X} is out of range from 0x{:X}",
                        target, next
                    ))
                };
                match def.size {
                    OperandSize::Byte => {
                        out.write_i8(i8::try_from(delta).map_err(|_| out_of_range())?)?
                    }
                    OperandSize::Word => {
                        out.write_i16(i16::try_from(delta).map_err(|_| out_of_range())?)?
                    }
                    OperandSize::Dword | OperandSize::WordOrDword => out.write_i32(delta)?,
                    _ => return Err(Self::unsupported(def)),
                }
            }
            AddressingMethod::RegisterOrMemoryAddress => {
                if let Some(modrm) = modrm {
                    out.extend_from_slice(&modrm.tail);
                }
            }
        }
        Ok(())
    }

    fn modrm(operand: &Operand, def: &OperandDef) -> Result<ModRm, CodecError> {
        let mut tail: Vec<u8> = Vec::new();
        let bits = match operand.value {
            OperandValue::Register(reg) if !operand.is_memory() => {
                if reg.is_segment() || Register::sized(reg.number(), def.size) != Some(reg) {
                    return Err(CodecError::invalid(format!(
                        "{} is not a {:?} register",
                        reg, def.size
                    )));
                }
                (MOD_REGISTER << 6) | reg.number()
            }
            OperandValue::Register(base) => {
                if base.size() != OperandSize::Dword {
                    return Err(CodecError::invalid(format!(
                        "{} cannot address memory",
                        base
                    )));
                }
                let mode = match operand.correction {
                    None => MOD_INDIRECT,
                    Some(Correction::Short(_)) => MOD_DISP8,
                    Some(Correction::Long(_)) => MOD_DISP32,
                };
                if mode == MOD_INDIRECT && base.number() == RM_DISP32 {
                    return Err(CodecError::invalid(
                        "[ebp] has no encoding without a displacement",
                    ));
                }
                let rm = if operand.scaled_index.is_some() || base.number() == RM_SIB {
                    tail.write_u8(Self::sib(operand.scaled_index.as_ref(), base.number())?)?;
                    RM_SIB
                } else {
                    base.number()
                };
                match operand.correction {
                    Some(Correction::Short(v)) => tail.write_i8(v)?,
                    Some(Correction::Long(v)) => tail.write_i32(v)?,
                    None => {}
                }
                (mode << 6) | rm
            }
            OperandValue::Address(address) => {
                if operand.correction.is_some() {
                    return Err(CodecError::invalid(
                        "an absolute address cannot take a displacement",
                    ));
                }
                // A SIB base of EBP with mod 00 also means a bare disp32.
                let rm = if let Some(index) = &operand.scaled_index {
                    tail.write_u8(Self::sib(Some(index), RM_DISP32)?)?;
                    RM_SIB
                } else {
                    RM_DISP32
                };
                tail.write_u32(address)?;
                (MOD_INDIRECT << 6) | rm
            }
            OperandValue::Immediate(_) => {
                return Err(CodecError::invalid(format!(
                    "{} cannot be a register or memory operand",
                    operand
                )))
            }
        };
        Ok(ModRm { bits, tail })
    }

    fn sib(index: Option<&ScaledIndex>, base: u8) -> Result<u8, CodecError> {
        let (scale, index) = match index {
            None => (0, RM_SIB),
            Some(index) => {
                if index.register.size() != OperandSize::Dword || index.register == Register::Esp
                {
                    return Err(CodecError::invalid(format!(
                        "{} cannot be an index",
                        index.register
                    )));
                }
                let scale = match index.multiplier {
                    1 => 0,
                    2 => 1,
                    4 => 2,
                    8 => 3,
                    m => {
                        return Err(CodecError::invalid(format!(
                            "multiplier {} is not 1, 2, 4 or 8",
                            m
                        )))
                    }
                };
                (scale, index.register.number())
            }
        };
        Ok((scale << 6) | (index << 3) | base)
    }

    fn general_register(operand: &Operand, def: &OperandDef) -> Result<Register, CodecError> {
        match operand.as_register() {
            Some(reg)
                if !operand.is_memory()
                    && !reg.is_segment()
                    && Register::sized(reg.number(), def.size) == Some(reg) =>
            {
                Ok(reg)
            }
            _ => Err(CodecError::invalid(format!(
                "{} is not a {:?} register",
                operand, def.size
            ))),
        }
    }

    fn segment_register(operand: &Operand) -> Result<Register, CodecError> {
        match operand.as_register() {
            Some(reg) if reg.is_segment() && !operand.is_memory() => Ok(reg),
            _ => Err(CodecError::invalid(format!(
                "{} is not a segment register",
                operand
            ))),
        }
    }

    fn fixed(operand: &Operand, expect: Register) -> Result<(), CodecError> {
        if operand.is_memory() || operand.as_register() != Some(expect) {
            return Err(CodecError::invalid(format!(
                "expected {}, not {}",
                expect, operand
            )));
        }
        Ok(())
    }

    fn immediate(operand: &Operand) -> Result<Immediate, CodecError> {
        match operand.value {
            OperandValue::Immediate(imm) if !operand.is_memory() => Ok(imm),
            _ => Err(CodecError::invalid(format!(
                "{} is not an immediate",
                operand
            ))),
        }
    }

    fn write_sized(out: &mut Vec<u8>, imm: Immediate, def: &OperandDef) -> Result<(), CodecError> {
        let too_wide = || CodecError::invalid(format!("{} does not fit in {:?}", imm, def.size));
        let v = imm.value();
        match def.size {
            OperandSize::Byte => out.write_u8(u8::try_from(v).map_err(|_| too_wide())?)?,
            OperandSize::Word => out.write_u16(u16::try_from(v).map_err(|_| too_wide())?)?,
            OperandSize::Dword | OperandSize::WordOrDword => {
                out.write_u32(u32::try_from(v).map_err(|_| too_wide())?)?
            }
            OperandSize::Fword => {
                if v >> 48 != 0 {
                    return Err(too_wide());
                }
                out.write_u32(v as u32)?;
                out.write_u16((v >> 32) as u16)?;
            }
            _ => return Err(Self::unsupported(def)),
        }
        Ok(())
    }

    fn unsupported(def: &OperandDef) -> CodecError {
        CodecError::UnsupportedAddressingMethod {
            method: def.method,
            size: def.size,
        }
    }
}

/// Encode `instrs` back to back, the first at `base_address`.
pub fn assemble(instrs: &[Instruction], base_address: u32) -> Result<Vec<u8>, CodecError> {
    let mut asm = Assembler::new(Vec::new()).with_base_address(base_address);
    for instr in instrs {
        asm.encode(instr)?;
    }
    Ok(asm.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        disassembler::{disassemble, Disassembler},
        lut::Mnemonic,
        opcodes::*,
        operand::OperandUsage,
    };
    use anyhow::Result;
    use std::io::Cursor;

    fn round_trip(code: &[u8], base: u32) -> Result<()> {
        let bc = disassemble(code, base)?;
        let mut next = base;
        for instr in &bc.instrs {
            assert_eq!(instr.offset, next, "size of the instruction before {}", instr);
            next += instr.compute_size() as u32;
        }
        assert_eq!((next - base) as usize, code.len());
        let out = assemble(&bc.instrs, base)?;
        assert_eq!(out, code, "\n{}", bc);
        Ok(())
    }

    #[test]
    fn register_only_modrm_round_trips() -> Result<()> {
        for r1 in 0..8u8 {
            for r2 in 0..8u8 {
                round_trip(&[0x89, 0xC0 | (r1 << 3) | r2], 0)?;
            }
        }
        Ok(())
    }

    #[test]
    fn special_cases_round_trip() -> Result<()> {
        // ebp direct
        round_trip(&[0x8B, 0x05, 0x40, 0x40, 0x40, 0x00], 0)?;
        // esp selects sib
        round_trip(&[0x8B, 0x44, 0x43, 0x08], 0)?;
        // relative branch
        round_trip(&[0xE9, 0x05, 0x00, 0x00, 0x00], 0x10)?;
        // mov eax, imm32
        round_trip(&[0xB8, 0x01, 0x00, 0x00, 0x00], 0)?;
        Ok(())
    }

    #[test]
    fn corpus_round_trips() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let corpus: &[&[u8]] = &[
            &[0x55],
            &[0x89, 0xE5],
            &[0x83, 0xEC, 0x10],
            &[0x8B, 0x45, 0x08],
            &[0x8B, 0x04, 0x24],
            &[0x8B, 0x44, 0x24, 0x04],
            &[0x8B, 0x84, 0x24, 0x00, 0x01, 0x00, 0x00],
            &[0x8B, 0x04, 0x8D, 0x00, 0x10, 0x00, 0x00],
            &[0x8B, 0x44, 0x88, 0xF8],
            &[0x8B, 0x85, 0x00, 0xFF, 0xFF, 0xFF],
            &[0x89, 0x1D, 0x40, 0x40, 0x40, 0x00],
            &[0xC7, 0x45, 0xFC, 0x00, 0x00, 0x00, 0x00],
            &[0xC6, 0x05, 0x10, 0x20, 0x40, 0x00, 0x01],
            &[0x80, 0x7D, 0x08, 0x00],
            &[0x81, 0xC1, 0x00, 0x01, 0x00, 0x00],
            &[0xC1, 0xE0, 0x04],
            &[0xD1, 0xF8],
            &[0xD3, 0xE2],
            &[0xF7, 0xD8],
            &[0xF7, 0xC1, 0xFF, 0x00, 0x00, 0x00],
            &[0xF6, 0x45, 0x08, 0x01],
            &[0xFE, 0xC0],
            &[0xFF, 0x15, 0x00, 0x30, 0x40, 0x00],
            &[0xFF, 0x24, 0x85, 0x00, 0x50, 0x40, 0x00],
            &[0xFF, 0x75, 0x08],
            &[0xFF, 0x1B],
            &[0x8F, 0x45, 0xF8],
            &[0x8D, 0x44, 0x24, 0x10],
            &[0x8D, 0x0C, 0x49],
            &[0x0F, 0xB6, 0x45, 0xFF],
            &[0x0F, 0xBE, 0xC0],
            &[0x0F, 0xB7, 0x06],
            &[0x0F, 0xAF, 0xC1],
            &[0x0F, 0xA3, 0xC8],
            &[0x0F, 0xB1, 0x0A],
            &[0x8C, 0xD8],
            &[0x8E, 0xD8],
            &[0xA1, 0x00, 0x10, 0x40, 0x00],
            &[0xA2, 0x00, 0x10, 0x40, 0x00],
            &[0xB0, 0x7F],
            &[0x68, 0x00, 0x10, 0x40, 0x00],
            &[0x6A, 0xFF],
            &[0xC2, 0x08, 0x00],
            &[0xC8, 0x10, 0x00, 0x00],
            &[0xE4, 0x60],
            &[0xEE],
            &[0xED],
            &[0xCD, 0x21],
            &[0x9A, 0x00, 0x20, 0x40, 0x00, 0x1B, 0x00],
            &[0xEA, 0x00, 0x20, 0x40, 0x00, 0x1B, 0x00],
            &[0xC4, 0x06],
            &[0xF3, 0xA4],
            &[0x06, 0x1F, 0x0E, 0x16, 0x17, 0x1E, 0x07],
            &[0x6C, 0x6D, 0x6E, 0x6F],
            &[0xE8, 0x00, 0x00, 0x00, 0x00],
            &[0x74, 0xFE],
            &[0x90, 0x0F, 0x85, 0xF0, 0xFF, 0xFF, 0xFF],
            &[0xE2, 0xF0],
            &[0xC9, 0xC3],
            &[0x91, 0x97],
        ];
        for code in corpus {
            round_trip(code, 0x0040_1000)?;
        }
        Ok(())
    }

    #[test]
    fn two_byte_opcodes_write_the_escape() -> Result<()> {
        let instr = Instruction::new(0, MOVZX_R1632_RM8, Mnemonic::Movzx).with_operands(
            Some(Operand::register(Register::Eax)),
            Some(Operand::register(Register::Cl)),
        );
        assert_eq!(assemble(&[instr], 0)?, vec![0x0F, 0xB6, 0xC1]);
        Ok(())
    }

    #[test]
    fn test_alias_encodes_as_the_first_form() -> Result<()> {
        let bc = disassemble(&[0xF6, 0xC8, 0x01], 0)?;
        assert_eq!(bc.instrs[0].mnemonic, Mnemonic::Test);
        assert_eq!(assemble(&bc.instrs, 0)?, vec![0xF6, 0xC0, 0x01]);
        Ok(())
    }

    #[test]
    fn branches_follow_their_target() -> Result<()> {
        let jmp = Instruction::new(0x1000, JMP_REL8, Mnemonic::Jmp)
            .with_operands(Some(Operand::address(0x1000)), None);
        assert_eq!(assemble(&[jmp.clone()], 0x1000)?, vec![0xEB, 0xFE]);

        // Placed 3 bytes past its target.
        let out = assemble(
            &[Instruction::new(0x1002, NOP, Mnemonic::Nop), jmp.clone()],
            0x1002,
        )?;
        assert_eq!(out, vec![0x90, 0xEB, 0xFB]);

        let far = Instruction::new(0, JMP_REL8, Mnemonic::Jmp)
            .with_operands(Some(Operand::address(0x1000)), None);
        assert!(matches!(
            assemble(&[far], 0),
            Err(CodecError::InvalidOperandShape(_))
        ));
        Ok(())
    }

    #[test]
    fn wrong_mnemonic() {
        let instr = Instruction::new(0, ADD_RM8_R8, Mnemonic::Sub).with_operands(
            Some(Operand::register(Register::Al)),
            Some(Operand::register(Register::Bl)),
        );
        match assemble(&[instr], 0) {
            Err(CodecError::UnsupportedMnemonic { mnemonic, opcode }) => {
                assert_eq!(mnemonic, Mnemonic::Sub);
                assert_eq!(opcode, 0x00);
            }
            other => panic!("expected an unsupported mnemonic, got {:?}", other),
        }
    }

    #[test]
    fn invalid_shapes() {
        let mov = |src: Operand| {
            Instruction::new(0, MOV_R1632_RM1632, Mnemonic::Mov)
                .with_operands(Some(Operand::register(Register::Eax)), Some(src))
        };
        let cases = vec![
            // multiplier outside 1, 2, 4, 8
            mov(Operand::register(Register::Ebx)
                .with_usage(OperandUsage::DwordPointer)
                .with_scaled_index(Register::Ecx, 3)),
            // esp cannot be scaled
            mov(Operand::register(Register::Ebx)
                .with_usage(OperandUsage::DwordPointer)
                .with_scaled_index(Register::Esp, 2)),
            // [ebp] only exists with a displacement
            mov(Operand::register(Register::Ebp).with_usage(OperandUsage::DwordPointer)),
            // 16 bit base
            mov(Operand::register(Register::Bx).with_usage(OperandUsage::DwordPointer)),
            // wrong register size
            mov(Operand::register(Register::Cl)),
            // immediate where a register belongs
            mov(Operand::immediate(Immediate::Dword(4))),
        ];
        for instr in cases {
            assert!(
                matches!(assemble(&[instr.clone()], 0), Err(CodecError::InvalidOperandShape(_))),
                "{}",
                instr
            );
        }

        // Operand in an empty slot.
        let nop = Instruction::new(0, NOP, Mnemonic::Nop)
            .with_operands(Some(Operand::register(Register::Eax)), None);
        assert!(matches!(
            assemble(&[nop], 0),
            Err(CodecError::InvalidOperandShape(_))
        ));

        // Missing operand.
        let push = Instruction::new(0, PUSH_EAX, Mnemonic::Push);
        assert!(matches!(
            assemble(&[push], 0),
            Err(CodecError::InvalidOperandShape(_))
        ));

        // The opcode implies eax.
        let push = Instruction::new(0, PUSH_EAX, Mnemonic::Push)
            .with_operands(Some(Operand::register(Register::Ecx)), None);
        assert!(matches!(
            assemble(&[push], 0),
            Err(CodecError::InvalidOperandShape(_))
        ));

        // Immediate too wide for its field.
        let push = Instruction::new(0, PUSH_IMM8, Mnemonic::Push)
            .with_operands(Some(Operand::immediate(Immediate::Word(0x100))), None);
        assert!(matches!(
            assemble(&[push], 0),
            Err(CodecError::InvalidOperandShape(_))
        ));
    }

    #[test]
    fn failures_write_nothing() -> Result<()> {
        let mut asm = Assembler::new(Cursor::new(Vec::<u8>::new()));
        asm.encode(&Instruction::new(0, NOP, Mnemonic::Nop))?;
        let bad = Instruction::new(0, MOV_RM1632_IMM1632, Mnemonic::Mov).with_operands(
            Some(
                Operand::register(Register::Eax)
                    .with_usage(OperandUsage::DwordPointer)
                    .with_scaled_index(Register::Ecx, 5),
            ),
            Some(Operand::immediate(Immediate::Dword(0))),
        );
        assert!(asm.encode(&bad).is_err());
        assert_eq!(asm.position(), 1);
        assert_eq!(asm.into_inner().into_inner(), vec![0x90]);
        Ok(())
    }

    #[test]
    fn decode_then_encode_through_cursors() -> Result<()> {
        let code: [u8; 9] = [0x8B, 0x44, 0x43, 0x08, 0xE9, 0x05, 0x00, 0x00, 0x00];
        let mut dis = Disassembler::new(Cursor::new(&code[..])).with_base_address(0x10);
        let mut asm = Assembler::new(Vec::new()).with_base_address(0x10);
        while !dis.is_exhausted() {
            asm.encode(&dis.decode_next()?)?;
        }
        assert_eq!(asm.into_inner(), code.to_vec());
        Ok(())
    }
}
