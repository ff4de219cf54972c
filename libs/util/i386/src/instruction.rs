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
    lut::{AddressingMethod, Form, Mnemonic, OpCode, OperandDef},
    operand::{Operand, OperandValue, Register},
};
use std::fmt;

pub fn bs2s(bs: &[u8]) -> String {
    let mut s = String::with_capacity(bs.len() * 3);
    for b in bs {
        s += &format!("{:02X} ", b);
    }
    s
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    // Address of the first opcode byte.
    pub offset: u32,
    pub opcode: OpCode,
    pub mnemonic: Mnemonic,
    pub operand1: Option<Operand>,
    pub operand2: Option<Operand>,
}

impl Instruction {
    pub fn new(offset: u32, opcode: OpCode, mnemonic: Mnemonic) -> Self {
        Self {
            offset,
            opcode,
            mnemonic,
            operand1: None,
            operand2: None,
        }
    }

    pub fn with_operands(mut self, operand1: Option<Operand>, operand2: Option<Operand>) -> Self {
        self.operand1 = operand1;
        self.operand2 = operand2;
        self
    }

    pub fn operand(&self, slot: usize) -> Option<&Operand> {
        match slot {
            0 => self.operand1.as_ref(),
            1 => self.operand2.as_ref(),
            _ => None,
        }
    }

    // The candidate this instruction was decoded from, if the mnemonic belongs to the opcode.
    pub fn form(&self) -> Option<&Form> {
        self.opcode
            .index_of(self.mnemonic)
            .and_then(|index| self.opcode.form(index))
    }

    /// The number of bytes this instruction occupies once encoded.
    pub fn compute_size(&self) -> usize {
        let mut size = self.opcode.opcode_size();
        if self.opcode.has_register_token {
            size += 1;
        }
        if let Some(form) = self.form() {
            for slot in 0..2 {
                if let Some(operand) = self.operand(slot) {
                    size += Self::operand_size(form.operand(slot), operand);
                }
            }
        }
        size
    }

    fn operand_size(def: &OperandDef, operand: &Operand) -> usize {
        match def.method {
            AddressingMethod::ImmediateData | AddressingMethod::RelativeOffset => {
                def.size.width().unwrap_or(0)
            }
            AddressingMethod::MemoryAddress => 4,
            AddressingMethod::DirectAddress => 6,
            AddressingMethod::RegisterOrMemoryAddress => Self::modrm_operand_size(operand),
            _ => 0,
        }
    }

    // SIB and displacement bytes following the ModR/M byte.
    fn modrm_operand_size(operand: &Operand) -> usize {
        let correction = operand.correction.map(|c| c.width()).unwrap_or(0);
        match operand.value {
            OperandValue::Register(_) if !operand.is_memory() => 0,
            OperandValue::Register(base) => {
                let sib = operand.scaled_index.is_some() || base.number() == Register::Esp.number();
                usize::from(sib) + correction
            }
            OperandValue::Address(_) => usize::from(operand.scaled_index.is_some()) + 4,
            OperandValue::Immediate(_) => 0,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        match (&self.operand1, &self.operand2) {
            (Some(a), Some(b)) => write!(f, " {}, {}", a, b),
            (Some(a), None) | (None, Some(a)) => write!(f, " {}", a),
            (None, None) => Ok(()),
        }
    }
}

/// A run of decoded instructions along with the bytes they were decoded from.
#[derive(Clone, Debug)]
pub struct ByteCode {
    pub start_addr: u32,
    pub code: Vec<u8>,
    pub instrs: Vec<Instruction>,
}

impl ByteCode {
    pub fn size(&self) -> usize {
        self.code.len()
    }

    // The raw bytes that encode the given instruction.
    pub fn bytes_of(&self, instr: &Instruction) -> &[u8] {
        let start = instr.offset.wrapping_sub(self.start_addr) as usize;
        let end = (start + instr.compute_size()).min(self.code.len());
        &self.code[start.min(end)..end]
    }
}

impl fmt::Display for ByteCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for instr in &self.instrs {
            writeln!(
                f,
                "  @{:08X}: {:<24}{}",
                instr.offset,
                bs2s(self.bytes_of(instr)),
                instr
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        opcodes::*,
        operand::{Correction, Immediate, OperandUsage},
    };

    #[test]
    fn hex_strings() {
        assert_eq!(bs2s(&[0x8B, 0x04, 0x24]), "8B 04 24 ");
        assert_eq!(bs2s(&[]), "");
    }

    #[test]
    fn render_instructions() {
        let instr = Instruction::new(0, MOV_R1632_RM1632, Mnemonic::Mov).with_operands(
            Some(Operand::register(Register::Eax)),
            Some(
                Operand::register(Register::Ebx)
                    .with_usage(OperandUsage::DwordPointer)
                    .with_scaled_index(Register::Eax, 2)
                    .with_correction(Correction::Short(8)),
            ),
        );
        assert_eq!(instr.to_string(), "mov eax, dword [ebx+eax*2+0x8]");

        let instr = Instruction::new(0, NOP, Mnemonic::Nop);
        assert_eq!(instr.to_string(), "nop");

        let instr = Instruction::new(0, INDIRECT_RM1632, Mnemonic::CallFar).with_operands(
            Some(Operand::register(Register::Eax).with_usage(OperandUsage::FwordPointer)),
            None,
        );
        assert_eq!(instr.to_string(), "call far fword [eax]");
    }

    #[test]
    fn sizes() {
        let instr = Instruction::new(0, NOP, Mnemonic::Nop);
        assert_eq!(instr.compute_size(), 1);

        let instr = Instruction::new(0, MOV_EAX_IMM1632, Mnemonic::Mov).with_operands(
            Some(Operand::register(Register::Eax)),
            Some(Operand::immediate(Immediate::Dword(1))),
        );
        assert_eq!(instr.compute_size(), 5);

        // mov eax, [esp+4] needs a SIB byte
        let instr = Instruction::new(0, MOV_R1632_RM1632, Mnemonic::Mov).with_operands(
            Some(Operand::register(Register::Eax)),
            Some(
                Operand::register(Register::Esp)
                    .with_usage(OperandUsage::DwordPointer)
                    .with_correction(Correction::Short(4)),
            ),
        );
        assert_eq!(instr.compute_size(), 4);

        let instr = Instruction::new(0, MOV_R1632_RM1632, Mnemonic::Mov).with_operands(
            Some(Operand::register(Register::Eax)),
            Some(Operand::address(0x0040_4040).with_usage(OperandUsage::DwordPointer)),
        );
        assert_eq!(instr.compute_size(), 6);

        let instr = Instruction::new(0, ARITHMETIC_RM32_IMM8, Mnemonic::Sub).with_operands(
            Some(Operand::register(Register::Esp)),
            Some(Operand::immediate(Immediate::Byte(0x10))),
        );
        assert_eq!(instr.compute_size(), 3);

        let instr = Instruction::new(0, JE_REL1632, Mnemonic::Je)
            .with_operands(Some(Operand::address(0x100)), None);
        assert_eq!(instr.compute_size(), 6);

        let instr = Instruction::new(0, CALL_FAR_PTR1632, Mnemonic::CallFar)
            .with_operands(Some(Operand::immediate(Immediate::far(0x1B, 0x1000))), None);
        assert_eq!(instr.compute_size(), 7);
    }

    #[test]
    fn listing() {
        let bc = ByteCode {
            start_addr: 0x1000,
            code: vec![0x90, 0xC3],
            instrs: vec![
                Instruction::new(0x1000, NOP, Mnemonic::Nop),
                Instruction::new(0x1001, RETN, Mnemonic::Retn),
            ],
        };
        assert_eq!(bc.size(), 2);
        assert_eq!(bc.bytes_of(&bc.instrs[1]), &[0xC3]);
        let s = bc.to_string();
        assert_eq!(
            s,
            format!(
                "  @00001000: {:<24}nop\n  @00001001: {:<24}retn\n",
                "90 ", "C3 "
            )
        );
    }
}
