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

//! Byte exact decoding and encoding of 32 bit x86 machine code.
//!
//! Decoding a buffer and encoding the result at the same base address gives back the
//! original bytes.
mod assembler;
mod disassembler;
mod error;
mod instruction;
mod lut;
pub mod opcodes;
mod operand;
mod stream;

pub use crate::{
    assembler::{assemble, Assembler},
    disassembler::{disassemble, Disassembler},
    error::{CodecError, TableError},
    instruction::{bs2s, ByteCode, Instruction},
    lut::{
        AddressingMethod, Form, Mnemonic, OpCode, OpCodeTable, OpCodeTableBuilder, OperandDef,
        OperandSize, OPCODES,
    },
    operand::{Correction, Immediate, Operand, OperandUsage, OperandValue, Register, ScaledIndex},
    stream::{BinaryReader, BinaryWriter},
};
