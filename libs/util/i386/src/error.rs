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
    instruction::bs2s,
    lut::{AddressingMethod, Mnemonic, OperandSize},
};
use log::debug;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    // `offset` is the stream position of the first opcode byte.
    #[error(
        "unsupported opcode 0x{:02X}{} at position {}",
        .opcode,
        show_extension(.extension),
        .offset
    )]
    UnsupportedOpcode {
        offset: usize,
        opcode: u16,
        extension: Option<u8>,
    },

    #[error("opcode 0x{opcode:02X} has no {mnemonic} form")]
    UnsupportedMnemonic { mnemonic: Mnemonic, opcode: u16 },

    #[error("invalid operand: {0}")]
    InvalidOperandShape(String),

    #[error("no encoding for {method:?} operands of size {size:?}")]
    UnsupportedAddressingMethod {
        method: AddressingMethod,
        size: OperandSize,
    },

    #[error("instruction stream ended in the middle of {phase}")]
    TooShort { phase: &'static str },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn show_extension(extension: &Option<u8>) -> String {
    match extension {
        Some(ext) => format!(" /{}", ext),
        None => String::new(),
    }
}

impl CodecError {
    pub(crate) fn invalid<S: Into<String>>(reason: S) -> Self {
        CodecError::InvalidOperandShape(reason.into())
    }

    /// Log the bytes surrounding an unsupported opcode with a caret under the failing byte.
    /// Returns false if the error is something else.
    pub fn maybe_show(e: &anyhow::Error, code: &[u8]) -> bool {
        if let Some(&CodecError::UnsupportedOpcode {
            offset,
            opcode,
            extension,
        }) = e.downcast_ref::<CodecError>()
        {
            debug!(
                "Unsupported OpCode: 0x{:02X}{}",
                opcode,
                show_extension(&extension)
            );
            let offset = offset.min(code.len());
            let start = offset.saturating_sub(16);
            let end = (offset + 20).min(code.len());
            let line1 = bs2s(&code[start..end]);
            let mut line2 = String::new();
            for _ in 0..(offset - start) * 3 {
                line2 += "-";
            }
            line2 += "^";
            debug!("{}", line1);
            debug!("{}", line2);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("opcode slot 0x{opcode:02X} is already taken by {existing}")]
    Occupied { opcode: u16, existing: Mnemonic },

    #[error("malformed opcode definition 0x{opcode:02X}: {reason}")]
    Malformed { opcode: u16, reason: &'static str },
}
