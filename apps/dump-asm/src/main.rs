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
use anyhow::{anyhow, bail, Result};
use i386::{assemble, disassemble, CodecError};
use log::LevelFilter;
use std::{fs, num::ParseIntError, path::PathBuf};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "disasm", about = "Disassemble and show an assembly fragment.")]
struct Opt {
    /// Trace disassembly process
    #[structopt(short = "v", long = "verbose")]
    verbose: bool,

    /// Address the first decoded byte is loaded at, in hex
    #[structopt(short = "b", long = "base", default_value = "0", parse(try_from_str = parse_hex))]
    base: u32,

    /// Number of bytes at the start of the file to skip
    #[structopt(short = "s", long = "skip", default_value = "0")]
    skip: usize,

    /// Re-encode the listing and check that it matches the input
    #[structopt(long = "verify")]
    verify: bool,

    /// Input file
    #[structopt(parse(from_os_str))]
    input: PathBuf,
}

fn parse_hex(s: &str) -> Result<u32, ParseIntError> {
    u32::from_str_radix(s.trim_start_matches("0x").trim_start_matches("0X"), 16)
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let mut logger = env_logger::Builder::from_default_env();
    if opt.verbose {
        logger.filter_level(LevelFilter::Trace);
    }
    logger.init();

    let data = fs::read(&opt.input)?;
    let code = data.get(opt.skip..).ok_or_else(|| {
        anyhow!(
            "cannot skip {} bytes of a {} byte file",
            opt.skip,
            data.len()
        )
    })?;

    let bc = disassemble(code, opt.base).map_err(anyhow::Error::from);
    if let Err(ref e) = bc {
        if !CodecError::maybe_show(e, code) {
            println!("ERROR: {}", e);
        }
    }
    let bc = bc?;
    println!("i386 Bytecode:\n{}", bc);

    if opt.verify {
        let out = assemble(&bc.instrs, opt.base)?;
        if out != code {
            let at = out
                .iter()
                .zip(code)
                .position(|(a, b)| a != b)
                .unwrap_or_else(|| out.len().min(code.len()));
            bail!(
                "re-encoded bytes differ at 0x{:08X}",
                opt.base.wrapping_add(at as u32)
            );
        }
        println!("verified {} bytes", out.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_bases() {
        assert_eq!(parse_hex("401000").unwrap(), 0x40_1000);
        assert_eq!(parse_hex("0x401000").unwrap(), 0x40_1000);
        assert!(parse_hex("0xZZ").is_err());
    }
}
