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
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor};

/// Sequential little-endian reads over an instruction stream.
pub trait BinaryReader {
    fn position(&self) -> usize;
    fn read_u8(&mut self) -> io::Result<u8>;
    fn read_u16(&mut self) -> io::Result<u16>;
    fn read_u32(&mut self) -> io::Result<u32>;

    fn read_i8(&mut self) -> io::Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_i16(&mut self) -> io::Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    fn read_i32(&mut self) -> io::Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    // True once every byte has been consumed.
    fn is_exhausted(&self) -> bool;
}

/// Sequential little-endian writes of an instruction stream.
pub trait BinaryWriter {
    fn position(&self) -> usize;
    fn write_u8(&mut self, v: u8) -> io::Result<()>;
    fn write_u16(&mut self, v: u16) -> io::Result<()>;
    fn write_u32(&mut self, v: u32) -> io::Result<()>;

    fn write_i8(&mut self, v: i8) -> io::Result<()> {
        self.write_u8(v as u8)
    }

    fn write_i16(&mut self, v: i16) -> io::Result<()> {
        self.write_u16(v as u16)
    }

    fn write_i32(&mut self, v: i32) -> io::Result<()> {
        self.write_u32(v as u32)
    }
}

impl<T: AsRef<[u8]>> BinaryReader for Cursor<T> {
    fn position(&self) -> usize {
        Cursor::position(self) as usize
    }

    fn read_u8(&mut self) -> io::Result<u8> {
        ReadBytesExt::read_u8(self)
    }

    fn read_u16(&mut self) -> io::Result<u16> {
        ReadBytesExt::read_u16::<LittleEndian>(self)
    }

    fn read_u32(&mut self) -> io::Result<u32> {
        ReadBytesExt::read_u32::<LittleEndian>(self)
    }

    fn is_exhausted(&self) -> bool {
        Cursor::position(self) as usize >= self.get_ref().as_ref().len()
    }
}

impl BinaryWriter for Vec<u8> {
    fn position(&self) -> usize {
        self.len()
    }

    fn write_u8(&mut self, v: u8) -> io::Result<()> {
        WriteBytesExt::write_u8(self, v)
    }

    fn write_u16(&mut self, v: u16) -> io::Result<()> {
        WriteBytesExt::write_u16::<LittleEndian>(self, v)
    }

    fn write_u32(&mut self, v: u32) -> io::Result<()> {
        WriteBytesExt::write_u32::<LittleEndian>(self, v)
    }
}

impl BinaryWriter for Cursor<Vec<u8>> {
    fn position(&self) -> usize {
        Cursor::position(self) as usize
    }

    fn write_u8(&mut self, v: u8) -> io::Result<()> {
        WriteBytesExt::write_u8(self, v)
    }

    fn write_u16(&mut self, v: u16) -> io::Result<()> {
        WriteBytesExt::write_u16::<LittleEndian>(self, v)
    }

    fn write_u32(&mut self, v: u32) -> io::Result<()> {
        WriteBytesExt::write_u32::<LittleEndian>(self, v)
    }
}

impl<R: BinaryReader + ?Sized> BinaryReader for &mut R {
    fn position(&self) -> usize {
        (**self).position()
    }

    fn read_u8(&mut self) -> io::Result<u8> {
        (**self).read_u8()
    }

    fn read_u16(&mut self) -> io::Result<u16> {
        (**self).read_u16()
    }

    fn read_u32(&mut self) -> io::Result<u32> {
        (**self).read_u32()
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}

impl<W: BinaryWriter + ?Sized> BinaryWriter for &mut W {
    fn position(&self) -> usize {
        (**self).position()
    }

    fn write_u8(&mut self, v: u8) -> io::Result<()> {
        (**self).write_u8(v)
    }

    fn write_u16(&mut self, v: u16) -> io::Result<()> {
        (**self).write_u16(v)
    }

    fn write_u32(&mut self, v: u32) -> io::Result<()> {
        (**self).write_u32(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn reads_are_little_endian() -> Result<()> {
        let mut cursor = Cursor::new(vec![0x01u8, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xFE]);
        assert_eq!(BinaryReader::read_u8(&mut cursor)?, 0x01);
        assert_eq!(BinaryReader::read_u16(&mut cursor)?, 0x1234);
        assert_eq!(BinaryReader::position(&cursor), 3);
        assert_eq!(BinaryReader::read_u32(&mut cursor)?, 0x1234_5678);
        assert!(!cursor.is_exhausted());
        assert_eq!(BinaryReader::read_i8(&mut cursor)?, -2);
        assert!(cursor.is_exhausted());
        let err = BinaryReader::read_u8(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        Ok(())
    }

    #[test]
    fn signed_reads_sign_extend() -> Result<()> {
        let code: &[u8] = &[0xF0, 0xFF, 0xFF, 0xFF, 0xFE, 0xFF];
        let mut cursor = Cursor::new(code);
        assert_eq!(BinaryReader::read_i32(&mut cursor)?, -16);
        assert_eq!(BinaryReader::read_i16(&mut cursor)?, -2);
        Ok(())
    }

    #[test]
    fn writers_track_position() -> Result<()> {
        let mut out: Vec<u8> = Vec::new();
        BinaryWriter::write_u8(&mut out, 0xE9)?;
        BinaryWriter::write_i32(&mut out, -5)?;
        BinaryWriter::write_u16(&mut out, 0xBEEF)?;
        assert_eq!(BinaryWriter::position(&out), 7);
        assert_eq!(out, vec![0xE9, 0xFB, 0xFF, 0xFF, 0xFF, 0xEF, 0xBE]);

        let mut cursor = Cursor::new(Vec::<u8>::new());
        {
            let mut lent = &mut cursor;
            BinaryWriter::write_u32(&mut lent, 0x0040_4040)?;
            BinaryWriter::write_i8(&mut lent, -1)?;
        }
        assert_eq!(BinaryWriter::position(&cursor), 5);
        assert_eq!(cursor.into_inner(), vec![0x40, 0x40, 0x40, 0x00, 0xFF]);
        Ok(())
    }
}
