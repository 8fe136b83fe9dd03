use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian {
    Big,
    Little,
}

/// Addressable unit of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Byte = 1,
    Word = 2,
}

impl Unit {
    pub fn bytes(self) -> usize {
        self as usize
    }
}

/// Sequential reader over target memory used by the disassembler.
///
/// `offset`/`seek` let the engine look ahead and rewind before it commits
/// to a match.
pub trait ByteReader {
    /// Target address of the next unread unit.
    fn address(&self) -> u32;
    fn has_next(&self) -> bool;
    fn read_u8(&mut self) -> Result<u8>;
    fn offset(&self) -> usize;
    fn seek(&mut self, offset: usize);

    fn read_u16(&mut self, endian: Endian) -> Result<u16> {
        let b = [self.read_u8()?, self.read_u8()?];
        Ok(match endian {
            Endian::Big => u16::from_be_bytes(b),
            Endian::Little => u16::from_le_bytes(b),
        })
    }

    fn read_u32(&mut self, endian: Endian) -> Result<u32> {
        let b = [self.read_u8()?, self.read_u8()?, self.read_u8()?, self.read_u8()?];
        Ok(match endian {
            Endian::Big => u32::from_be_bytes(b),
            Endian::Little => u32::from_le_bytes(b),
        })
    }
}

/// Flat image loaded at `base`, read through a cursor.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    pub mem: Vec<u8>,
    pub base: u32,
    pub unit: Unit,
    pos: usize,
}

impl Memory {
    pub fn new(base: u32, mem: Vec<u8>) -> Self {
        Self { mem, base, unit: Unit::Byte, pos: 0 }
    }

    /// Image for a word-addressed target; addresses count 16-bit units.
    pub fn words(base: u32, mem: Vec<u8>) -> Self {
        Self { unit: Unit::Word, ..Self::new(base, mem) }
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    /// Moves the cursor to target address `addr`.
    pub fn goto(&mut self, addr: u32) {
        let units = addr.wrapping_sub(self.base) as usize;
        self.pos = (units * self.unit.bytes()).min(self.mem.len());
    }

    pub fn remaining(&self) -> usize {
        self.mem.len() - self.pos
    }
}

impl ByteReader for Memory {
    fn address(&self) -> u32 {
        self.base.wrapping_add((self.pos / self.unit.bytes()) as u32)
    }
    fn has_next(&self) -> bool {
        self.pos < self.mem.len()
    }
    fn read_u8(&mut self) -> Result<u8> {
        let b = *self.mem.get(self.pos).ok_or(ErrorKind::NoMemory.at(self.pos))?;
        self.pos += 1;
        Ok(b)
    }
    fn offset(&self) -> usize {
        self.pos
    }
    fn seek(&mut self, offset: usize) {
        self.pos = offset.min(self.mem.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_units_advance_address_by_one() {
        let mut m = Memory::words(0x100, vec![0x12, 0x34, 0x56, 0x78]);
        assert_eq!(m.address(), 0x100);
        assert_eq!(m.read_u16(Endian::Big).unwrap(), 0x1234);
        assert_eq!(m.address(), 0x101);
        m.goto(0x100);
        assert_eq!(m.read_u32(Endian::Little).unwrap(), 0x7856_3412);
        assert!(!m.has_next());
        assert_eq!(m.read_u8().unwrap_err().kind, ErrorKind::NoMemory);
    }
}
