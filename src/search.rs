use crate::arch::{ArchConfig, ArchOperand, Architecture};
use crate::error::{ErrorKind, Result};
use crate::instructions::{Entry, Page};
use crate::memory::{ByteReader, Endian, Unit};

/// Finds the entry for `name` whose slots accept `ops`.
///
/// `UnknownInstruction` when no enabled entry has the name,
/// `OperandNotAllowed` when some do but none accepts the operands.
pub fn search_by_name<A: Architecture + ?Sized>(
    arch: &A,
    name: &str,
    ops: &[ArchOperand<A>],
) -> std::result::Result<(&'static Page<A::Mode>, &'static Entry<A::Mode>), ErrorKind> {
    let mut name_hits = 0usize;
    let mut found: Option<(&'static Page<A::Mode>, &'static Entry<A::Mode>)> = None;
    for (page, entry) in arch.table().candidates(name) {
        if !arch.page_enabled(page) {
            continue;
        }
        name_hits += 1;
        let accepted = entry.slots.len() == ops.len()
            && entry.slots.iter().zip(ops).all(|(slot, op)| arch.accepts(slot.mode, op.mode));
        if !accepted {
            continue;
        }
        match found {
            None => found = Some((page, entry)),
            Some((_, first)) => {
                tracing::debug!(name, first = first.opcode, other = entry.opcode, "more than one entry accepts operands; using first");
            }
        }
    }
    match found {
        Some(hit) => {
            tracing::trace!(name, opcode = hit.1.opcode, "matched");
            Ok(hit)
        }
        None if name_hits == 0 => Err(ErrorKind::UnknownInstruction),
        None => Err(ErrorKind::OperandNotAllowed),
    }
}

/// Entry matched from a byte stream, with what was read to match it.
#[derive(Debug, Clone)]
pub struct Found<M: 'static> {
    pub page: &'static Page<M>,
    pub entry: &'static Entry<M>,
    pub opcode: u32,
    /// Prefix, infix and opcode bytes in stream order.
    pub bytes: Vec<u8>,
    pub infix: Vec<u8>,
}

pub(crate) fn read_unit<R: ByteReader + ?Sized>(reader: &mut R, config: &ArchConfig, bytes: &mut Vec<u8>) -> Result<u32> {
    match config.unit {
        Unit::Byte => {
            let b = reader.read_u8()?;
            bytes.push(b);
            Ok(b as u32)
        }
        Unit::Word => {
            let w = reader.read_u16(config.endian)?;
            let raw = match config.endian {
                Endian::Big => w.to_be_bytes(),
                Endian::Little => w.to_le_bytes(),
            };
            bytes.extend_from_slice(&raw);
            Ok(w as u32)
        }
    }
}

fn read_opcode<R: ByteReader + ?Sized>(reader: &mut R, config: &ArchConfig, units: u8, bytes: &mut Vec<u8>) -> Result<u32> {
    let bits = config.unit.bytes() as u32 * 8;
    let mut opcode = 0u32;
    for i in 0..units as u32 {
        let u = read_unit(reader, config, bytes)?;
        opcode = match config.endian {
            Endian::Little => opcode | u << (bits * i),
            Endian::Big => (opcode << bits) | u,
        };
    }
    Ok(opcode)
}

fn try_page<A: Architecture + ?Sized, R: ByteReader + ?Sized>(
    arch: &A,
    page: &'static Page<A::Mode>,
    reader: &mut R,
) -> Result<Option<Found<A::Mode>>> {
    let config = arch.config();
    let mut bytes = Vec::new();
    for &p in page.prefix {
        if reader.read_u8()? != p {
            return Ok(None);
        }
        bytes.push(p);
    }
    let mut infix = Vec::new();
    for _ in 0..page.infix {
        let before = bytes.len();
        read_unit(reader, config, &mut bytes)?;
        infix.extend_from_slice(&bytes[before..]);
    }
    let opcode = read_opcode(reader, config, page.opcode_len, &mut bytes)?;
    for entry in page.entries {
        if !entry.matches(opcode) {
            continue;
        }
        if let Some(post) = entry.post {
            // Look at the next unit without committing to it.
            let mark = reader.offset();
            let next = read_unit(reader, config, &mut Vec::new());
            reader.seek(mark);
            match next {
                Ok(next) if post(next) => {}
                _ => continue,
            }
        }
        return Ok(Some(Found { page, entry, opcode, bytes, infix }));
    }
    Ok(None)
}

/// Matches the opcode at the reader against every enabled page.
///
/// On success the reader sits after the opcode; on failure it is back where
/// it started.
pub fn search_by_opcode<A: Architecture + ?Sized, R: ByteReader + ?Sized>(
    arch: &A,
    reader: &mut R,
) -> std::result::Result<Found<A::Mode>, ErrorKind> {
    let start = reader.offset();
    for page in arch.table().pages() {
        if !arch.page_enabled(page) {
            continue;
        }
        reader.seek(start);
        if let Ok(Some(found)) = try_page(arch, page, reader) {
            tracing::trace!(name = found.entry.name, opcode = found.opcode, "decoded");
            return Ok(found);
        }
    }
    reader.seek(start);
    Err(ErrorKind::UnknownInstruction)
}
