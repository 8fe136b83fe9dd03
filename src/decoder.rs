use std::fmt;

use serde::Serialize;

use crate::arch::{ArchConfig, ArchOperand, Architecture, RelBase, Shape};
use crate::disasm::{Formatter, Options};
use crate::encoder::width_bytes;
use crate::error::{Error, ErrorKind};
use crate::instructions::{Entry, Slot};
use crate::memory::{ByteReader, Endian};
use crate::search::{read_unit, search_by_opcode, Found};
use crate::symbols::SymbolTable;

pub(crate) fn sign_ext(v: u32, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return v as i64;
    }
    let s = 64 - bits;
    ((v as i64) << s) >> s
}

/// Decoding state for one instruction. Reads past the end of input record
/// `NoMemory` and yield zeros so operand decoding always completes.
pub struct DecodeCtx<'r> {
    reader: &'r mut dyn ByteReader,
    config: ArchConfig,
    address: u32,
    opcode: u32,
    infix: Vec<u8>,
    bytes: Vec<u8>,
    error: Option<Error>,
}

impl<'r> DecodeCtx<'r> {
    pub fn new(reader: &'r mut dyn ByteReader, config: ArchConfig, address: u32, opcode: u32, bytes: Vec<u8>) -> Self {
        Self { reader, config, address, opcode, infix: Vec::new(), bytes, error: None }
    }

    pub fn with_infix(mut self, infix: Vec<u8>) -> Self {
        self.infix = infix;
        self
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn opcode(&self) -> u32 {
        self.opcode
    }

    pub fn config(&self) -> &ArchConfig {
        &self.config
    }

    /// Bits of the opcode under `slot`.
    pub fn field<M>(&self, slot: &Slot<M>) -> u32 {
        (self.opcode & slot.mask()) >> slot.pos
    }

    /// Units consumed so far.
    pub fn consumed(&self) -> u32 {
        (self.bytes.len() / self.config.unit.bytes()) as u32
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn error(&self) -> Option<Error> {
        self.error
    }

    /// Records `kind` unless an earlier error is already recorded.
    pub fn set_error(&mut self, kind: ErrorKind) {
        let at = self.bytes.len();
        self.error.get_or_insert(Error::new(kind, at));
    }

    fn byte(&mut self) -> u8 {
        match self.reader.read_u8() {
            Ok(b) => {
                self.bytes.push(b);
                b
            }
            Err(e) => {
                self.set_error(e.kind);
                0
            }
        }
    }

    pub fn read_endian(&mut self, n: u8, endian: Endian) -> u32 {
        let mut v = 0u32;
        for i in 0..n as u32 {
            let b = self.byte() as u32;
            v = match endian {
                Endian::Big => (v << 8) | b,
                Endian::Little => v | b << (8 * i),
            };
        }
        v
    }

    pub fn read(&mut self, n: u8) -> u32 {
        self.read_endian(n, self.config.endian)
    }

    /// Next unit after what has been read, without consuming it.
    pub fn peek_unit(&mut self) -> Option<u32> {
        let mark = self.reader.offset();
        let u = read_unit(&mut *self.reader, &self.config, &mut Vec::new()).ok();
        self.reader.seek(mark);
        u
    }

    /// Reads a displacement, taking it from the infix bytes first.
    pub fn read_disp(&mut self, n: u8) -> u32 {
        if self.infix.len() >= n as usize {
            let taken: Vec<u8> = self.infix.drain(..n as usize).collect();
            return match self.config.endian {
                Endian::Big => taken.iter().fold(0, |v, &b| (v << 8) | b as u32),
                Endian::Little => taken.iter().rev().fold(0, |v, &b| (v << 8) | b as u32),
            };
        }
        self.read(n)
    }

    /// Reads a ladder-encoded displacement.
    pub fn read_ladder(&mut self) -> i64 {
        let steps = self.config.ladder.unwrap_or(&[]);
        let first = match self.reader.read_u8() {
            Ok(b) => b,
            Err(e) => {
                self.set_error(e.kind);
                return 0;
            }
        };
        let Some(step) = steps.iter().find(|s| first >> (8 - s.tag_bits) == s.tag) else {
            self.bytes.push(first);
            self.set_error(ErrorKind::IllegalConstant);
            return 0;
        };
        self.bytes.push(first);
        let mut raw = first as u64;
        for _ in 1..step.bytes {
            raw = (raw << 8) | self.byte() as u64;
        }
        let bits = step.bytes as u32 * 8 - step.tag_bits as u32;
        let v = sign_ext((raw & ((1u64 << bits) - 1)) as u32, bits);
        if v < step.min {
            self.set_error(ErrorKind::IllegalConstant);
        }
        v
    }

    /// Base a PC-relative displacement is added to, as of now.
    pub fn rel_base(&self) -> i64 {
        match self.config.rel_base {
            RelBase::Start => self.address as i64,
            RelBase::End => self.address as i64 + self.consumed() as i64,
        }
    }

    /// Wraps `v` into the target's address space.
    pub fn wrap(&self, v: i64) -> i64 {
        let bits = self.config.address_bits as u32;
        if bits >= 32 { v & 0xFFFF_FFFF } else { v & ((1i64 << bits) - 1) }
    }
}

/// Decodes the operand in `slot` the generic way for its shape.
pub fn read_operand<A: Architecture + ?Sized>(
    arch: &A,
    ctx: &mut DecodeCtx<'_>,
    entry: &Entry<A::Mode>,
    slot: &Slot<A::Mode>,
) -> Option<ArchOperand<A>> {
    let at = ctx.bytes().len();
    let op = ArchOperand::<A>::new(slot.mode, at);
    let n = |w| match width_bytes(w, entry.size) {
        Ok(n) => Some(n),
        Err(_) => None,
    };
    match arch.shape(slot.mode) {
        Shape::Implied => Some(op),
        Shape::Register => {
            let field = ctx.field(slot);
            let decoded = arch.register_operand(slot.mode, field);
            if decoded.is_none() {
                ctx.set_error(ErrorKind::UnknownOperand);
            }
            decoded
        }
        Shape::Embedded { signed } => {
            let field = ctx.field(slot);
            let v = if signed { sign_ext(field, slot.width as u32) } else { field as i64 };
            Some(op.with_num(v))
        }
        Shape::Bit => Some(op.with_num(ctx.field(slot) as i64)),
        Shape::Immediate(w) | Shape::Absolute(w) => {
            let Some(n) = n(w) else {
                ctx.set_error(ErrorKind::IllegalSize);
                return None;
            };
            Some(op.with_num(ctx.read(n) as i64))
        }
        Shape::Relative(w) => {
            let n = n(w)?;
            let delta = sign_ext(ctx.read(n), n as u32 * 8);
            let target = ctx.wrap(ctx.rel_base() + delta);
            Some(op.with_num(target))
        }
        Shape::Indexed { disp, signed } => {
            let mut op = op;
            if slot.width > 0 {
                match arch.register_operand(slot.mode, ctx.field(slot)) {
                    Some(r) => op.reg = r.reg,
                    None => ctx.set_error(ErrorKind::UnknownOperand),
                }
            }
            let n = n(disp)?;
            let raw = ctx.read_disp(n);
            let v = if signed { sign_ext(raw, n as u32 * 8) } else { raw as i64 };
            Some(op.with_num(v))
        }
        Shape::Ladder { relative } => {
            let disp = ctx.read_ladder();
            let v = if relative { ctx.wrap(ctx.rel_base() + disp) } else { disp };
            Some(op.with_num(v))
        }
        Shape::Custom => {
            ctx.set_error(ErrorKind::InternalError);
            None
        }
    }
}

/// One decoded instruction, or the unit that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoded {
    pub address: u32,
    pub bytes: Vec<u8>,
    pub mnemonic: String,
    pub operands: Vec<String>,
    pub error: Option<Error>,
}

impl Decoded {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.map(|e| e.kind)
    }

    /// Mnemonic and operands as one line of source.
    pub fn text(&self) -> String {
        if self.operands.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, self.operands.join(","))
        }
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Instruction decoder for one target.
pub struct Disassembler<'a, A: Architecture + ?Sized> {
    arch: &'a A,
    symbols: &'a dyn SymbolTable,
    options: Options,
}

impl<'a, A: Architecture + ?Sized> Disassembler<'a, A> {
    pub fn new(arch: &'a A, symbols: &'a dyn SymbolTable) -> Self {
        Self { arch, symbols, options: Options::default() }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Decodes the instruction at the reader. An unknown opcode consumes
    /// exactly one unit.
    pub fn decode(&self, reader: &mut dyn ByteReader) -> Decoded {
        let config = *self.arch.config();
        let address = reader.address();
        let start = reader.offset();
        let found: Found<A::Mode> = match search_by_opcode(self.arch, reader) {
            Ok(found) => found,
            Err(kind) => {
                reader.seek(start);
                let mut bytes = Vec::new();
                let kind = match read_unit(reader, &config, &mut bytes) {
                    Ok(_) => kind,
                    Err(e) => e.kind,
                };
                tracing::debug!(address, ?kind, "undecodable unit");
                return Decoded { address, bytes, mnemonic: String::new(), operands: Vec::new(), error: Some(Error::new(kind, 0)) };
            }
        };

        let entry = found.entry;
        let mut ctx = DecodeCtx::new(reader, config, address, found.opcode, found.bytes).with_infix(found.infix);
        let ops = self.arch.decode_operands(&mut ctx, entry);
        let fmt = Formatter::new(self.arch.config(), self.symbols, self.options, address);
        Decoded {
            address,
            mnemonic: self.arch.format_mnemonic(entry, &fmt),
            operands: ops.iter().map(|op| self.arch.format_operand(op, &fmt)).collect(),
            error: ctx.error(),
            bytes: ctx.bytes.clone(),
        }
    }

    /// Decodes until the reader is exhausted.
    pub fn decode_all(&self, reader: &mut dyn ByteReader) -> Vec<Decoded> {
        let mut out = Vec::new();
        while reader.has_next() {
            out.push(self.decode(reader));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extension() {
        assert_eq!(sign_ext(0xFE, 8), -2);
        assert_eq!(sign_ext(0x7F, 8), 127);
        assert_eq!(sign_ext(0x8, 4), -8);
        assert_eq!(sign_ext(0x3FFF, 14), -1);
    }
}
