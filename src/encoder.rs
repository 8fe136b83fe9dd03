use num_traits::ToPrimitive;
use serde::Serialize;

use crate::arch::{ArchOperand, Architecture, Shape, Width};
use crate::error::{Error, ErrorKind, Result};
use crate::insn::{fits_signed, fits_unsigned, Insn, Stage};
use crate::instructions::{Entry, Size, Slot};
use crate::scanner::Scanner;
use crate::search::search_by_name;
use crate::symbols::SymbolTable;
use crate::value::ValueParser;

/// Bytes of a payload of width `w` for an entry of size class `size`.
pub fn width_bytes(w: Width, size: Size) -> std::result::Result<u8, ErrorKind> {
    match w {
        Width::Byte => Ok(1),
        Width::Word => Ok(2),
        Width::Long => Ok(4),
        Width::Sized => match size.bytes() {
            0 | 8 => Err(ErrorKind::IllegalSize),
            n => Ok(n as u8),
        },
    }
}

fn check_range(op_value: i64, undefined: bool, bits: u32, signed: bool) -> std::result::Result<(), ErrorKind> {
    let ok = undefined || if signed { fits_signed(op_value, bits) } else { fits_unsigned(op_value, bits) };
    if ok { Ok(()) } else { Err(ErrorKind::OverflowRange) }
}

/// Encodes `op` into `insn` the generic way for its slot's shape.
pub fn emit_operand<A: Architecture + ?Sized>(
    arch: &A,
    insn: &mut Insn,
    entry: &Entry<A::Mode>,
    slot: &Slot<A::Mode>,
    op: &ArchOperand<A>,
) -> Result<()> {
    let at = op.at;
    let err = |k: ErrorKind| k.at(at);
    match arch.shape(slot.mode) {
        Shape::Implied => {}
        Shape::Register => {
            let field = arch.register_field(slot.mode, op).map_err(err)?;
            insn.embed(field, slot.pos, slot.width);
        }
        Shape::Embedded { signed } => {
            check_range(op.value, op.undefined, slot.width as u32, signed).map_err(err)?;
            insn.embed(op.value as u32, slot.pos, slot.width);
        }
        Shape::Bit => {
            if !op.undefined && !fits_unsigned(op.value, slot.width as u32) {
                return Err(err(ErrorKind::IllegalBitNumber));
            }
            insn.embed(op.value as u32, slot.pos, slot.width);
        }
        Shape::Immediate(w) => {
            let n = width_bytes(w, entry.size).map_err(err)?;
            let bits = n as u32 * 8;
            if !op.undefined && !fits_signed(op.value, bits) && !fits_unsigned(op.value, bits) {
                insn.emit(Stage::Payload, 0, n, at);
                return Err(err(ErrorKind::OverflowRange));
            }
            insn.emit(Stage::Payload, op.value as u32, n, at);
        }
        Shape::Absolute(w) => {
            let n = width_bytes(w, entry.size).map_err(err)?;
            let bits = (n as u32 * 8).min(insn.config().address_bits as u32);
            let addr = if op.undefined { Some(0) } else { op.value.to_u32().filter(|&a| bits >= 32 || a >> bits == 0) };
            insn.emit(Stage::Payload, addr.unwrap_or(0), n, at);
            if addr.is_none() {
                return Err(err(ErrorKind::OverflowRange));
            }
        }
        Shape::Relative(w) => {
            let n = width_bytes(w, entry.size).map_err(err)?;
            insn.emit_relative(Stage::Payload, op.value, n, op.undefined, at);
        }
        Shape::Indexed { disp, signed } => {
            if slot.width > 0 {
                let field = arch.register_field(slot.mode, op).map_err(err)?;
                insn.embed(field, slot.pos, slot.width);
            }
            let n = width_bytes(disp, entry.size).map_err(err)?;
            let fits = check_range(op.value, op.undefined, n as u32 * 8, signed);
            let stage = insn.disp_stage();
            insn.emit(stage, if fits.is_ok() { op.value as u32 } else { 0 }, n, at);
            fits.map_err(err)?;
        }
        Shape::Ladder { relative } => {
            insn.emit_ladder(Stage::Payload, op.value, relative, op.force, op.undefined, at);
        }
        Shape::Custom => return Err(err(ErrorKind::InternalError)),
    }
    Ok(())
}

/// Output of assembling one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assembled {
    pub address: u32,
    pub bytes: Vec<u8>,
    pub error: Option<Error>,
}

impl Assembled {
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
}

/// Line assembler for one target.
pub struct Assembler<'a, A: Architecture + ?Sized> {
    arch: &'a A,
    symbols: &'a dyn SymbolTable,
}

impl<'a, A: Architecture + ?Sized> Assembler<'a, A> {
    pub fn new(arch: &'a A, symbols: &'a dyn SymbolTable) -> Self {
        Self { arch, symbols }
    }

    /// Parses the operands of `line` after its mnemonic.
    pub fn parse_operands(&self, scan: &mut Scanner<'_>, address: u32) -> Vec<ArchOperand<A>> {
        let values = ValueParser::new(self.arch.config().dialect, self.symbols).at(address);
        let mut ops = Vec::new();
        if scan.skip_spaces().at_end() {
            return ops;
        }
        loop {
            scan.skip_spaces();
            let op = self.arch.parse_operand(scan, &values);
            let failed = op.hard_error().is_some();
            ops.push(op);
            if failed || !scan.skip_spaces().eat(',') {
                break;
            }
        }
        ops
    }

    /// Assembles one line at `address`. A bad line yields its first error;
    /// once the instruction is known, an operand that does not fit still
    /// yields full-length bytes with zeros in its place.
    pub fn assemble(&self, line: &str, address: u32) -> Assembled {
        let fail = |e: Error| Assembled { address, bytes: Vec::new(), error: Some(e) };
        let mut scan = Scanner::new(line);
        if scan.skip_spaces().at_end() {
            return Assembled { address, bytes: Vec::new(), error: None };
        }
        let name_at = scan.pos();
        let Some(name) = scan.ident() else {
            return fail(ErrorKind::UnknownInstruction.at(name_at));
        };
        let ops = self.parse_operands(&mut scan, address);
        if let Some(e) = ops.iter().find_map(|op| op.hard_error()) {
            return fail(e);
        }
        if !scan.at_end() {
            return fail(ErrorKind::GarbageAtEnd.at(scan.pos()));
        }

        let (page, entry) = match search_by_name(self.arch, name, &ops) {
            Ok(hit) => hit,
            Err(ErrorKind::UnknownInstruction) => return fail(ErrorKind::UnknownInstruction.at(name_at)),
            Err(kind) => return fail(kind.at(ops.first().map_or(name_at, |op| op.at))),
        };
        if let Err(kind) = self.arch.check(entry, &ops) {
            return fail(kind.at(ops.first().map_or(name_at, |op| op.at)));
        }

        let mut insn = Insn::new(address, *self.arch.config());
        insn.start(page, entry.opcode);
        // Operands after a failing one are still laid out so the length holds.
        let mut error = None;
        for (slot, op) in entry.slots.iter().zip(&ops) {
            if let Err(e) = self.arch.encode_operand(&mut insn, entry, slot, op) {
                error.get_or_insert(e);
            }
        }
        let (bytes, late) = insn.finish();
        let error = error.or(late).or_else(|| ops.iter().find_map(|op| op.error));
        Assembled { address, bytes, error }
    }
}
