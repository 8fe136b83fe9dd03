// Texas Instruments TMS32010.

use std::fmt;

use lazy_static::lazy_static;

use crate::arch::{ArchConfig, ArchOperand, Architecture, RelBase, Shape, Width};
use crate::decoder::{read_operand, DecodeCtx};
use crate::disasm::Formatter;
use crate::encoder;
use crate::error::{ErrorKind, Result};
use crate::insn::{fits_unsigned, Insn};
use crate::instructions::{entry, Entry, Page, Slot, Table};
use crate::memory::{Endian, Unit};
use crate::operand::Operand;
use crate::scanner::Scanner;
use crate::value::{Dialect, ValueParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    // operand forms
    Imm,
    /// `*`, `*+` or `*-`; the value is 0, 1 or 2 respectively.
    Ind,
    ArReg,
    // table categories
    Mem,
    Narp,
    Shift,
    SachShift,
    Ar,
    Port,
    K1,
    K8,
    K13,
    Arp,
    Pma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    AR0,
    AR1,
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

const INDIRECT: u32 = 0x80;
const KEEP_ARP: u32 = 0x08;
const INCREMENT: u32 = 0x20;
const DECREMENT: u32 = 0x10;
/// Indirect bits that must stay clear.
const RESERVED: u32 = 0x46;

// Optional trailing operands are spelled out as separate entries, longest
// first, so decoding always lands on the full form.
const BASE: &[Entry<Mode>] = &[
    entry!("ADD", 0x0000, [Mem @ 0:8, Shift @ 8:4, Narp]),
    entry!("ADD", 0x0000, [Mem @ 0:8, Shift @ 8:4]),
    entry!("ADD", 0x0000, [Mem @ 0:8]),
    entry!("SUB", 0x1000, [Mem @ 0:8, Shift @ 8:4, Narp]),
    entry!("SUB", 0x1000, [Mem @ 0:8, Shift @ 8:4]),
    entry!("SUB", 0x1000, [Mem @ 0:8]),
    entry!("LAC", 0x2000, [Mem @ 0:8, Shift @ 8:4, Narp]),
    entry!("LAC", 0x2000, [Mem @ 0:8, Shift @ 8:4]),
    entry!("LAC", 0x2000, [Mem @ 0:8]),
    entry!("SAR", 0x3000, [Ar @ 8:1, Mem @ 0:8, Narp]),
    entry!("SAR", 0x3000, [Ar @ 8:1, Mem @ 0:8]),
    entry!("LAR", 0x3800, [Ar @ 8:1, Mem @ 0:8, Narp]),
    entry!("LAR", 0x3800, [Ar @ 8:1, Mem @ 0:8]),
    entry!("IN", 0x4000, [Mem @ 0:8, Port @ 8:3, Narp]),
    entry!("IN", 0x4000, [Mem @ 0:8, Port @ 8:3]),
    entry!("OUT", 0x4800, [Mem @ 0:8, Port @ 8:3, Narp]),
    entry!("OUT", 0x4800, [Mem @ 0:8, Port @ 8:3]),
    entry!("SACL", 0x5000, [Mem @ 0:8, Narp]),
    entry!("SACL", 0x5000, [Mem @ 0:8]),
    entry!("SACH", 0x5800, [Mem @ 0:8, SachShift @ 8:3, Narp]),
    entry!("SACH", 0x5800, [Mem @ 0:8, SachShift @ 8:3]),
    entry!("SACH", 0x5800, [Mem @ 0:8]),
    entry!("LARP", 0x6880, [Arp @ 0:1]),
    entry!("LARK", 0x7000, [Ar @ 8:1, K8 @ 0:8]),
    entry!("LACK", 0x7E00, [K8 @ 0:8]),
    entry!("LDPK", 0x6E00, [K1 @ 0:1]),
    entry!("MPYK", 0x8000, [K13 @ 0:13]),
    entry!("NOP", 0x7F80),
    entry!("DINT", 0x7F81),
    entry!("EINT", 0x7F82),
    entry!("ABS", 0x7F88),
    entry!("ZAC", 0x7F89),
    entry!("ROVM", 0x7F8A),
    entry!("SOVM", 0x7F8B),
    entry!("CALA", 0x7F8C),
    entry!("RET", 0x7F8D),
    entry!("PAC", 0x7F8E),
    entry!("APAC", 0x7F8F),
    entry!("SPAC", 0x7F90),
    entry!("PUSH", 0x7F9C),
    entry!("POP", 0x7F9D),
    entry!("BANZ", 0xF400, [Pma]),
    entry!("BV", 0xF500, [Pma]),
    entry!("BIOZ", 0xF600, [Pma]),
    entry!("CALL", 0xF800, [Pma]),
    entry!("B", 0xF900, [Pma]),
    entry!("BLZ", 0xFA00, [Pma]),
    entry!("BLEZ", 0xFB00, [Pma]),
    entry!("BGZ", 0xFC00, [Pma]),
    entry!("BGEZ", 0xFD00, [Pma]),
    entry!("BNZ", 0xFE00, [Pma]),
    entry!("BZ", 0xFF00, [Pma]),
];

macro_rules! memory_ops {
    ($($name:literal = $opcode:expr),* $(,)?) => {
        &[$(
            entry!($name, $opcode, [Mem @ 0:8, Narp]),
            entry!($name, $opcode, [Mem @ 0:8]),
        )*]
    };
}

const MEMORY: &[Entry<Mode>] = memory_ops![
    "ADDH" = 0x6000,
    "ADDS" = 0x6100,
    "SUBH" = 0x6200,
    "SUBS" = 0x6300,
    "SUBC" = 0x6400,
    "ZALH" = 0x6500,
    "ZALS" = 0x6600,
    "TBLR" = 0x6700,
    "MAR" = 0x6800,
    "DMOV" = 0x6900,
    "LT" = 0x6A00,
    "LTD" = 0x6B00,
    "LTA" = 0x6C00,
    "MPY" = 0x6D00,
    "LDP" = 0x6F00,
    "XOR" = 0x7800,
    "AND" = 0x7900,
    "OR" = 0x7A00,
    "LST" = 0x7B00,
    "SST" = 0x7C00,
    "TBLW" = 0x7D00,
];

// LARP is MAR with a fixed indirect operand, so BASE is searched first.
static PAGES: &[Page<Mode>] = &[Page::new(BASE), Page::new(MEMORY)];

lazy_static! {
    static ref TABLE: Table<Mode> = Table::new(PAGES);
}

const CONFIG: ArchConfig = ArchConfig {
    dialect: Dialect::Texas,
    endian: Endian::Big,
    unit: Unit::Word,
    address_bits: 12,
    rel_base: RelBase::End,
    ladder: None,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Tms32010;

impl Tms32010 {
    pub fn new() -> Self {
        Tms32010
    }
}

fn indirect_code(op: &ArchOperand<Tms32010>) -> u32 {
    let step = match op.value {
        1 => INCREMENT,
        2 => DECREMENT,
        _ => 0,
    };
    INDIRECT | KEEP_ARP | step
}

impl Architecture for Tms32010 {
    type Mode = Mode;
    type Reg = Reg;

    fn name(&self) -> &'static str {
        "tms32010"
    }

    fn config(&self) -> &ArchConfig {
        &CONFIG
    }

    fn table(&self) -> &Table<Mode> {
        &TABLE
    }

    fn accepts(&self, category: Mode, mode: Mode) -> bool {
        match category {
            Mode::Mem => matches!(mode, Mode::Imm | Mode::Ind),
            Mode::Ar => mode == Mode::ArReg,
            Mode::Narp | Mode::Shift | Mode::SachShift | Mode::Port | Mode::K1 | Mode::K8 | Mode::K13 | Mode::Arp | Mode::Pma => {
                mode == Mode::Imm
            }
            _ => false,
        }
    }

    fn shape(&self, category: Mode) -> Shape {
        match category {
            Mode::Mem | Mode::Narp | Mode::SachShift => Shape::Custom,
            Mode::Ar => Shape::Register,
            Mode::Shift | Mode::Port | Mode::K1 | Mode::K8 | Mode::Arp => Shape::Embedded { signed: false },
            Mode::K13 => Shape::Embedded { signed: true },
            Mode::Pma => Shape::Absolute(Width::Word),
            _ => Shape::Implied,
        }
    }

    fn parse_operand(&self, scan: &mut Scanner<'_>, values: &ValueParser<'_>) -> ArchOperand<Self> {
        let at = scan.pos();
        if scan.eat('*') {
            let step = if scan.eat('+') {
                1
            } else if scan.eat('-') {
                2
            } else {
                0
            };
            return Operand::new(Mode::Ind, at).with_num(step);
        }
        if let Some(id) = scan.peek_ident() {
            let upper = id.to_ascii_uppercase();
            if let Some(n) = upper.strip_prefix("AR").filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())) {
                scan.ident();
                let op = Operand::new(Mode::ArReg, at);
                return match n {
                    "0" => op.with_reg(Reg::AR0),
                    "1" => op.with_reg(Reg::AR1),
                    _ => op.failed(ErrorKind::RegisterNotAllowed.at(at)),
                };
            }
        }
        match values.parse(scan) {
            Ok(v) => Operand::new(Mode::Imm, at).with_value(v),
            Err(e) => Operand::new(Mode::Imm, at).failed(e),
        }
    }

    fn register_field(&self, _category: Mode, op: &ArchOperand<Self>) -> std::result::Result<u32, ErrorKind> {
        match op.reg {
            Some(Reg::AR0) => Ok(0),
            Some(Reg::AR1) => Ok(1),
            None => Err(ErrorKind::RegisterNotAllowed),
        }
    }

    fn register_operand(&self, _category: Mode, field: u32) -> Option<ArchOperand<Self>> {
        let reg = if field & 1 == 0 { Reg::AR0 } else { Reg::AR1 };
        Some(Operand::new(Mode::ArReg, 0).with_reg(reg))
    }

    fn check(&self, entry: &Entry<Mode>, ops: &[ArchOperand<Self>]) -> std::result::Result<(), ErrorKind> {
        // A next-ARP operand only exists for indirect addressing.
        let narp = entry.slots.iter().any(|s| s.mode == Mode::Narp);
        if narp && !ops.iter().any(|op| op.mode == Mode::Ind) {
            return Err(ErrorKind::OperandNotAllowed);
        }
        Ok(())
    }

    fn encode_operand(&self, insn: &mut Insn, entry: &Entry<Mode>, slot: &Slot<Mode>, op: &ArchOperand<Self>) -> Result<()> {
        match slot.mode {
            Mode::Mem if op.mode == Mode::Ind => insn.embed(indirect_code(op), slot.pos, slot.width),
            Mode::Mem => {
                if !op.undefined && !fits_unsigned(op.value, 7) {
                    return Err(ErrorKind::OverflowRange.at(op.at));
                }
                insn.embed(op.value as u32, slot.pos, 7);
            }
            Mode::Narp => {
                if !fits_unsigned(op.value, 1) {
                    return Err(ErrorKind::OverflowRange.at(op.at));
                }
                insn.set_opcode((insn.opcode() & !KEEP_ARP) | op.value as u32);
            }
            Mode::SachShift => match op.value {
                0 | 1 | 4 => insn.embed(op.value as u32, slot.pos, slot.width),
                _ => return Err(ErrorKind::IllegalConstant.at(op.at)),
            },
            _ => return encoder::emit_operand(self, insn, entry, slot, op),
        }
        Ok(())
    }

    fn decode_operand(&self, ctx: &mut DecodeCtx<'_>, entry: &Entry<Mode>, slot: &Slot<Mode>) -> Option<ArchOperand<Self>> {
        let mem = ctx.opcode() & 0xFF;
        match slot.mode {
            Mode::Mem if mem & INDIRECT == 0 => Some(Operand::new(Mode::Imm, 0).with_num(mem as i64)),
            Mode::Mem => {
                // The next-ARP bit only counts when ARP is not kept.
                if mem & RESERVED != 0 || (mem & KEEP_ARP != 0 && mem & 1 != 0) {
                    ctx.set_error(ErrorKind::UnknownOperand);
                    return None;
                }
                let step = match mem & (INCREMENT | DECREMENT) {
                    0 => 0,
                    INCREMENT => 1,
                    DECREMENT => 2,
                    _ => {
                        ctx.set_error(ErrorKind::UnknownOperand);
                        return None;
                    }
                };
                Some(Operand::new(Mode::Ind, 0).with_num(step))
            }
            Mode::Narp if mem & INDIRECT != 0 && mem & KEEP_ARP == 0 => Some(Operand::new(Mode::Narp, 0).with_num((mem & 1) as i64)),
            Mode::Narp => None,
            Mode::SachShift => match ctx.field(slot) {
                s @ (0 | 1 | 4) => Some(Operand::new(Mode::SachShift, 0).with_num(s as i64)),
                _ => {
                    ctx.set_error(ErrorKind::IllegalConstant);
                    None
                }
            },
            _ => read_operand(self, ctx, entry, slot),
        }
    }

    // A zero shift is only written when a next-ARP operand follows it.
    fn decode_operands(&self, ctx: &mut DecodeCtx<'_>, entry: &Entry<Mode>) -> Vec<ArchOperand<Self>> {
        let mut ops: Vec<_> = entry.slots.iter().filter_map(|slot| self.decode_operand(ctx, entry, slot)).collect();
        if !ops.iter().any(|op| op.mode == Mode::Narp) {
            ops.retain(|op| !(matches!(op.mode, Mode::Shift | Mode::SachShift) && op.value == 0));
        }
        ops
    }

    fn format_operand(&self, op: &ArchOperand<Self>, fmt: &Formatter<'_>) -> String {
        match op.mode {
            Mode::Ind => ["*", "*+", "*-"][op.value as usize % 3].to_string(),
            Mode::ArReg | Mode::Ar => op.reg.map_or_else(String::new, |r| fmt.case(&r.to_string())),
            Mode::Pma => fmt.address(op.value as u32),
            Mode::Narp | Mode::Shift | Mode::SachShift | Mode::Port | Mode::K1 | Mode::Arp => op.value.to_string(),
            _ => fmt.num(op.value),
        }
    }
}
