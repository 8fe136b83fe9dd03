// Zilog Z80.

use std::fmt;

use lazy_static::lazy_static;

use crate::arch::{ArchConfig, ArchOperand, Architecture, RelBase, Shape, Width};
use crate::decoder::{read_operand, DecodeCtx};
use crate::disasm::Formatter;
use crate::encoder;
use crate::error::{ErrorKind, Result};
use crate::insn::Insn;
use crate::instructions::{entry, Entry, Page, Slot, Table};
use crate::memory::{Endian, Unit};
use crate::operand::Operand;
use crate::scanner::Scanner;
use crate::value::{Dialect, ValueParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    // registers and conditions as written
    RegA,
    RegC,
    R8,
    RegI,
    RegR,
    RegBc,
    RegDe,
    RegHl,
    RegSp,
    RegAf,
    AfAlt,
    RegIx,
    RegIy,
    Cc,
    // memory forms as written
    IndHl,
    IndBc,
    IndDe,
    IndSp,
    IndC,
    IndAbs,
    IndIx,
    IndIy,
    Imm,
    // table categories
    Reg8,
    Reg8M,
    Pair,
    PairAf,
    PairIx,
    PairIy,
    A,
    Hl,
    De,
    Sp,
    Af,
    AfP,
    I,
    R,
    Ix,
    Iy,
    MemHl,
    MemBc,
    MemDe,
    MemSp,
    MemC,
    JpIx,
    JpIy,
    Abs16,
    Port,
    IdxIx,
    IdxIy,
    Imm8,
    Imm16,
    Addr,
    Rel,
    Bit,
    Rst,
    ImMode,
    Cond,
    CondJr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    B, C, D, E, H, L, A, I, R,
    BC, DE, HL, SP, AF, AFp, IX, IY,
    NZ, Z, NC, PO, PE, P, M,
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::AFp => f.write_str("AF'"),
            r => write!(f, "{r:?}"),
        }
    }
}

/// Names tried by the operand parser, longest spellings first.
const REGISTERS: &[(&str, Reg, Mode)] = &[
    ("AF", Reg::AF, Mode::RegAf),
    ("BC", Reg::BC, Mode::RegBc),
    ("DE", Reg::DE, Mode::RegDe),
    ("HL", Reg::HL, Mode::RegHl),
    ("SP", Reg::SP, Mode::RegSp),
    ("IX", Reg::IX, Mode::RegIx),
    ("IY", Reg::IY, Mode::RegIy),
    ("NZ", Reg::NZ, Mode::Cc),
    ("NC", Reg::NC, Mode::Cc),
    ("PO", Reg::PO, Mode::Cc),
    ("PE", Reg::PE, Mode::Cc),
    ("A", Reg::A, Mode::RegA),
    ("B", Reg::B, Mode::R8),
    ("C", Reg::C, Mode::RegC),
    ("D", Reg::D, Mode::R8),
    ("E", Reg::E, Mode::R8),
    ("H", Reg::H, Mode::R8),
    ("L", Reg::L, Mode::R8),
    ("I", Reg::I, Mode::RegI),
    ("R", Reg::R, Mode::RegR),
    ("Z", Reg::Z, Mode::Cc),
    ("P", Reg::P, Mode::Cc),
    ("M", Reg::M, Mode::Cc),
];

// Field 6 is (HL).
const R8: [Option<Reg>; 8] = [Some(Reg::B), Some(Reg::C), Some(Reg::D), Some(Reg::E), Some(Reg::H), Some(Reg::L), None, Some(Reg::A)];
const CONDS: [Reg; 8] = [Reg::NZ, Reg::Z, Reg::NC, Reg::C, Reg::PO, Reg::PE, Reg::P, Reg::M];

const MAIN: &[Entry<Mode>] = &[
    entry!("NOP", 0x00),
    entry!("LD", 0x01, [Pair @ 4:2, Imm16]),
    entry!("LD", 0x02, [MemBc, A]),
    entry!("LD", 0x12, [MemDe, A]),
    entry!("LD", 0x0A, [A, MemBc]),
    entry!("LD", 0x1A, [A, MemDe]),
    entry!("LD", 0x22, [Abs16, Hl]),
    entry!("LD", 0x2A, [Hl, Abs16]),
    entry!("LD", 0x32, [Abs16, A]),
    entry!("LD", 0x3A, [A, Abs16]),
    entry!("LD", 0x06, [Reg8M @ 3:3, Imm8]),
    entry!("LD", 0xF9, [Sp, Hl]),
    entry!("HALT", 0x76),
    entry!("LD", 0x40, [Reg8M @ 3:3, Reg8M @ 0:3]),
    entry!("INC", 0x03, [Pair @ 4:2]),
    entry!("DEC", 0x0B, [Pair @ 4:2]),
    entry!("INC", 0x04, [Reg8M @ 3:3]),
    entry!("DEC", 0x05, [Reg8M @ 3:3]),
    entry!("RLCA", 0x07), entry!("RRCA", 0x0F), entry!("RLA", 0x17), entry!("RRA", 0x1F),
    entry!("DAA", 0x27), entry!("CPL", 0x2F), entry!("SCF", 0x37), entry!("CCF", 0x3F),
    entry!("EX", 0x08, [Af, AfP]),
    entry!("ADD", 0x09, [Hl, Pair @ 4:2]),
    entry!("DJNZ", 0x10, [Rel]),
    entry!("JR", 0x18, [Rel]),
    entry!("JR", 0x20, [CondJr @ 3:2, Rel]),
    entry!("ADD", 0x80, [A, Reg8M @ 0:3]),
    entry!("ADC", 0x88, [A, Reg8M @ 0:3]),
    entry!("SUB", 0x90, [Reg8M @ 0:3]),
    entry!("SBC", 0x98, [A, Reg8M @ 0:3]),
    entry!("AND", 0xA0, [Reg8M @ 0:3]),
    entry!("XOR", 0xA8, [Reg8M @ 0:3]),
    entry!("OR", 0xB0, [Reg8M @ 0:3]),
    entry!("CP", 0xB8, [Reg8M @ 0:3]),
    entry!("ADD", 0xC6, [A, Imm8]),
    entry!("ADC", 0xCE, [A, Imm8]),
    entry!("SUB", 0xD6, [Imm8]),
    entry!("SBC", 0xDE, [A, Imm8]),
    entry!("AND", 0xE6, [Imm8]),
    entry!("XOR", 0xEE, [Imm8]),
    entry!("OR", 0xF6, [Imm8]),
    entry!("CP", 0xFE, [Imm8]),
    entry!("RET", 0xC9),
    entry!("RET", 0xC0, [Cond @ 3:3]),
    entry!("JP", 0xC3, [Addr]),
    entry!("JP", 0xC2, [Cond @ 3:3, Addr]),
    entry!("CALL", 0xCD, [Addr]),
    entry!("CALL", 0xC4, [Cond @ 3:3, Addr]),
    entry!("POP", 0xC1, [PairAf @ 4:2]),
    entry!("PUSH", 0xC5, [PairAf @ 4:2]),
    entry!("RST", 0xC7, [Rst @ 3:3]),
    entry!("OUT", 0xD3, [Port, A]),
    entry!("IN", 0xDB, [A, Port]),
    entry!("EXX", 0xD9),
    entry!("EX", 0xE3, [MemSp, Hl]),
    entry!("JP", 0xE9, [MemHl]),
    entry!("EX", 0xEB, [De, Hl]),
    entry!("DI", 0xF3),
    entry!("EI", 0xFB),
];

const CB: &[Entry<Mode>] = &[
    entry!("RLC", 0x00, [Reg8M @ 0:3]),
    entry!("RRC", 0x08, [Reg8M @ 0:3]),
    entry!("RL", 0x10, [Reg8M @ 0:3]),
    entry!("RR", 0x18, [Reg8M @ 0:3]),
    entry!("SLA", 0x20, [Reg8M @ 0:3]),
    entry!("SRA", 0x28, [Reg8M @ 0:3]),
    entry!("SRL", 0x38, [Reg8M @ 0:3]),
    entry!("BIT", 0x40, [Bit @ 3:3, Reg8M @ 0:3]),
    entry!("RES", 0x80, [Bit @ 3:3, Reg8M @ 0:3]),
    entry!("SET", 0xC0, [Bit @ 3:3, Reg8M @ 0:3]),
];

const ED: &[Entry<Mode>] = &[
    entry!("IN", 0x40, [Reg8 @ 3:3, MemC]),
    entry!("OUT", 0x41, [MemC, Reg8 @ 3:3]),
    entry!("SBC", 0x42, [Hl, Pair @ 4:2]),
    entry!("ADC", 0x4A, [Hl, Pair @ 4:2]),
    entry!("LD", 0x43, [Abs16, Pair @ 4:2]),
    entry!("LD", 0x4B, [Pair @ 4:2, Abs16]),
    entry!("NEG", 0x44),
    entry!("RETN", 0x45),
    entry!("RETI", 0x4D),
    entry!("IM", 0x46, [ImMode @ 3:2]),
    entry!("LD", 0x47, [I, A]),
    entry!("LD", 0x4F, [R, A]),
    entry!("LD", 0x57, [A, I]),
    entry!("LD", 0x5F, [A, R]),
    entry!("RRD", 0x67), entry!("RLD", 0x6F),
    entry!("LDI", 0xA0), entry!("CPI", 0xA1), entry!("INI", 0xA2), entry!("OUTI", 0xA3),
    entry!("LDD", 0xA8), entry!("CPD", 0xA9), entry!("IND", 0xAA), entry!("OUTD", 0xAB),
    entry!("LDIR", 0xB0), entry!("CPIR", 0xB1), entry!("INIR", 0xB2), entry!("OTIR", 0xB3),
    entry!("LDDR", 0xB8), entry!("CPDR", 0xB9), entry!("INDR", 0xBA), entry!("OTDR", 0xBB),
];

macro_rules! index_page {
    ($page:ident, $xr:ident, $idx:ident, $jp:ident, $pair:ident) => {
        const $page: &[Entry<Mode>] = &[
            entry!("ADD", 0x09, [$xr, $pair @ 4:2]),
            entry!("LD", 0x21, [$xr, Imm16]),
            entry!("LD", 0x22, [Abs16, $xr]),
            entry!("LD", 0x2A, [$xr, Abs16]),
            entry!("INC", 0x23, [$xr]),
            entry!("DEC", 0x2B, [$xr]),
            entry!("INC", 0x34, [$idx]),
            entry!("DEC", 0x35, [$idx]),
            entry!("LD", 0x36, [$idx, Imm8]),
            entry!("LD", 0x46, [Reg8 @ 3:3, $idx]),
            entry!("LD", 0x70, [$idx, Reg8 @ 0:3]),
            entry!("ADD", 0x86, [A, $idx]),
            entry!("ADC", 0x8E, [A, $idx]),
            entry!("SUB", 0x96, [$idx]),
            entry!("SBC", 0x9E, [A, $idx]),
            entry!("AND", 0xA6, [$idx]),
            entry!("XOR", 0xAE, [$idx]),
            entry!("OR", 0xB6, [$idx]),
            entry!("CP", 0xBE, [$idx]),
            entry!("POP", 0xE1, [$xr]),
            entry!("EX", 0xE3, [MemSp, $xr]),
            entry!("PUSH", 0xE5, [$xr]),
            entry!("JP", 0xE9, [$jp]),
            entry!("LD", 0xF9, [Sp, $xr]),
        ];
    };
}

macro_rules! index_bit_page {
    ($page:ident, $idx:ident) => {
        const $page: &[Entry<Mode>] = &[
            entry!("RLC", 0x06, [$idx]),
            entry!("RRC", 0x0E, [$idx]),
            entry!("RL", 0x16, [$idx]),
            entry!("RR", 0x1E, [$idx]),
            entry!("SLA", 0x26, [$idx]),
            entry!("SRA", 0x2E, [$idx]),
            entry!("SRL", 0x3E, [$idx]),
            entry!("BIT", 0x46, [Bit @ 3:3, $idx]),
            entry!("RES", 0x86, [Bit @ 3:3, $idx]),
            entry!("SET", 0xC6, [Bit @ 3:3, $idx]),
        ];
    };
}

index_page!(DD, Ix, IdxIx, JpIx, PairIx);
index_page!(FD, Iy, IdxIy, JpIy, PairIy);
index_bit_page!(DDCB, IdxIx);
index_bit_page!(FDCB, IdxIy);

static PAGES: &[Page<Mode>] = &[
    Page::new(MAIN),
    Page::new(CB).prefix(&[0xCB]),
    Page::new(ED).prefix(&[0xED]),
    Page::new(DD).prefix(&[0xDD]),
    Page::new(FD).prefix(&[0xFD]),
    Page::new(DDCB).prefix(&[0xDD, 0xCB]).infix(1),
    Page::new(FDCB).prefix(&[0xFD, 0xCB]).infix(1),
];

lazy_static! {
    static ref TABLE: Table<Mode> = Table::new(PAGES);
}

const CONFIG: ArchConfig = ArchConfig {
    dialect: Dialect::Intel,
    endian: Endian::Little,
    unit: Unit::Byte,
    address_bits: 16,
    rel_base: RelBase::End,
    ladder: None,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Z80;

impl Z80 {
    pub fn new() -> Self {
        Z80
    }
}

fn register(scan: &mut Scanner<'_>) -> Option<(Reg, Mode)> {
    for &(name, reg, mode) in REGISTERS {
        if scan.eat_word(name) {
            if reg == Reg::AF && scan.eat('\'') {
                return Some((Reg::AFp, Mode::AfAlt));
            }
            return Some((reg, mode));
        }
    }
    None
}

fn operand_mode(reg: Reg) -> Mode {
    REGISTERS.iter().find(|r| r.1 == reg).map_or(Mode::R8, |r| r.2)
}

impl Z80 {
    fn parse_indirect(&self, scan: &mut Scanner<'_>, values: &ValueParser<'_>, at: usize) -> ArchOperand<Self> {
        scan.skip_spaces();
        let save = scan.pos();
        let simple = match register(scan) {
            Some((Reg::HL, _)) => Some(Mode::IndHl),
            Some((Reg::BC, _)) => Some(Mode::IndBc),
            Some((Reg::DE, _)) => Some(Mode::IndDe),
            Some((Reg::SP, _)) => Some(Mode::IndSp),
            Some((Reg::C, _)) => Some(Mode::IndC),
            Some((r @ (Reg::IX | Reg::IY), _)) => {
                let mode = if r == Reg::IX { Mode::IndIx } else { Mode::IndIy };
                let mut op = Operand::new(mode, at).with_reg(r);
                if matches!(scan.skip_spaces().peek(), Some('+' | '-')) {
                    match values.parse(scan) {
                        Ok(v) => op = op.with_value(v),
                        Err(e) => return op.failed(e),
                    }
                }
                if !scan.skip_spaces().eat(')') {
                    return op.failed(ErrorKind::MissingClosingParen.at(scan.pos()));
                }
                return op;
            }
            Some(_) => return Operand::new(Mode::IndHl, at).failed(ErrorKind::RegisterNotAllowed.at(save)),
            None => None,
        };
        if let Some(mode) = simple {
            let op = Operand::new(mode, at);
            if !scan.skip_spaces().eat(')') {
                return op.failed(ErrorKind::MissingClosingParen.at(scan.pos()));
            }
            return op;
        }
        let op = Operand::new(Mode::IndAbs, at);
        let op = match values.parse(scan) {
            Ok(v) => op.with_value(v),
            Err(e) => return op.failed(e),
        };
        if !scan.skip_spaces().eat(')') {
            return op.failed(ErrorKind::MissingClosingParen.at(scan.pos()));
        }
        op
    }
}

impl Architecture for Z80 {
    type Mode = Mode;
    type Reg = Reg;

    fn name(&self) -> &'static str {
        "z80"
    }

    fn config(&self) -> &ArchConfig {
        &CONFIG
    }

    fn table(&self) -> &Table<Mode> {
        &TABLE
    }

    fn accepts(&self, category: Mode, mode: Mode) -> bool {
        use Mode::*;
        match category {
            Reg8 => matches!(mode, RegA | RegC | R8),
            Reg8M => matches!(mode, RegA | RegC | R8 | IndHl),
            Pair => matches!(mode, RegBc | RegDe | RegHl | RegSp),
            PairAf => matches!(mode, RegBc | RegDe | RegHl | RegAf),
            PairIx => matches!(mode, RegBc | RegDe | RegIx | RegSp),
            PairIy => matches!(mode, RegBc | RegDe | RegIy | RegSp),
            A => mode == RegA,
            Hl => mode == RegHl,
            De => mode == RegDe,
            Sp => mode == RegSp,
            Af => mode == RegAf,
            AfP => mode == AfAlt,
            I => mode == RegI,
            R => mode == RegR,
            Ix => mode == RegIx,
            Iy => mode == RegIy,
            MemHl => mode == IndHl,
            MemBc => mode == IndBc,
            MemDe => mode == IndDe,
            MemSp => mode == IndSp,
            MemC => mode == IndC,
            JpIx | IdxIx => mode == IndIx,
            JpIy | IdxIy => mode == IndIy,
            Abs16 | Port => mode == IndAbs,
            Imm8 | Imm16 | Addr | Rel | Bit | Rst | ImMode => mode == Imm,
            Cond | CondJr => matches!(mode, Cc | RegC),
            _ => false,
        }
    }

    fn shape(&self, category: Mode) -> Shape {
        use Mode::*;
        match category {
            Reg8 | Reg8M | Pair | PairAf | PairIx | PairIy | Cond | CondJr => Shape::Register,
            Abs16 | Addr => Shape::Absolute(Width::Word),
            Port => Shape::Absolute(Width::Byte),
            IdxIx | IdxIy => Shape::Indexed { disp: Width::Byte, signed: true },
            Imm8 => Shape::Immediate(Width::Byte),
            Imm16 => Shape::Immediate(Width::Word),
            Rel => Shape::Relative(Width::Byte),
            Bit => Shape::Bit,
            Rst | ImMode => Shape::Custom,
            _ => Shape::Implied,
        }
    }

    fn parse_operand(&self, scan: &mut Scanner<'_>, values: &ValueParser<'_>) -> ArchOperand<Self> {
        let at = scan.pos();
        if scan.eat('(') {
            return self.parse_indirect(scan, values, at);
        }
        if let Some((reg, mode)) = register(scan) {
            return Operand::new(mode, at).with_reg(reg);
        }
        match values.parse(scan) {
            Ok(v) => Operand::new(Mode::Imm, at).with_value(v),
            Err(e) => Operand::new(Mode::Imm, at).failed(e),
        }
    }

    fn register_field(&self, category: Mode, op: &ArchOperand<Self>) -> std::result::Result<u32, ErrorKind> {
        if op.mode == Mode::IndHl {
            return Ok(6);
        }
        let reg = op.reg.ok_or(ErrorKind::RegisterNotAllowed)?;
        let field = match category {
            Mode::Reg8 | Mode::Reg8M => R8.iter().position(|&r| r == Some(reg)),
            Mode::Cond | Mode::CondJr => CONDS.iter().position(|&r| r == reg),
            _ => match reg {
                Reg::BC => Some(0),
                Reg::DE => Some(1),
                Reg::HL | Reg::IX | Reg::IY => Some(2),
                Reg::SP | Reg::AF => Some(3),
                _ => None,
            },
        };
        let field = field.ok_or(ErrorKind::RegisterNotAllowed)? as u32;
        if category == Mode::CondJr && field > 3 {
            return Err(ErrorKind::OperandNotAllowed);
        }
        Ok(field)
    }

    fn register_operand(&self, category: Mode, field: u32) -> Option<ArchOperand<Self>> {
        let reg = match category {
            Mode::Reg8M if field == 6 => return Some(Operand::new(Mode::IndHl, 0)),
            Mode::Reg8 | Mode::Reg8M => R8[field as usize & 7]?,
            Mode::Cond | Mode::CondJr => CONDS[field as usize & 7],
            Mode::Pair | Mode::PairAf | Mode::PairIx | Mode::PairIy => match field {
                0 => Reg::BC,
                1 => Reg::DE,
                2 if category == Mode::PairIx => Reg::IX,
                2 if category == Mode::PairIy => Reg::IY,
                2 => Reg::HL,
                _ if category == Mode::PairAf => Reg::AF,
                _ => Reg::SP,
            },
            _ => return None,
        };
        let mode = if matches!(category, Mode::Cond | Mode::CondJr) { Mode::Cc } else { operand_mode(reg) };
        Some(Operand::new(mode, 0).with_reg(reg))
    }

    fn check(&self, entry: &Entry<Mode>, ops: &[ArchOperand<Self>]) -> std::result::Result<(), ErrorKind> {
        // LD (HL),(HL) would be HALT.
        if entry.name == "LD" && ops.len() == 2 && ops.iter().all(|op| op.mode == Mode::IndHl) {
            return Err(ErrorKind::OperandNotAllowed);
        }
        if entry.slots.iter().any(|s| matches!(s.mode, Mode::JpIx | Mode::JpIy)) && ops.iter().any(|op| op.value != 0) {
            return Err(ErrorKind::OperandNotAllowed);
        }
        Ok(())
    }

    fn encode_operand(&self, insn: &mut Insn, entry: &Entry<Mode>, slot: &Slot<Mode>, op: &ArchOperand<Self>) -> Result<()> {
        let field = match slot.mode {
            Mode::Rst => match op.value {
                v if op.undefined => v,
                v @ 0..=0x38 if v % 8 == 0 => v >> 3,
                _ => return Err(ErrorKind::IllegalConstant.at(op.at)),
            },
            Mode::ImMode => match op.value {
                0 => 0,
                1 => 2,
                2 => 3,
                _ => return Err(ErrorKind::IllegalConstant.at(op.at)),
            },
            _ => return encoder::emit_operand(self, insn, entry, slot, op),
        };
        insn.embed(field as u32, slot.pos, slot.width);
        Ok(())
    }

    fn decode_operand(&self, ctx: &mut DecodeCtx<'_>, entry: &Entry<Mode>, slot: &Slot<Mode>) -> Option<ArchOperand<Self>> {
        let field = ctx.field(slot) as i64;
        match slot.mode {
            Mode::Rst => Some(Operand::new(Mode::Rst, 0).with_num(field << 3)),
            Mode::ImMode => match field {
                0 => Some(Operand::new(Mode::ImMode, 0).with_num(0)),
                // ED 4E has no mnemonic of its own.
                1 => {
                    ctx.set_error(ErrorKind::IllegalConstant);
                    None
                }
                f => Some(Operand::new(Mode::ImMode, 0).with_num(f - 1)),
            },
            _ => read_operand(self, ctx, entry, slot),
        }
    }

    fn format_operand(&self, op: &ArchOperand<Self>, fmt: &Formatter<'_>) -> String {
        use Mode::*;
        let disp = |name: &str| match op.value {
            0 => format!("({})", fmt.case(name)),
            v if v < 0 => format!("({}-{})", fmt.case(name), fmt.num(-v)),
            v => format!("({}+{})", fmt.case(name), fmt.num(v)),
        };
        let fixed = match op.mode {
            IndHl | MemHl => "(HL)",
            IndBc | MemBc => "(BC)",
            IndDe | MemDe => "(DE)",
            IndSp | MemSp => "(SP)",
            IndC | MemC => "(C)",
            A => "A",
            Hl => "HL",
            De => "DE",
            Sp => "SP",
            Af => "AF",
            AfP => "AF'",
            I => "I",
            R => "R",
            Ix => "IX",
            Iy => "IY",
            IndIx | IdxIx | JpIx => return disp("IX"),
            IndIy | IdxIy | JpIy => return disp("IY"),
            IndAbs | Abs16 => return format!("({})", fmt.address(op.value as u32)),
            Port => return format!("({})", fmt.imm(op.value, 1)),
            Imm8 | Rst => return fmt.imm(op.value, 1),
            Imm16 => return fmt.imm(op.value, 2),
            Imm => return fmt.num(op.value),
            Addr => return fmt.address(op.value as u32),
            Rel => return fmt.target(op.value),
            Bit | ImMode => return op.value.to_string(),
            _ => return op.reg.map_or_else(String::new, |r| fmt.case(&r.to_string())),
        };
        fmt.case(fixed)
    }
}
