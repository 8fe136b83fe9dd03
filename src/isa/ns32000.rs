// National Semiconductor NS32000 (formats 0 to 4).

use std::fmt;

use lazy_static::lazy_static;

use crate::arch::{ArchConfig, ArchOperand, Architecture, LadderStep, RelBase, Shape, Width};
use crate::decoder::{read_operand, DecodeCtx};
use crate::disasm::Formatter;
use crate::encoder::{self, width_bytes};
use crate::error::{ErrorKind, Result};
use crate::insn::{fits_signed, fits_unsigned, Insn, Stage};
use crate::instructions::{entry, Entry, Page, Size, Slot, Table};
use crate::memory::{Endian, Unit};
use crate::operand::{Force, Operand};
use crate::scanner::Scanner;
use crate::value::{Dialect, ValueParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    // operand forms
    Reg,
    RegRel,
    Space,
    Imm,
    Abs,
    Tos,
    RegList,
    /// PC-relative address operand, decoded to its target.
    Pcrel,
    // table categories
    Gen,
    GenW,
    GenA,
    Quick,
    Disp,
    DispAbs,
    List,
    ListRev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    R0, R1, R2, R3, R4, R5, R6, R7,
    FP, SP, SB, PC,
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

const GENERAL: [Reg; 8] = [Reg::R0, Reg::R1, Reg::R2, Reg::R3, Reg::R4, Reg::R5, Reg::R6, Reg::R7];
const SPACES: [Reg; 4] = [Reg::FP, Reg::SP, Reg::SB, Reg::PC];

fn number(reg: Reg) -> u32 {
    match reg {
        Reg::R0 | Reg::FP => 0,
        Reg::R1 | Reg::SP => 1,
        Reg::R2 | Reg::SB => 2,
        Reg::R3 | Reg::PC => 3,
        Reg::R4 => 4,
        Reg::R5 => 5,
        Reg::R6 => 6,
        Reg::R7 => 7,
    }
}

const GEN_IMMEDIATE: u32 = 0x14;
const GEN_ABSOLUTE: u32 = 0x15;
const GEN_TOS: u32 = 0x17;
const GEN_SPACE: u32 = 0x18;
const GEN_SCALED: u32 = 0x1C;

/// 7, 14 and 30 bit displacements. First bytes `0xE0..=0xFF` are reserved.
const LADDER: &[LadderStep] = &[
    LadderStep { bytes: 1, tag: 0b0, tag_bits: 1, min: -64, max: 63 },
    LadderStep { bytes: 2, tag: 0b10, tag_bits: 2, min: -8192, max: 8191 },
    LadderStep { bytes: 4, tag: 0b11, tag_bits: 2, min: -0x1F00_0000, max: 0x1FFF_FFFF },
];

const SHORT: &[Entry<Mode>] = &[
    entry!("BEQ", 0x0A, [Disp]),
    entry!("BNE", 0x1A, [Disp]),
    entry!("BCS", 0x2A, [Disp]),
    entry!("BCC", 0x3A, [Disp]),
    entry!("BHI", 0x4A, [Disp]),
    entry!("BLS", 0x5A, [Disp]),
    entry!("BGT", 0x6A, [Disp]),
    entry!("BLE", 0x7A, [Disp]),
    entry!("BFS", 0x8A, [Disp]),
    entry!("BFC", 0x9A, [Disp]),
    entry!("BLO", 0xAA, [Disp]),
    entry!("BHS", 0xBA, [Disp]),
    entry!("BLT", 0xCA, [Disp]),
    entry!("BGE", 0xDA, [Disp]),
    entry!("BR", 0xEA, [Disp]),
    entry!("BSR", 0x02, [Disp]),
    entry!("RET", 0x12, [DispAbs]),
    entry!("CXP", 0x22, [DispAbs]),
    entry!("RXP", 0x32, [DispAbs]),
    entry!("RETT", 0x42, [DispAbs]),
    entry!("RETI", 0x52),
    entry!("SAVE", 0x62, [List]),
    entry!("RESTORE", 0x72, [ListRev]),
    entry!("ENTER", 0x82, [List, DispAbs]),
    entry!("EXIT", 0x92, [ListRev]),
    entry!("NOP", 0xA2),
    entry!("WAIT", 0xB2),
    entry!("DIA", 0xC2),
    entry!("FLAG", 0xD2),
    entry!("SVC", 0xE2),
    entry!("BPT", 0xF2),
];

macro_rules! sized {
    ($name:literal, $opcode:expr, [$($slot:tt)*]) => {
        [
            entry!(concat!($name, "B"), $opcode, [$($slot)*], size = Byte),
            entry!(concat!($name, "W"), $opcode | 1, [$($slot)*], size = Word),
            entry!(concat!($name, "D"), $opcode | 3, [$($slot)*], size = Long),
        ]
    };
}

const ADDQ: [Entry<Mode>; 3] = sized!("ADDQ", 0x0C, [Quick @ 7:4, GenW @ 11:5]);
const CMPQ: [Entry<Mode>; 3] = sized!("CMPQ", 0x1C, [Quick @ 7:4, Gen @ 11:5]);
const ACB: [Entry<Mode>; 3] = sized!("ACB", 0x4C, [Quick @ 7:4, GenW @ 11:5, Disp]);
const MOVQ: [Entry<Mode>; 3] = sized!("MOVQ", 0x5C, [Quick @ 7:4, GenW @ 11:5]);
const CASE: [Entry<Mode>; 3] = sized!("CASE", 0x077C, [Gen @ 11:5]);
const ADJSP: [Entry<Mode>; 3] = sized!("ADJSP", 0x057C, [Gen @ 11:5]);
const ADD: [Entry<Mode>; 3] = sized!("ADD", 0x00, [Gen @ 11:5, GenW @ 6:5]);
const CMP: [Entry<Mode>; 3] = sized!("CMP", 0x04, [Gen @ 11:5, Gen @ 6:5]);
const BIC: [Entry<Mode>; 3] = sized!("BIC", 0x08, [Gen @ 11:5, GenW @ 6:5]);
const ADDC: [Entry<Mode>; 3] = sized!("ADDC", 0x10, [Gen @ 11:5, GenW @ 6:5]);
const MOV: [Entry<Mode>; 3] = sized!("MOV", 0x14, [Gen @ 11:5, GenW @ 6:5]);
const OR: [Entry<Mode>; 3] = sized!("OR", 0x18, [Gen @ 11:5, GenW @ 6:5]);
const SUB: [Entry<Mode>; 3] = sized!("SUB", 0x20, [Gen @ 11:5, GenW @ 6:5]);
const AND: [Entry<Mode>; 3] = sized!("AND", 0x28, [Gen @ 11:5, GenW @ 6:5]);
const SUBC: [Entry<Mode>; 3] = sized!("SUBC", 0x30, [Gen @ 11:5, GenW @ 6:5]);
const TBIT: [Entry<Mode>; 3] = sized!("TBIT", 0x34, [Gen @ 11:5, Gen @ 6:5]);
const XOR: [Entry<Mode>; 3] = sized!("XOR", 0x38, [Gen @ 11:5, GenW @ 6:5]);

const LONG: &[Entry<Mode>] = &[
    ADDQ[0], ADDQ[1], ADDQ[2],
    CMPQ[0], CMPQ[1], CMPQ[2],
    ACB[0], ACB[1], ACB[2],
    MOVQ[0], MOVQ[1], MOVQ[2],
    entry!("JUMP", 0x027F, [GenA @ 11:5]),
    entry!("JSR", 0x067F, [GenA @ 11:5]),
    CASE[0], CASE[1], CASE[2],
    ADJSP[0], ADJSP[1], ADJSP[2],
    ADD[0], ADD[1], ADD[2],
    CMP[0], CMP[1], CMP[2],
    BIC[0], BIC[1], BIC[2],
    ADDC[0], ADDC[1], ADDC[2],
    MOV[0], MOV[1], MOV[2],
    OR[0], OR[1], OR[2],
    SUB[0], SUB[1], SUB[2],
    entry!("ADDR", 0x27, [GenA @ 11:5, GenW @ 6:5], size = Long),
    AND[0], AND[1], AND[2],
    SUBC[0], SUBC[1], SUBC[2],
    TBIT[0], TBIT[1], TBIT[2],
    XOR[0], XOR[1], XOR[2],
];

static PAGES: &[Page<Mode>] = &[Page::new(SHORT), Page::new(LONG).opcode_len(2)];

lazy_static! {
    static ref TABLE: Table<Mode> = Table::new(PAGES);
}

const CONFIG: ArchConfig = ArchConfig {
    dialect: Dialect::National,
    endian: Endian::Little,
    unit: Unit::Byte,
    address_bits: 24,
    rel_base: RelBase::Start,
    ladder: Some(LADDER),
};

fn is_gen(mode: Mode) -> bool {
    matches!(mode, Mode::Gen | Mode::GenW | Mode::GenA)
}

fn register(scan: &mut Scanner<'_>) -> Option<Reg> {
    const NAMES: [(&str, Reg); 12] = [
        ("R0", Reg::R0), ("R1", Reg::R1), ("R2", Reg::R2), ("R3", Reg::R3),
        ("R4", Reg::R4), ("R5", Reg::R5), ("R6", Reg::R6), ("R7", Reg::R7),
        ("FP", Reg::FP), ("SP", Reg::SP), ("SB", Reg::SB), ("PC", Reg::PC),
    ];
    NAMES.iter().find(|(name, _)| scan.eat_word(name)).map(|&(_, reg)| reg)
}

fn general(reg: Reg) -> bool {
    GENERAL.contains(&reg)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ns32000;

impl Ns32000 {
    pub fn new() -> Self {
        Ns32000
    }

    /// `[R0,R2,...]`
    fn parse_list(&self, scan: &mut Scanner<'_>, at: usize) -> ArchOperand<Self> {
        let mut op = Operand::new(Mode::RegList, at);
        if scan.skip_spaces().eat(']') {
            return op;
        }
        loop {
            let reg_at = scan.skip_spaces().pos();
            let Some(reg) = register(scan).filter(|&r| general(r)) else {
                return op.failed(ErrorKind::RegisterNotAllowed.at(reg_at));
            };
            let bit = 1 << number(reg);
            if op.list & bit != 0 {
                return op.failed(ErrorKind::DuplicateRegister.at(reg_at));
            }
            op.list |= bit;
            if scan.skip_spaces().eat(']') {
                return op;
            }
            if !scan.eat(',') {
                return op.failed(ErrorKind::MissingClosingParen.at(scan.pos()));
            }
        }
    }

    /// `[Rn:b|w|d|q]` after a base operand.
    fn parse_scaled(&self, scan: &mut Scanner<'_>, mut op: ArchOperand<Self>) -> ArchOperand<Self> {
        let reg_at = scan.skip_spaces().pos();
        let Some(reg) = register(scan).filter(|&r| general(r)) else {
            return op.failed(ErrorKind::RegisterNotAllowed.at(reg_at));
        };
        if !scan.skip_spaces().eat(':') {
            return op.failed(ErrorKind::IllegalSize.at(scan.pos()));
        }
        let size_at = scan.skip_spaces().pos();
        op.index_size = match scan.ident().map(|s| s.to_ascii_uppercase()).as_deref() {
            Some("B") => Size::Byte,
            Some("W") => Size::Word,
            Some("D") => Size::Long,
            Some("Q") => Size::Quad,
            _ => return op.failed(ErrorKind::IllegalSize.at(size_at)),
        };
        if !scan.skip_spaces().eat(']') {
            return op.failed(ErrorKind::MissingClosingParen.at(scan.pos()));
        }
        op.index = Some(reg);
        op
    }

    fn encode_gen(&self, insn: &mut Insn, entry: &Entry<Mode>, slot: &Slot<Mode>, op: &ArchOperand<Self>) -> Result<()> {
        let at = op.at;
        let disp = |insn: &mut Insn, relative: bool| {
            insn.emit_ladder(Stage::Payload, op.value, relative, op.force, op.undefined, at);
        };
        let reg = op.reg.map(number).unwrap_or(0);
        let base = match op.mode {
            Mode::Reg => reg,
            Mode::RegRel => {
                disp(insn, false);
                8 + reg
            }
            Mode::Space => {
                disp(insn, false);
                GEN_SPACE + reg
            }
            Mode::Imm if slot.mode == Mode::GenA => {
                disp(insn, true);
                GEN_SPACE + 3
            }
            Mode::Imm => {
                if op.index.is_some() {
                    return Err(ErrorKind::OperandNotAllowed.at(at));
                }
                let n = width_bytes(Width::Sized, entry.size).map_err(|k| k.at(at))?;
                let bits = n as u32 * 8;
                if !op.undefined && !fits_signed(op.value, bits) && !fits_unsigned(op.value, bits) {
                    insn.emit(Stage::Payload, 0, n, at);
                    insn.embed(GEN_IMMEDIATE, slot.pos, slot.width);
                    return Err(ErrorKind::OverflowRange.at(at));
                }
                insn.emit_endian(Stage::Payload, op.value as u32, n, Endian::Big, at);
                GEN_IMMEDIATE
            }
            Mode::Abs => {
                disp(insn, false);
                GEN_ABSOLUTE
            }
            Mode::Tos => GEN_TOS,
            _ => return Err(ErrorKind::OperandNotAllowed.at(at)),
        };
        let gen = match op.index {
            Some(index) => {
                let scale = match op.index_size {
                    Size::Byte => 0,
                    Size::Word => 1,
                    Size::Long => 2,
                    Size::Quad => 3,
                    Size::None => return Err(ErrorKind::IllegalSize.at(at)),
                };
                insn.emit(Stage::Index, (base << 3) | number(index), 1, at);
                GEN_SCALED + scale
            }
            None => base,
        };
        insn.embed(gen, slot.pos, slot.width);
        Ok(())
    }

    fn decode_gen(&self, ctx: &mut DecodeCtx<'_>, entry: &Entry<Mode>, slot: &Slot<Mode>, index: Option<u8>) -> Option<ArchOperand<Self>> {
        let at = ctx.bytes().len();
        let field = ctx.field(slot);
        let gen = match index {
            Some(byte) => (byte >> 3) as u32,
            None => field,
        };
        // Writable operands take no immediate, and address operands need memory.
        let not_allowed = match slot.mode {
            Mode::GenW => gen == GEN_IMMEDIATE,
            Mode::GenA => gen < 8 || gen == GEN_IMMEDIATE,
            _ => false,
        };
        if not_allowed {
            ctx.set_error(ErrorKind::OperandNotAllowed);
            return None;
        }
        let mut op = match gen {
            0..=7 => Operand::new(Mode::Reg, at).with_reg(GENERAL[gen as usize]),
            8..=15 => Operand::new(Mode::RegRel, at).with_reg(GENERAL[gen as usize - 8]).with_num(ctx.read_ladder()),
            GEN_IMMEDIATE if index.is_none() => {
                let Ok(n) = width_bytes(Width::Sized, entry.size) else {
                    ctx.set_error(ErrorKind::IllegalSize);
                    return None;
                };
                Operand::new(Mode::Imm, at).with_num(ctx.read_endian(n, Endian::Big) as i64)
            }
            GEN_ABSOLUTE => Operand::new(Mode::Abs, at).with_num(ctx.read_ladder()),
            GEN_TOS => Operand::new(Mode::Tos, at),
            0x1B if slot.mode == Mode::GenA => {
                let disp = ctx.read_ladder();
                Operand::new(Mode::Pcrel, at).with_num(ctx.wrap(ctx.rel_base() + disp))
            }
            0x18..=0x1B => Operand::new(Mode::Space, at).with_reg(SPACES[(gen - GEN_SPACE) as usize]).with_num(ctx.read_ladder()),
            _ => {
                ctx.set_error(ErrorKind::UnknownOperand);
                return None;
            }
        };
        if let Some(byte) = index {
            op.index = Some(GENERAL[(byte & 7) as usize]);
            op.index_size = [Size::Byte, Size::Word, Size::Long, Size::Quad][(field - GEN_SCALED) as usize & 3];
        }
        Some(op)
    }
}

impl Architecture for Ns32000 {
    type Mode = Mode;
    type Reg = Reg;

    fn name(&self) -> &'static str {
        "ns32000"
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
            Gen => matches!(mode, Reg | RegRel | Space | Imm | Abs | Tos),
            GenW => matches!(mode, Reg | RegRel | Space | Abs | Tos),
            GenA => matches!(mode, RegRel | Space | Imm | Abs | Tos),
            Quick | Disp | DispAbs => mode == Imm,
            List | ListRev => mode == RegList,
            _ => false,
        }
    }

    fn shape(&self, category: Mode) -> Shape {
        match category {
            Mode::Quick => Shape::Embedded { signed: true },
            Mode::Disp => Shape::Ladder { relative: true },
            Mode::DispAbs => Shape::Ladder { relative: false },
            Mode::Gen | Mode::GenW | Mode::GenA | Mode::List | Mode::ListRev => Shape::Custom,
            _ => Shape::Implied,
        }
    }

    fn parse_operand(&self, scan: &mut Scanner<'_>, values: &ValueParser<'_>) -> ArchOperand<Self> {
        let at = scan.pos();
        if scan.eat('[') {
            return self.parse_list(scan, at);
        }
        let op = if scan.eat_word("TOS") {
            Operand::new(Mode::Tos, at)
        } else if let Some(reg) = register(scan) {
            let op = Operand::new(Mode::Reg, at).with_reg(reg);
            if !general(reg) {
                return op.failed(ErrorKind::RegisterNotAllowed.at(at));
            }
            op
        } else {
            let abs = scan.eat('@');
            let force = if scan.eat('<') {
                Some(Force::Short)
            } else if scan.eat('>') {
                Some(Force::Long)
            } else {
                None
            };
            let v = match values.parse(scan) {
                Ok(v) => v,
                Err(e) => return Operand::new(Mode::Imm, at).failed(e),
            };
            if abs {
                Operand::new(Mode::Abs, at).with_value(v).with_force(force)
            } else if scan.skip_spaces().eat('(') {
                let reg_at = scan.skip_spaces().pos();
                let Some(reg) = register(scan) else {
                    return Operand::new(Mode::RegRel, at).failed(ErrorKind::UnknownOperand.at(reg_at));
                };
                if !scan.skip_spaces().eat(')') {
                    return Operand::new(Mode::RegRel, at).failed(ErrorKind::MissingClosingParen.at(scan.pos()));
                }
                let mode = if general(reg) { Mode::RegRel } else { Mode::Space };
                Operand::new(mode, at).with_value(v).with_reg(reg).with_force(force)
            } else {
                Operand::new(Mode::Imm, at).with_value(v).with_force(force)
            }
        };
        let save = scan.pos();
        if scan.skip_spaces().eat('[') {
            return self.parse_scaled(scan, op);
        }
        scan.set_pos(save);
        op
    }

    fn encode_operand(&self, insn: &mut Insn, entry: &Entry<Mode>, slot: &Slot<Mode>, op: &ArchOperand<Self>) -> Result<()> {
        match slot.mode {
            Mode::List => insn.emit(Stage::Payload, op.list, 1, op.at),
            Mode::ListRev => insn.emit(Stage::Payload, (op.list as u8).reverse_bits() as u32, 1, op.at),
            m if is_gen(m) => return self.encode_gen(insn, entry, slot, op),
            _ => return encoder::emit_operand(self, insn, entry, slot, op),
        }
        Ok(())
    }

    fn decode_operand(&self, ctx: &mut DecodeCtx<'_>, entry: &Entry<Mode>, slot: &Slot<Mode>) -> Option<ArchOperand<Self>> {
        let at = ctx.bytes().len();
        match slot.mode {
            Mode::List => Some(Operand::new(Mode::RegList, at).with_list(ctx.read(1))),
            Mode::ListRev => Some(Operand::new(Mode::RegList, at).with_list((ctx.read(1) as u8).reverse_bits() as u32)),
            m if is_gen(m) => self.decode_gen(ctx, entry, slot, None),
            _ => read_operand(self, ctx, entry, slot),
        }
    }

    // Index bytes of both general operands precede every displacement.
    fn decode_operands(&self, ctx: &mut DecodeCtx<'_>, entry: &Entry<Mode>) -> Vec<ArchOperand<Self>> {
        let index: Vec<Option<u8>> = entry
            .slots
            .iter()
            .map(|s| (is_gen(s.mode) && ctx.field(s) >= GEN_SCALED).then(|| ctx.read(1) as u8))
            .collect();
        entry
            .slots
            .iter()
            .zip(index)
            .filter_map(|(slot, ix)| match ix {
                Some(_) => self.decode_gen(ctx, entry, slot, ix),
                None => self.decode_operand(ctx, entry, slot),
            })
            .collect()
    }

    fn format_operand(&self, op: &ArchOperand<Self>, fmt: &Formatter<'_>) -> String {
        let reg = op.reg.map_or_else(String::new, |r| fmt.case(&r.to_string()));
        let base = match op.mode {
            Mode::Reg => reg,
            Mode::RegRel | Mode::Space => format!("{}({reg})", fmt.num(op.value)),
            Mode::Imm => fmt.num(op.value),
            Mode::Abs => format!("@{}", fmt.address(op.value as u32)),
            Mode::Tos => fmt.case("TOS"),
            Mode::Pcrel | Mode::Disp => fmt.target(op.value),
            Mode::RegList => {
                let regs: Vec<String> = (0..8).filter(|i| op.list & (1 << i) != 0).map(|i| fmt.case(&format!("R{i}"))).collect();
                format!("[{}]", regs.join(","))
            }
            _ => fmt.num(op.value),
        };
        match op.index {
            Some(index) => {
                let size = match op.index_size {
                    Size::Byte => "B",
                    Size::Word => "W",
                    Size::Long => "D",
                    _ => "Q",
                };
                format!("{base}[{}:{}]", fmt.case(&index.to_string()), fmt.case(size))
            }
            None => base,
        }
    }
}
