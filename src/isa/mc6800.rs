// Motorola 6800 family: MC6800, MC6801/6803 and Hitachi HD6301.

use std::fmt;

use bitflags::bitflags;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::arch::{ArchConfig, ArchOperand, Architecture, RelBase, Shape, Width};
use crate::decoder::DecodeCtx;
use crate::disasm::Formatter;
use crate::encoder;
use crate::error::{ErrorKind, Result};
use crate::insn::{fits_unsigned, Insn, Stage};
use crate::instructions::{entry, Entry, Page, Slot, Table};
use crate::memory::{Endian, Unit};
use crate::operand::{Force, Operand};
use crate::scanner::Scanner;
use crate::value::{Dialect, ValueParser};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Cpu: u32 {
        const MC6800 = 1 << 0;
        const MC6801 = 1 << 1;
        const HD6301 = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    // parsed operand forms
    Imm,
    Dir,
    Ext,
    Idx,
    // table categories
    Imm8,
    Imm16,
    Direct,
    Extended,
    Indexed,
    Rel,
    BitClr,
    BitSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    X,
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("X")
    }
}

const MC6800: &[Entry<Mode>] = &[
    entry!("NOP", 0x01), entry!("TAP", 0x06), entry!("TPA", 0x07), entry!("INX", 0x08),
    entry!("DEX", 0x09), entry!("CLV", 0x0A), entry!("SEV", 0x0B), entry!("CLC", 0x0C),
    entry!("SEC", 0x0D), entry!("CLI", 0x0E), entry!("SEI", 0x0F), entry!("SBA", 0x10),
    entry!("CBA", 0x11), entry!("TAB", 0x16), entry!("TBA", 0x17), entry!("DAA", 0x19),
    entry!("ABA", 0x1B), entry!("TSX", 0x30), entry!("INS", 0x31), entry!("PULA", 0x32),
    entry!("PULB", 0x33), entry!("DES", 0x34), entry!("TXS", 0x35), entry!("PSHA", 0x36),
    entry!("PSHB", 0x37), entry!("RTS", 0x39), entry!("RTI", 0x3B), entry!("WAI", 0x3E),
    entry!("SWI", 0x3F),
    entry!("BRA", 0x20, [Rel]), entry!("BHI", 0x22, [Rel]), entry!("BLS", 0x23, [Rel]),
    entry!("BCC", 0x24, [Rel]), entry!("BCS", 0x25, [Rel]), entry!("BNE", 0x26, [Rel]),
    entry!("BEQ", 0x27, [Rel]), entry!("BVC", 0x28, [Rel]), entry!("BVS", 0x29, [Rel]),
    entry!("BPL", 0x2A, [Rel]), entry!("BMI", 0x2B, [Rel]), entry!("BGE", 0x2C, [Rel]),
    entry!("BLT", 0x2D, [Rel]), entry!("BGT", 0x2E, [Rel]), entry!("BLE", 0x2F, [Rel]),
    entry!("BSR", 0x8D, [Rel]),
    entry!("NEGA", 0x40), entry!("COMA", 0x43), entry!("LSRA", 0x44), entry!("RORA", 0x46),
    entry!("ASRA", 0x47), entry!("ASLA", 0x48), entry!("ROLA", 0x49), entry!("DECA", 0x4A),
    entry!("INCA", 0x4C), entry!("TSTA", 0x4D), entry!("CLRA", 0x4F),
    entry!("NEGB", 0x50), entry!("COMB", 0x53), entry!("LSRB", 0x54), entry!("RORB", 0x56),
    entry!("ASRB", 0x57), entry!("ASLB", 0x58), entry!("ROLB", 0x59), entry!("DECB", 0x5A),
    entry!("INCB", 0x5C), entry!("TSTB", 0x5D), entry!("CLRB", 0x5F),
    entry!("NEG", 0x60, [Indexed]), entry!("NEG", 0x70, [Extended]),
    entry!("COM", 0x63, [Indexed]), entry!("COM", 0x73, [Extended]),
    entry!("LSR", 0x64, [Indexed]), entry!("LSR", 0x74, [Extended]),
    entry!("ROR", 0x66, [Indexed]), entry!("ROR", 0x76, [Extended]),
    entry!("ASR", 0x67, [Indexed]), entry!("ASR", 0x77, [Extended]),
    entry!("ASL", 0x68, [Indexed]), entry!("ASL", 0x78, [Extended]),
    entry!("ROL", 0x69, [Indexed]), entry!("ROL", 0x79, [Extended]),
    entry!("DEC", 0x6A, [Indexed]), entry!("DEC", 0x7A, [Extended]),
    entry!("INC", 0x6C, [Indexed]), entry!("INC", 0x7C, [Extended]),
    entry!("TST", 0x6D, [Indexed]), entry!("TST", 0x7D, [Extended]),
    entry!("JMP", 0x6E, [Indexed]), entry!("JMP", 0x7E, [Extended]),
    entry!("CLR", 0x6F, [Indexed]), entry!("CLR", 0x7F, [Extended]),
    entry!("SUBA", 0x80, [Imm8]), entry!("SUBA", 0x90, [Direct]), entry!("SUBA", 0xA0, [Indexed]), entry!("SUBA", 0xB0, [Extended]),
    entry!("CMPA", 0x81, [Imm8]), entry!("CMPA", 0x91, [Direct]), entry!("CMPA", 0xA1, [Indexed]), entry!("CMPA", 0xB1, [Extended]),
    entry!("SBCA", 0x82, [Imm8]), entry!("SBCA", 0x92, [Direct]), entry!("SBCA", 0xA2, [Indexed]), entry!("SBCA", 0xB2, [Extended]),
    entry!("ANDA", 0x84, [Imm8]), entry!("ANDA", 0x94, [Direct]), entry!("ANDA", 0xA4, [Indexed]), entry!("ANDA", 0xB4, [Extended]),
    entry!("BITA", 0x85, [Imm8]), entry!("BITA", 0x95, [Direct]), entry!("BITA", 0xA5, [Indexed]), entry!("BITA", 0xB5, [Extended]),
    entry!("LDAA", 0x86, [Imm8]), entry!("LDAA", 0x96, [Direct]), entry!("LDAA", 0xA6, [Indexed]), entry!("LDAA", 0xB6, [Extended]),
    entry!("STAA", 0x97, [Direct]), entry!("STAA", 0xA7, [Indexed]), entry!("STAA", 0xB7, [Extended]),
    entry!("EORA", 0x88, [Imm8]), entry!("EORA", 0x98, [Direct]), entry!("EORA", 0xA8, [Indexed]), entry!("EORA", 0xB8, [Extended]),
    entry!("ADCA", 0x89, [Imm8]), entry!("ADCA", 0x99, [Direct]), entry!("ADCA", 0xA9, [Indexed]), entry!("ADCA", 0xB9, [Extended]),
    entry!("ORAA", 0x8A, [Imm8]), entry!("ORAA", 0x9A, [Direct]), entry!("ORAA", 0xAA, [Indexed]), entry!("ORAA", 0xBA, [Extended]),
    entry!("ADDA", 0x8B, [Imm8]), entry!("ADDA", 0x9B, [Direct]), entry!("ADDA", 0xAB, [Indexed]), entry!("ADDA", 0xBB, [Extended]),
    entry!("SUBB", 0xC0, [Imm8]), entry!("SUBB", 0xD0, [Direct]), entry!("SUBB", 0xE0, [Indexed]), entry!("SUBB", 0xF0, [Extended]),
    entry!("CMPB", 0xC1, [Imm8]), entry!("CMPB", 0xD1, [Direct]), entry!("CMPB", 0xE1, [Indexed]), entry!("CMPB", 0xF1, [Extended]),
    entry!("SBCB", 0xC2, [Imm8]), entry!("SBCB", 0xD2, [Direct]), entry!("SBCB", 0xE2, [Indexed]), entry!("SBCB", 0xF2, [Extended]),
    entry!("ANDB", 0xC4, [Imm8]), entry!("ANDB", 0xD4, [Direct]), entry!("ANDB", 0xE4, [Indexed]), entry!("ANDB", 0xF4, [Extended]),
    entry!("BITB", 0xC5, [Imm8]), entry!("BITB", 0xD5, [Direct]), entry!("BITB", 0xE5, [Indexed]), entry!("BITB", 0xF5, [Extended]),
    entry!("LDAB", 0xC6, [Imm8]), entry!("LDAB", 0xD6, [Direct]), entry!("LDAB", 0xE6, [Indexed]), entry!("LDAB", 0xF6, [Extended]),
    entry!("STAB", 0xD7, [Direct]), entry!("STAB", 0xE7, [Indexed]), entry!("STAB", 0xF7, [Extended]),
    entry!("EORB", 0xC8, [Imm8]), entry!("EORB", 0xD8, [Direct]), entry!("EORB", 0xE8, [Indexed]), entry!("EORB", 0xF8, [Extended]),
    entry!("ADCB", 0xC9, [Imm8]), entry!("ADCB", 0xD9, [Direct]), entry!("ADCB", 0xE9, [Indexed]), entry!("ADCB", 0xF9, [Extended]),
    entry!("ORAB", 0xCA, [Imm8]), entry!("ORAB", 0xDA, [Direct]), entry!("ORAB", 0xEA, [Indexed]), entry!("ORAB", 0xFA, [Extended]),
    entry!("ADDB", 0xCB, [Imm8]), entry!("ADDB", 0xDB, [Direct]), entry!("ADDB", 0xEB, [Indexed]), entry!("ADDB", 0xFB, [Extended]),
    entry!("CPX", 0x8C, [Imm16]), entry!("CPX", 0x9C, [Direct]), entry!("CPX", 0xAC, [Indexed]), entry!("CPX", 0xBC, [Extended]),
    entry!("LDS", 0x8E, [Imm16]), entry!("LDS", 0x9E, [Direct]), entry!("LDS", 0xAE, [Indexed]), entry!("LDS", 0xBE, [Extended]),
    entry!("STS", 0x9F, [Direct]), entry!("STS", 0xAF, [Indexed]), entry!("STS", 0xBF, [Extended]),
    entry!("LDX", 0xCE, [Imm16]), entry!("LDX", 0xDE, [Direct]), entry!("LDX", 0xEE, [Indexed]), entry!("LDX", 0xFE, [Extended]),
    entry!("STX", 0xDF, [Direct]), entry!("STX", 0xEF, [Indexed]), entry!("STX", 0xFF, [Extended]),
    entry!("JSR", 0xAD, [Indexed]), entry!("JSR", 0xBD, [Extended]),
];

const MC6801: &[Entry<Mode>] = &[
    entry!("LSRD", 0x04), entry!("ASLD", 0x05), entry!("LSLD", 0x05),
    entry!("BRN", 0x21, [Rel]),
    entry!("PULX", 0x38), entry!("ABX", 0x3A), entry!("PSHX", 0x3C), entry!("MUL", 0x3D),
    entry!("JSR", 0x9D, [Direct]),
    entry!("SUBD", 0x83, [Imm16]), entry!("SUBD", 0x93, [Direct]), entry!("SUBD", 0xA3, [Indexed]), entry!("SUBD", 0xB3, [Extended]),
    entry!("ADDD", 0xC3, [Imm16]), entry!("ADDD", 0xD3, [Direct]), entry!("ADDD", 0xE3, [Indexed]), entry!("ADDD", 0xF3, [Extended]),
    entry!("LDD", 0xCC, [Imm16]), entry!("LDD", 0xDC, [Direct]), entry!("LDD", 0xEC, [Indexed]), entry!("LDD", 0xFC, [Extended]),
    entry!("STD", 0xDD, [Direct]), entry!("STD", 0xED, [Indexed]), entry!("STD", 0xFD, [Extended]),
];

fn one_bit_clear(mask: u32) -> bool {
    (mask as u8).count_zeros() == 1
}

fn one_bit_set(mask: u32) -> bool {
    (mask as u8).count_ones() == 1
}

// The bit aliases share opcodes with the mask forms and come first so a
// single-bit mask decodes as the alias.
const HD6301: &[Entry<Mode>] = &[
    entry!("XGDX", 0x18), entry!("SLP", 0x1A),
    entry!("BCLR", 0x61, [BitClr, Indexed], post = one_bit_clear),
    entry!("BCLR", 0x71, [BitClr, Direct], post = one_bit_clear),
    entry!("BSET", 0x62, [BitSet, Indexed], post = one_bit_set),
    entry!("BSET", 0x72, [BitSet, Direct], post = one_bit_set),
    entry!("BTGL", 0x65, [BitSet, Indexed], post = one_bit_set),
    entry!("BTGL", 0x75, [BitSet, Direct], post = one_bit_set),
    entry!("BTST", 0x6B, [BitSet, Indexed], post = one_bit_set),
    entry!("BTST", 0x7B, [BitSet, Direct], post = one_bit_set),
    entry!("AIM", 0x61, [Imm8, Indexed]), entry!("AIM", 0x71, [Imm8, Direct]),
    entry!("OIM", 0x62, [Imm8, Indexed]), entry!("OIM", 0x72, [Imm8, Direct]),
    entry!("EIM", 0x65, [Imm8, Indexed]), entry!("EIM", 0x75, [Imm8, Direct]),
    entry!("TIM", 0x6B, [Imm8, Indexed]), entry!("TIM", 0x7B, [Imm8, Direct]),
];

// Extension pages first so a direct form added by a later CPU wins over the
// extended form of the base set.
static PAGES: &[Page<Mode>] = &[
    Page::new(HD6301).features(Cpu::HD6301.bits()),
    Page::new(MC6801).features(Cpu::MC6801.bits() | Cpu::HD6301.bits()),
    Page::new(MC6800),
];

lazy_static! {
    static ref TABLE: Table<Mode> = Table::new(PAGES);
}

const CONFIG: ArchConfig = ArchConfig {
    dialect: Dialect::Motorola,
    endian: Endian::Big,
    unit: Unit::Byte,
    address_bits: 16,
    rel_base: RelBase::End,
    ladder: None,
};

#[derive(Debug, Clone, Copy)]
pub struct Mc6800 {
    cpu: Cpu,
    config: ArchConfig,
}

impl Mc6800 {
    pub fn new(cpu: Cpu) -> Self {
        Self { cpu, config: CONFIG }
    }

    pub fn mc6800() -> Self {
        Self::new(Cpu::MC6800)
    }

    pub fn mc6801() -> Self {
        Self::new(Cpu::MC6801)
    }

    pub fn hd6301() -> Self {
        Self::new(Cpu::HD6301)
    }

    pub fn cpu(&self) -> Cpu {
        self.cpu
    }
}

impl Default for Mc6800 {
    fn default() -> Self {
        Self::mc6800()
    }
}

/// `,X` after a displacement.
fn index_suffix(scan: &mut Scanner<'_>) -> bool {
    let save = scan.pos();
    if scan.skip_spaces().eat(',') && scan.skip_spaces().eat_word("X") {
        return true;
    }
    scan.set_pos(save);
    false
}

impl Architecture for Mc6800 {
    type Mode = Mode;
    type Reg = Reg;

    fn name(&self) -> &'static str {
        if self.cpu.contains(Cpu::HD6301) {
            "hd6301"
        } else if self.cpu.contains(Cpu::MC6801) {
            "mc6801"
        } else {
            "mc6800"
        }
    }

    fn config(&self) -> &ArchConfig {
        &self.config
    }

    fn table(&self) -> &Table<Mode> {
        &TABLE
    }

    fn features(&self) -> u32 {
        self.cpu.bits()
    }

    fn accepts(&self, category: Mode, mode: Mode) -> bool {
        match category {
            Mode::Imm8 | Mode::Imm16 => mode == Mode::Imm,
            Mode::Direct | Mode::BitClr | Mode::BitSet => mode == Mode::Dir,
            Mode::Extended | Mode::Rel => matches!(mode, Mode::Dir | Mode::Ext),
            Mode::Indexed => mode == Mode::Idx,
            _ => category == mode,
        }
    }

    fn shape(&self, category: Mode) -> Shape {
        match category {
            Mode::Imm8 => Shape::Immediate(Width::Byte),
            Mode::Imm16 => Shape::Immediate(Width::Word),
            Mode::Direct => Shape::Absolute(Width::Byte),
            Mode::Extended => Shape::Absolute(Width::Word),
            Mode::Indexed => Shape::Indexed { disp: Width::Byte, signed: false },
            Mode::Rel => Shape::Relative(Width::Byte),
            Mode::BitClr | Mode::BitSet => Shape::Custom,
            Mode::Imm | Mode::Dir | Mode::Ext | Mode::Idx => Shape::Implied,
        }
    }

    fn parse_operand(&self, scan: &mut Scanner<'_>, values: &ValueParser<'_>) -> ArchOperand<Self> {
        let at = scan.pos();
        if scan.eat('#') {
            return match values.parse(scan) {
                Ok(v) => Operand::new(Mode::Imm, at).with_value(v),
                Err(e) => Operand::new(Mode::Imm, at).failed(e),
            };
        }
        if scan.peek() == Some(',') && index_suffix(scan) {
            return Operand::new(Mode::Idx, at).with_reg(Reg::X);
        }
        let force = if scan.eat('<') {
            Some(Force::Short)
        } else if scan.eat('>') {
            Some(Force::Long)
        } else {
            None
        };
        let v = match values.parse(scan) {
            Ok(v) => v,
            Err(e) => return Operand::new(Mode::Ext, at).failed(e),
        };
        if index_suffix(scan) {
            return Operand::new(Mode::Idx, at).with_value(v).with_reg(Reg::X);
        }
        let short = !v.undefined && fits_unsigned(v.value, 8);
        let mode = match force {
            Some(Force::Short) => Mode::Dir,
            Some(Force::Long) => Mode::Ext,
            None if short => Mode::Dir,
            None => Mode::Ext,
        };
        let op = Operand::new(mode, at).with_value(v).with_force(force);
        if force == Some(Force::Short) && !v.undefined && !short {
            return op.failed(ErrorKind::OverflowRange.at(at));
        }
        op
    }

    fn check(&self, entry: &Entry<Mode>, ops: &[ArchOperand<Self>]) -> std::result::Result<(), ErrorKind> {
        // `<` asks for a direct page address; an extended-only slot cannot honor it.
        let widened = entry
            .slots
            .iter()
            .zip(ops)
            .any(|(slot, op)| slot.mode == Mode::Extended && op.force == Some(Force::Short));
        if widened {
            return Err(ErrorKind::OperandNotAllowed);
        }
        Ok(())
    }

    fn encode_operand(&self, insn: &mut Insn, entry: &Entry<Mode>, slot: &Slot<Mode>, op: &ArchOperand<Self>) -> Result<()> {
        let mask = match slot.mode {
            Mode::BitClr | Mode::BitSet => {
                if !op.undefined && !fits_unsigned(op.value, 3) {
                    insn.emit(Stage::Payload, 0, 1, op.at);
                    return Err(ErrorKind::IllegalBitNumber.at(op.at));
                }
                let bit = 1u32 << (op.value & 7);
                if slot.mode == Mode::BitClr { !bit & 0xFF } else { bit }
            }
            _ => return encoder::emit_operand(self, insn, entry, slot, op),
        };
        insn.emit(Stage::Payload, mask, 1, op.at);
        Ok(())
    }

    fn decode_operand(&self, ctx: &mut DecodeCtx<'_>, entry: &Entry<Mode>, slot: &Slot<Mode>) -> Option<ArchOperand<Self>> {
        match slot.mode {
            Mode::BitClr | Mode::BitSet => {
                let at = ctx.bytes().len();
                let mask = ctx.read(1) as u8;
                let bit = if slot.mode == Mode::BitClr { (!mask).trailing_zeros() } else { mask.trailing_zeros() };
                Some(Operand::new(slot.mode, at).with_num(bit as i64))
            }
            _ => crate::decoder::read_operand(self, ctx, entry, slot),
        }
    }

    fn format_operand(&self, op: &ArchOperand<Self>, fmt: &Formatter<'_>) -> String {
        match op.mode {
            Mode::Imm8 => format!("#{}", fmt.imm(op.value, 1)),
            Mode::Imm16 => format!("#{}", fmt.imm(op.value, 2)),
            Mode::Imm => format!("#{}", fmt.num(op.value)),
            Mode::Direct | Mode::Dir => match fmt.address(op.value as u32) {
                s if s.starts_with('$') => fmt.imm(op.value, 1),
                name => name,
            },
            Mode::Extended | Mode::Ext if op.value < 0x100 => format!(">{}", fmt.imm(op.value, 2)),
            Mode::Extended | Mode::Ext => fmt.address(op.value as u32),
            Mode::Indexed | Mode::Idx if op.value == 0 => "0,X".to_string(),
            Mode::Indexed | Mode::Idx => format!("{},X", fmt.imm(op.value, 1)),
            Mode::Rel => fmt.target(op.value),
            Mode::BitClr | Mode::BitSet => op.value.to_string(),
        }
    }
}
