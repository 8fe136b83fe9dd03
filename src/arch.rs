use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::decoder::{self, DecodeCtx};
use crate::disasm::Formatter;
use crate::encoder;
use crate::error::{ErrorKind, Result};
use crate::insn::Insn;
use crate::instructions::{Entry, Page, Slot, Table};
use crate::memory::{Endian, Unit};
use crate::operand::Operand;
use crate::scanner::Scanner;
use crate::value::{Dialect, ValueParser};

/// Where a PC-relative displacement is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelBase {
    /// Address of the first byte of the instruction (including prefixes).
    Start,
    /// Address right after the instruction.
    End,
}

/// One rung of a variable-length displacement encoding. The tag occupies the
/// top `tag_bits` of the first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LadderStep {
    pub bytes: u8,
    pub tag: u8,
    pub tag_bits: u8,
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ArchConfig {
    pub dialect: Dialect,
    pub endian: Endian,
    pub unit: Unit,
    pub address_bits: u8,
    pub rel_base: RelBase,
    pub ladder: Option<&'static [LadderStep]>,
}

impl Default for ArchConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Intel,
            endian: Endian::Little,
            unit: Unit::Byte,
            address_bits: 16,
            rel_base: RelBase::End,
            ladder: None,
        }
    }
}

/// Payload width of an extension field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
    Long,
    /// Taken from the entry's size class.
    Sized,
}

/// How the generic resolver handles a mode category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Nothing is encoded; the entry itself names the operand.
    Implied,
    /// Register number embedded at the slot position.
    Register,
    /// Short constant embedded at the slot position.
    Embedded { signed: bool },
    /// Bit number 0..2^width embedded at the slot position.
    Bit,
    Immediate(Width),
    Absolute(Width),
    /// PC-relative target in a fixed-width field.
    Relative(Width),
    /// Register at the slot position plus a displacement extension.
    Indexed { disp: Width, signed: bool },
    /// Displacement from the target's ladder; `relative` makes it PC-relative.
    Ladder { relative: bool },
    /// Handled by the target's own encode/decode hooks.
    Custom,
}

pub type ArchOperand<A> = Operand<<A as Architecture>::Mode, <A as Architecture>::Reg>;

/// One target CPU: its table, its operand syntax and the hooks the generic
/// resolvers call for anything they cannot express.
pub trait Architecture {
    type Mode: Copy + Eq + fmt::Debug + 'static;
    type Reg: Copy + Eq + fmt::Debug + fmt::Display + 'static;

    fn name(&self) -> &'static str;
    fn config(&self) -> &ArchConfig;
    fn table(&self) -> &Table<Self::Mode>;

    /// Variant bits; pages whose features don't intersect are skipped.
    fn features(&self) -> u32 {
        u32::MAX
    }

    fn page_enabled(&self, page: &Page<Self::Mode>) -> bool {
        page.features & self.features() != 0
    }

    /// Does an operand of `mode` satisfy a slot of `category`?
    fn accepts(&self, category: Self::Mode, mode: Self::Mode) -> bool;

    fn shape(&self, category: Self::Mode) -> Shape;

    fn parse_operand(&self, scan: &mut Scanner<'_>, values: &ValueParser<'_>) -> ArchOperand<Self>;

    /// Register field for an operand placed in a slot of `category`.
    fn register_field(&self, _category: Self::Mode, _op: &ArchOperand<Self>) -> std::result::Result<u32, ErrorKind> {
        Err(ErrorKind::RegisterNotAllowed)
    }

    /// Inverse of `register_field`.
    fn register_operand(&self, _category: Self::Mode, _field: u32) -> Option<ArchOperand<Self>> {
        None
    }

    /// Whole-instruction check after the entry is chosen.
    fn check(&self, _entry: &Entry<Self::Mode>, _ops: &[ArchOperand<Self>]) -> std::result::Result<(), ErrorKind> {
        Ok(())
    }

    fn encode_operand(&self, insn: &mut Insn, entry: &Entry<Self::Mode>, slot: &Slot<Self::Mode>, op: &ArchOperand<Self>) -> Result<()> {
        encoder::emit_operand(self, insn, entry, slot, op)
    }

    fn decode_operand(&self, ctx: &mut DecodeCtx<'_>, entry: &Entry<Self::Mode>, slot: &Slot<Self::Mode>) -> Option<ArchOperand<Self>> {
        decoder::read_operand(self, ctx, entry, slot)
    }

    fn decode_operands(&self, ctx: &mut DecodeCtx<'_>, entry: &Entry<Self::Mode>) -> Vec<ArchOperand<Self>> {
        entry.slots.iter().filter_map(|slot| self.decode_operand(ctx, entry, slot)).collect()
    }

    /// Renders a mnemonic; targets may override the case or spelling.
    fn format_mnemonic(&self, entry: &Entry<Self::Mode>, fmt: &Formatter<'_>) -> String {
        fmt.case(entry.name)
    }

    fn format_operand(&self, op: &ArchOperand<Self>, fmt: &Formatter<'_>) -> String;
}

/// Every supported target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArchId {
    Mc6800,
    Mc6801,
    Hd6301,
    Z80,
    Ns32000,
    Tms32010,
}

impl ArchId {
    pub const ALL: &'static [ArchId] = &[
        ArchId::Mc6800,
        ArchId::Mc6801,
        ArchId::Hd6301,
        ArchId::Z80,
        ArchId::Ns32000,
        ArchId::Tms32010,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ArchId::Mc6800 => "mc6800",
            ArchId::Mc6801 => "mc6801",
            ArchId::Hd6301 => "hd6301",
            ArchId::Z80 => "z80",
            ArchId::Ns32000 => "ns32000",
            ArchId::Tms32010 => "tms32010",
        }
    }
}

impl fmt::Display for ArchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown cpu `{0}`")]
pub struct UnknownArch(pub String);

impl FromStr for ArchId {
    type Err = UnknownArch;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "6800" | "mc6800" => Ok(ArchId::Mc6800),
            "6801" | "mc6801" | "6803" | "mc6803" => Ok(ArchId::Mc6801),
            "6301" | "hd6301" => Ok(ArchId::Hd6301),
            "z80" => Ok(ArchId::Z80),
            "32000" | "ns32000" | "ns32k" | "32032" | "ns32032" => Ok(ArchId::Ns32000),
            "32010" | "tms32010" | "tms320" => Ok(ArchId::Tms32010),
            _ => Err(UnknownArch(s.to_string())),
        }
    }
}
