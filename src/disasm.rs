use serde::{Deserialize, Serialize};

use crate::arch::ArchConfig;
use crate::symbols::SymbolTable;
use crate::value::Dialect;

/// Rendering options for disassembly.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Options {
    /// Show PC-relative targets as `$+n` from the location counter.
    pub relative: bool,
    pub lowercase: bool,
    /// Render `name+n` for addresses up to this far past a symbol.
    pub nearest: u32,
}

/// Operand text helpers shared by every target.
pub struct Formatter<'a> {
    dialect: Dialect,
    address_bits: u8,
    symbols: &'a dyn SymbolTable,
    options: Options,
    address: u32,
}

impl<'a> Formatter<'a> {
    pub fn new(config: &ArchConfig, symbols: &'a dyn SymbolTable, options: Options, address: u32) -> Self {
        Self { dialect: config.dialect, address_bits: config.address_bits, symbols, options, address }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn case(&self, s: &str) -> String {
        if self.options.lowercase { s.to_ascii_lowercase() } else { s.to_ascii_uppercase() }
    }

    pub fn hex(&self, v: u64, digits: usize) -> String {
        self.dialect.hex(v, digits)
    }

    /// Immediate of `bytes` width; masked so sign bits don't leak.
    pub fn imm(&self, v: i64, bytes: usize) -> String {
        let bits = (bytes * 8).min(32) as u32;
        let masked = (v as u64) & ((1u64 << bits) - 1);
        self.dialect.hex(masked, bytes * 2)
    }

    /// Small constant: decimal below 10, hex otherwise.
    pub fn num(&self, v: i64) -> String {
        self.dialect.signed(v)
    }

    fn digits(&self) -> usize {
        (self.address_bits as usize + 3) / 4
    }

    /// Address, as a symbol if one is defined there.
    pub fn address(&self, addr: u32) -> String {
        if let Some(name) = self.symbols.lookup_name(addr) {
            return name.to_string();
        }
        if self.options.nearest > 0 {
            if let Some((name, off)) = self.symbols.nearest(addr) {
                if off <= self.options.nearest {
                    return format!("{name}+{off}");
                }
            }
        }
        self.hex(addr as u64, self.digits())
    }

    /// Branch target; relative to the location counter if requested.
    pub fn target(&self, target: i64) -> String {
        if self.options.relative {
            let delta = target - self.address as i64;
            let loc = self.dialect.location_symbol();
            return match delta {
                0 => loc.to_string(),
                d if d < 0 => format!("{loc}-{}", self.dialect.signed(-d)),
                d => format!("{loc}+{}", self.dialect.signed(d)),
            };
        }
        self.address(target as u32)
    }
}
