pub mod arch;
pub mod decoder;
pub mod disasm;
pub mod encoder;
pub mod error;
pub mod insn;
pub mod instructions;
pub mod memory;
pub mod operand;
pub mod scanner;
pub mod search;
pub mod symbols;
pub mod value;

pub mod isa {
    pub mod mc6800; // MC6800, MC6801, HD6301
    pub mod ns32000;
    pub mod tms32010;
    pub mod z80;
}

pub use arch::{ArchConfig, ArchId, Architecture};
pub use decoder::{Decoded, Disassembler};
pub use disasm::Options;
pub use encoder::{Assembled, Assembler};
pub use error::{Error, ErrorKind, Result};
pub use memory::{ByteReader, Memory};
pub use symbols::{NoSymbols, SymbolTable, Symbols};

use isa::mc6800::Mc6800;
use isa::ns32000::Ns32000;
use isa::tms32010::Tms32010;
use isa::z80::Z80;

/// Runs `$body` with `$arch` bound to the adapter for `$id`.
macro_rules! with_arch {
    ($id:expr, $arch:ident => $body:expr) => {
        match $id {
            ArchId::Mc6800 => {
                let $arch = &Mc6800::mc6800();
                $body
            }
            ArchId::Mc6801 => {
                let $arch = &Mc6800::mc6801();
                $body
            }
            ArchId::Hd6301 => {
                let $arch = &Mc6800::hd6301();
                $body
            }
            ArchId::Z80 => {
                let $arch = &Z80::new();
                $body
            }
            ArchId::Ns32000 => {
                let $arch = &Ns32000::new();
                $body
            }
            ArchId::Tms32010 => {
                let $arch = &Tms32010::new();
                $body
            }
        }
    };
}

/// Assembles one line for the target named by `id`.
pub fn assemble(id: ArchId, line: &str, address: u32, symbols: &dyn SymbolTable) -> Assembled {
    with_arch!(id, arch => Assembler::new(arch, symbols).assemble(line, address))
}

/// Decodes one instruction for the target named by `id`.
pub fn disassemble(id: ArchId, reader: &mut dyn ByteReader, symbols: &dyn SymbolTable, options: Options) -> Decoded {
    with_arch!(id, arch => Disassembler::new(arch, symbols).with_options(options).decode(reader))
}

/// Decodes until `reader` is exhausted.
pub fn disassemble_all(id: ArchId, reader: &mut dyn ByteReader, symbols: &dyn SymbolTable, options: Options) -> Vec<Decoded> {
    with_arch!(id, arch => Disassembler::new(arch, symbols).with_options(options).decode_all(reader))
}

pub fn config(id: ArchId) -> ArchConfig {
    with_arch!(id, arch => *arch.config())
}

/// Every mnemonic `id` knows, sorted.
pub fn mnemonics(id: ArchId) -> Vec<&'static str> {
    with_arch!(id, arch => {
        let table = arch.table();
        table
            .pages()
            .iter()
            .filter(|page| arch.page_enabled(page))
            .flat_map(|page| page.entries.iter().map(|e| e.name))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect()
    })
}
