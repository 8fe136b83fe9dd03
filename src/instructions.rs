use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Size {
    None,
    Byte,
    Word,
    Long,
    Quad,
}

impl Size {
    pub fn bytes(self) -> usize {
        match self {
            Size::None => 0,
            Size::Byte => 1,
            Size::Word => 2,
            Size::Long => 4,
            Size::Quad => 8,
        }
    }
}

/// One operand position of an entry: the accepted mode category and where
/// its field sits in the opcode. `width == 0` means nothing is embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot<M> {
    pub mode: M,
    pub pos: u8,
    pub width: u8,
}

impl<M> Slot<M> {
    pub fn mask(&self) -> u32 {
        (((1u64 << self.width) - 1) << self.pos) as u32
    }
}

/// One opcode variant.
#[derive(Debug, Clone, Copy)]
pub struct Entry<M: 'static> {
    pub name: &'static str,
    pub opcode: u32,
    pub slots: &'static [Slot<M>],
    pub size: Size,
    /// Check on the unit following the opcode, for entries that only differ
    /// in what comes after it.
    pub post: Option<fn(u32) -> bool>,
}

impl<M: Copy> Entry<M> {
    pub fn name(&self) -> &'static str {
        self.name
    }
    pub fn opcode(&self) -> u32 {
        self.opcode
    }
    pub fn mode(&self, slot: usize) -> Option<M> {
        self.slots.get(slot).map(|s| s.mode)
    }
    pub fn bit_position(&self, slot: usize) -> Option<u8> {
        self.slots.get(slot).map(|s| s.pos)
    }
    pub fn size_class(&self) -> Size {
        self.size
    }

    /// Bits that carry operand fields.
    pub fn mask(&self) -> u32 {
        self.slots.iter().fold(0, |m, s| m | s.mask())
    }

    pub fn matches(&self, opcode: u32) -> bool {
        opcode & !self.mask() == self.opcode
    }
}

/// Entries sharing a prefix and opcode length.
#[derive(Debug, Clone, Copy)]
pub struct Page<M: 'static> {
    pub prefix: &'static [u8],
    /// Units of operand displacement between prefix and opcode.
    pub infix: u8,
    /// Units of opcode.
    pub opcode_len: u8,
    /// Variant bits that enable this page.
    pub features: u32,
    pub entries: &'static [Entry<M>],
}

impl<M> Page<M> {
    pub const fn new(entries: &'static [Entry<M>]) -> Self {
        Self { prefix: &[], infix: 0, opcode_len: 1, features: u32::MAX, entries }
    }
    pub const fn prefix(mut self, prefix: &'static [u8]) -> Self {
        self.prefix = prefix;
        self
    }
    pub const fn infix(mut self, units: u8) -> Self {
        self.infix = units;
        self
    }
    pub const fn opcode_len(mut self, units: u8) -> Self {
        self.opcode_len = units;
        self
    }
    pub const fn features(mut self, features: u32) -> Self {
        self.features = features;
        self
    }
}

/// All pages of one target plus a mnemonic index.
pub struct Table<M: 'static> {
    pages: &'static [Page<M>],
    index: HashMap<&'static str, Vec<(usize, usize)>>,
}

impl<M: Copy + std::fmt::Debug> Table<M> {
    pub fn new(pages: &'static [Page<M>]) -> Self {
        let mut index: HashMap<&'static str, Vec<(usize, usize)>> = HashMap::new();
        for (p, page) in pages.iter().enumerate() {
            for (e, entry) in page.entries.iter().enumerate() {
                if entry.opcode & entry.mask() != 0 {
                    tracing::warn!(name = entry.name, opcode = entry.opcode, "opcode has bits inside an operand field");
                }
                index.entry(entry.name).or_default().push((p, e));
            }
        }
        Self { pages, index }
    }

    pub fn pages(&self) -> &'static [Page<M>] {
        self.pages
    }

    /// Entries named `name` (case-insensitive) in table order.
    pub fn candidates<'t>(&'t self, name: &str) -> impl Iterator<Item = (&'static Page<M>, &'static Entry<M>)> + 't {
        let pages = self.pages;
        self.index
            .get(name.to_ascii_uppercase().as_str())
            .into_iter()
            .flatten()
            .map(move |&(p, e)| (&pages[p], &pages[p].entries[e]))
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.index.contains_key(name.to_ascii_uppercase().as_str())
    }

    pub fn mnemonics(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.index.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

macro_rules! slot {
    ($mode:ident) => {
        $crate::instructions::Slot { mode: Mode::$mode, pos: 0, width: 0 }
    };
    ($mode:ident, $pos:literal, $width:literal) => {
        $crate::instructions::Slot { mode: Mode::$mode, pos: $pos, width: $width }
    };
}

/// `entry!("NAME", opcode, [Mode @ pos:width, Mode], size = Word, post = f)`
macro_rules! entry {
    (@size) => { $crate::instructions::Size::None };
    (@size $size:ident) => { $crate::instructions::Size::$size };
    (@post) => { None };
    (@post $post:path) => { Some($post as fn(u32) -> bool) };
    ($name:expr, $opcode:expr
        $(, [$($mode:ident $(@ $pos:literal : $width:literal)?),* $(,)?])?
        $(, size = $size:ident)?
        $(, post = $post:path)?) => {
        $crate::instructions::Entry {
            name: $name,
            opcode: $opcode,
            slots: &[$($($crate::instructions::slot!($mode $(, $pos, $width)?)),*)?],
            size: $crate::instructions::entry!(@size $($size)?),
            post: $crate::instructions::entry!(@post $($post)?),
        }
    };
}

pub(crate) use entry;
pub(crate) use slot;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Reg,
        Imm,
    }

    const ENTRIES: &[Entry<Mode>] = &[
        entry!("MOV", 0x40, [Reg @ 3:3, Reg @ 0:3]),
        entry!("MVI", 0x06, [Reg @ 3:3, Imm]),
    ];
    static PAGES: &[Page<Mode>] = &[Page::new(ENTRIES)];

    #[test]
    fn mask_covers_slot_fields() {
        assert_eq!(ENTRIES[0].mask(), 0x3F);
        assert!(ENTRIES[0].matches(0x78));
        assert!(!ENTRIES[0].matches(0x06));
        assert_eq!(ENTRIES[1].mode(1), Some(Mode::Imm));
        assert_eq!(ENTRIES[1].bit_position(0), Some(3));
    }

    #[test]
    fn name_index_is_case_insensitive() {
        let t = Table::new(PAGES);
        assert_eq!(t.candidates("mov").count(), 1);
        assert!(t.has_name("Mvi"));
        assert!(!t.has_name("JMP"));
        assert_eq!(t.mnemonics(), vec!["MOV", "MVI"]);
    }
}
