use std::collections::{BTreeMap, HashMap};

/// Lookup contract the engine uses; the assembler owns the actual table.
pub trait SymbolTable {
    fn has_symbol(&self, name: &str) -> bool {
        self.lookup_value(name).is_some()
    }
    fn lookup_value(&self, name: &str) -> Option<u32>;
    fn lookup_name(&self, address: u32) -> Option<&str>;
    /// Closest symbol at or below `address`, with the distance to it.
    fn nearest(&self, _address: u32) -> Option<(&str, u32)> {
        None
    }
}

/// Table with no symbols.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSymbols;

impl SymbolTable for NoSymbols {
    fn lookup_value(&self, _name: &str) -> Option<u32> {
        None
    }
    fn lookup_name(&self, _address: u32) -> Option<&str> {
        None
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Symbols {
    by_name: HashMap<String, u32>,
    by_addr: BTreeMap<u32, String>,
}

impl Symbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines or redefines `name`. The first name given to an address is
    /// the one used when rendering.
    pub fn define(&mut self, name: &str, value: u32) {
        if let Some(old) = self.by_name.insert(name.to_string(), value) {
            if self.by_addr.get(&old).map_or(false, |n| n == name) {
                self.by_addr.remove(&old);
            }
        }
        self.by_addr.entry(value).or_insert_with(|| name.to_string());
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.by_addr.iter().map(|(a, n)| (n.as_str(), *a))
    }
}

impl SymbolTable for Symbols {
    fn lookup_value(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    fn lookup_name(&self, address: u32) -> Option<&str> {
        self.by_addr.get(&address).map(String::as_str)
    }

    fn nearest(&self, address: u32) -> Option<(&str, u32)> {
        self.by_addr
            .range(..=address)
            .next_back()
            .map(|(a, n)| (n.as_str(), address - a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redefinition_moves_reverse_entry() {
        let mut s = Symbols::new();
        s.define("start", 0x100);
        s.define("start", 0x200);
        assert_eq!(s.lookup_value("start"), Some(0x200));
        assert_eq!(s.lookup_name(0x100), None);
        assert_eq!(s.lookup_name(0x200), Some("start"));
    }

    #[test]
    fn nearest_reports_offset() {
        let mut s = Symbols::new();
        s.define("table", 0x1000);
        s.define("code", 0x2000);
        assert_eq!(s.nearest(0x1004), Some(("table", 4)));
        assert_eq!(s.nearest(0x0FFF), None);
    }
}
