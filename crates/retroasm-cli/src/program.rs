use anyhow::{anyhow, bail, Result};

use retroasm::scanner::Scanner;
use retroasm::value::ValueParser;
use retroasm::{ArchConfig, ArchId, Error, SymbolTable, Symbols};

/// Passes to run before giving up on labels that keep moving.
const MAX_PASSES: usize = 8;

/// One assembled source line.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Line {
    pub number: usize,
    pub address: u32,
    pub bytes: Vec<u8>,
    pub error: Option<Error>,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub start: u32,
    pub unit_bytes: usize,
    pub lines: Vec<Line>,
    pub symbols: Symbols,
}

impl Program {
    /// Flat image from `start`; gaps left by `org` are zero-filled. Code
    /// placed below `start` has no place in the image.
    pub fn image(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for line in &self.lines {
            let Some(units) = line.address.checked_sub(self.start) else {
                bail!("line {}: address {:#x} is below the image start {:#x}", line.number, line.address, self.start);
            };
            let off = units as usize * self.unit_bytes;
            if out.len() < off + line.bytes.len() {
                out.resize(off + line.bytes.len(), 0);
            }
            out[off..off + line.bytes.len()].copy_from_slice(&line.bytes);
        }
        Ok(out)
    }
}

/// Assembles a whole source text, repeating passes until every label keeps
/// its address from one pass to the next.
pub fn assemble_source(cpu: ArchId, text: &str, start: u32) -> Result<Program> {
    let config = retroasm::config(cpu);
    let mut known = Symbols::new();
    for pass in 1..=MAX_PASSES {
        let (lines, defined) = run_pass(cpu, &config, text, start, &known)?;
        tracing::debug!(pass, labels = defined.len(), "assembler pass");
        if defined == known {
            if let Some(line) = lines.iter().find(|l| l.error.is_some()) {
                let err = line.error.map(|e| e.to_string()).unwrap_or_default();
                bail!("line {}: {err}", line.number);
            }
            return Ok(Program { start, unit_bytes: config.unit.bytes(), lines, symbols: defined });
        }
        known = defined;
    }
    bail!("labels still moving after {MAX_PASSES} passes")
}

fn run_pass(cpu: ArchId, config: &ArchConfig, text: &str, start: u32, known: &Symbols) -> Result<(Vec<Line>, Symbols)> {
    let unit = config.unit.bytes();
    let mut defined = Symbols::new();
    let mut lines = Vec::new();
    let mut pc = start;
    for (i, src) in text.lines().enumerate() {
        let number = i + 1;
        let mut scan = Scanner::new(src);
        if let Some(label) = scan.skip_spaces().peek_ident() {
            let mut after = scan;
            after.ident();
            if after.eat(':') {
                if defined.has_symbol(label) {
                    bail!("line {number}: label `{label}` defined twice");
                }
                defined.define(label, pc);
                scan = after;
            }
        }
        if scan.skip_spaces().at_end() {
            continue;
        }

        let values = ValueParser::new(config.dialect, known).at(pc);
        let save = scan.pos();
        let dot = scan.eat('.');
        let directive = scan.ident().map(|s| s.to_ascii_uppercase());
        let line = match directive.as_deref() {
            Some("ORG") => {
                let v = values.parse(&mut scan).map_err(|e| anyhow!("line {number}: {e}"))?;
                if !v.undefined {
                    pc = v.value as u32;
                }
                continue;
            }
            Some(d @ ("BYTE" | "DB" | "WORD" | "DW")) => {
                let width = if d == "BYTE" || d == "DB" { 1 } else { 2 };
                let mut bytes = Vec::new();
                let mut error = None;
                loop {
                    scan.skip_spaces();
                    let v = values.parse(&mut scan).map_err(|e| anyhow!("line {number}: {e}"))?;
                    if v.undefined && error.is_none() {
                        error = Some(retroasm::ErrorKind::UndefinedSymbol.at(scan.pos()));
                    }
                    let raw = (v.value as u32).to_be_bytes();
                    match (width, config.endian) {
                        (1, _) => bytes.push(raw[3]),
                        (_, retroasm::memory::Endian::Big) => bytes.extend_from_slice(&raw[2..]),
                        (_, retroasm::memory::Endian::Little) => bytes.extend_from_slice(&[raw[3], raw[2]]),
                    }
                    if !scan.skip_spaces().eat(',') {
                        break;
                    }
                }
                if !scan.at_end() {
                    bail!("line {number}: garbage after data");
                }
                Line { number, address: pc, bytes, error }
            }
            _ if dot => bail!("line {number}: unknown directive"),
            _ => {
                scan.set_pos(save);
                let out = retroasm::assemble(cpu, &src[scan.pos()..], pc, known);
                match out.error {
                    Some(e) if !e.is_soft() => bail!("line {number}: {e}"),
                    error => Line { number, address: pc, bytes: out.bytes, error },
                }
            }
        };
        pc = pc.wrapping_add(line.bytes.len().div_ceil(unit) as u32);
        lines.push(line);
    }
    Ok((lines, defined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn forward_label_settles() {
        let src = "start:  LDAA #1\n        BRA  done\n        NOP\ndone:   RTS\n";
        let prog = assemble_source(ArchId::Mc6800, src, 0x1000).unwrap();
        assert_eq!(prog.image().unwrap(), vec![0x86, 0x01, 0x20, 0x01, 0x01, 0x39]);
        assert_eq!(prog.symbols.lookup_value("done"), Some(0x1005));
    }

    #[test]
    fn direct_page_label_shrinks_the_instruction() {
        // `buf` is unknown in pass one, so LDAA starts out extended.
        let src = "        ORG $10\nbuf:    DB 0\n        LDAA buf\n";
        let prog = assemble_source(ArchId::Mc6800, src, 0x10).unwrap();
        assert_eq!(prog.image().unwrap(), vec![0x00, 0x96, 0x10]);
    }

    #[test]
    fn data_follows_target_endianness() {
        let prog = assemble_source(ArchId::Z80, "DW 1234H\n", 0).unwrap();
        assert_eq!(prog.image().unwrap(), vec![0x34, 0x12]);
        let prog = assemble_source(ArchId::Mc6800, "DW $1234\n", 0).unwrap();
        assert_eq!(prog.image().unwrap(), vec![0x12, 0x34]);
    }

    #[test]
    fn org_below_start_is_rejected() {
        let src = "        NOP\n        ORG $0FFE\n        NOP\n";
        let prog = assemble_source(ArchId::Mc6800, src, 0x1000).unwrap();
        let err = prog.image().unwrap_err();
        assert!(err.to_string().starts_with("line 3:"), "{err}");

        let src = "        NOP\n        ORG $1004\n        NOP\n";
        let prog = assemble_source(ArchId::Mc6800, src, 0x1000).unwrap();
        assert_eq!(prog.image().unwrap(), vec![0x01, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn unknown_label_is_reported_with_line_number() {
        let err = assemble_source(ArchId::Mc6800, "  NOP\n  JMP nowhere\n", 0).unwrap_err();
        assert!(err.to_string().starts_with("line 2:"), "{err}");
    }
}
