use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use std::fmt::Write as _;
use std::path::Path;

use retroasm::memory::Unit;
use retroasm::{ArchConfig, ArchId, ByteReader, Decoded, Options, SymbolTable, Symbols};
use retroasm_cli::{is_mapped, load_raw_bin, Image};

#[derive(Parser, Debug)]
#[command(author, version, about = "Table-driven disassembler for retro CPUs", long_about = None)]
struct Cli {
    /// Target CPU (mc6800, mc6801, hd6301, z80, ns32000, tms32010)
    #[arg(long, default_value = "mc6800")]
    cpu: ArchId,
    /// Load address for the binary in target address space (units)
    #[arg(long, default_value = "0", value_parser = parse_u32)]
    base: u32,
    /// Skip N bytes at start of file before loading
    #[arg(long, default_value_t = 0usize)]
    skip: usize,
    /// Limit bytes loaded (default: to EOF after --skip)
    #[arg(long)]
    len: Option<usize>,
    /// Import symbols from JSON (Vec<{ addr, name }>)
    #[arg(long, value_name = "FILE")]
    symbols: Option<String>,
    /// Render PC-relative targets as offsets from the location counter
    #[arg(long)]
    relative: bool,
    /// Lowercase mnemonics and registers
    #[arg(long)]
    lowercase: bool,
    /// Render `name+n` for addresses up to N past a symbol
    #[arg(long, default_value_t = 0u32)]
    nearest: u32,
    /// Input binary path
    #[arg(value_name = "BINFILE")]
    input: String,
    /// Subcommand
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List loaded segments
    Sections,
    /// Disassemble a range [start, end) in target addresses
    Range {
        /// Start address (hex or dec)
        #[arg(value_parser = parse_u32)]
        start: u32,
        /// End address (hex or dec, exclusive)
        #[arg(value_parser = parse_u32)]
        end: u32,
        /// Show instruction bytes
        #[arg(long)]
        show_bytes: bool,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<String>,
    },
    /// Print the target configuration and its mnemonics as JSON
    Info,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct LabelKV {
    addr: u32,
    name: String,
}

#[derive(Debug, Clone, serde::Serialize)]
struct Info {
    cpu: ArchId,
    config: ArchConfig,
    mnemonics: Vec<&'static str>,
}

fn parse_u32(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u32::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u32>()?)
    }
}

fn load_symbols(path: &str) -> Result<Symbols> {
    let txt = std::fs::read_to_string(path)?;
    let labels: Vec<LabelKV> = serde_json::from_str(&txt).map_err(|e| anyhow!("{path}: {e}"))?;
    let mut symbols = Symbols::new();
    for kv in labels {
        symbols.define(&kv.name, kv.addr);
    }
    Ok(symbols)
}

/// Decodes `[start, end)` out of whichever segment holds `start`.
fn decode_range(cpu: ArchId, img: &Image, start: u32, end: u32, symbols: &Symbols, options: Options) -> Result<Vec<Decoded>> {
    anyhow::ensure!(end >= start, "end must be >= start");
    let seg = img.segment_at(start).ok_or_else(|| anyhow!("{start:#x} is not mapped"))?;
    let mut reader = seg.reader();
    reader.goto(start);
    let mut out = Vec::new();
    while reader.has_next() && reader.address() < end {
        let d = retroasm::disassemble(cpu, &mut reader, symbols, options);
        if d.is_empty() {
            break;
        }
        out.push(d);
    }
    Ok(out)
}

fn render_text(decoded: &[Decoded], symbols: &Symbols, show_bytes: bool, digits: usize) -> String {
    let mut buf = String::new();
    for d in decoded {
        if let Some(name) = symbols.lookup_name(d.address) {
            let _ = writeln!(buf, "{:0digits$x} <{name}>:", d.address);
        }
        let _ = write!(buf, "{:0digits$x}: ", d.address);
        if show_bytes {
            for b in &d.bytes {
                let _ = write!(buf, "{b:02x} ");
            }
            let _ = write!(buf, "  ");
        }
        match d.error {
            Some(e) if d.mnemonic.is_empty() => {
                let _ = writeln!(buf, "??   ; {e}");
            }
            Some(e) => {
                let _ = writeln!(buf, "{}   ; {e}", d.text());
            }
            None => {
                let _ = writeln!(buf, "{}", d.text());
            }
        }
    }
    buf
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = retroasm::config(cli.cpu);
    let img = load_raw_bin(Path::new(&cli.input), cli.base, cli.skip, cli.len, config.unit)?;
    let symbols = match &cli.symbols {
        Some(path) => load_symbols(path)?,
        None => Symbols::new(),
    };
    let options = Options { relative: cli.relative, lowercase: cli.lowercase, nearest: cli.nearest };

    match cli.cmd {
        Command::Sections => {
            println!("{:<16} {:<10} {:<10} {:<8} {:<6}", "name", "start", "end", "units", "unit");
            for s in &img.segments {
                let unit = if s.unit == Unit::Word { "word" } else { "byte" };
                println!("{:<16} {:#010x} {:#010x} {:<8} {:<6}", s.name, s.base, s.end(), s.units(), unit);
            }
        }
        Command::Range { start, end, show_bytes, format, out } => {
            anyhow::ensure!(is_mapped(&img, start), "{start:#x} is not mapped");
            let decoded = decode_range(cli.cpu, &img, start, end, &symbols, options)?;
            let errors = decoded.iter().filter(|d| !d.is_ok()).count();
            tracing::info!(cpu = %cli.cpu, count = decoded.len(), errors, "decoded range");
            let text = match format {
                OutputFormat::Text => render_text(&decoded, &symbols, show_bytes, address_digits(&config)),
                OutputFormat::Json => serde_json::to_string_pretty(&decoded)?,
            };
            if let Some(path) = out {
                std::fs::write(path, text)?;
            } else {
                print!("{text}");
                if matches!(format, OutputFormat::Json) {
                    println!();
                }
            }
        }
        Command::Info => {
            let info = Info { cpu: cli.cpu, config, mnemonics: retroasm::mnemonics(cli.cpu) };
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}

fn address_digits(config: &ArchConfig) -> usize {
    (config.address_bits as usize).div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use retroasm_cli::Segment;

    fn image(base: u32, bytes: &[u8]) -> Image {
        let seg = Segment { name: "s".into(), base, bytes: bytes.to_vec(), unit: Unit::Byte };
        Image { segments: vec![seg] }
    }

    #[test]
    fn parse_u32_hex_and_dec() {
        assert_eq!(parse_u32("0x10").unwrap(), 0x10);
        assert_eq!(parse_u32("16").unwrap(), 16);
        assert!(parse_u32("zz").is_err());
    }

    #[test]
    fn range_stops_at_end_address() {
        // LDAA #$01 ; NOP ; RTS
        let img = image(0x100, &[0x86, 0x01, 0x01, 0x39]);
        let decoded = decode_range(ArchId::Mc6800, &img, 0x100, 0x103, &Symbols::new(), Options::default()).unwrap();
        let text: Vec<String> = decoded.iter().map(Decoded::text).collect();
        assert_eq!(text, vec!["LDAA #$01".to_string(), "NOP".to_string()]);
    }

    #[test]
    fn range_text_marks_labels_and_bytes() {
        let img = image(0x100, &[0x01, 0x39]);
        let mut symbols = Symbols::new();
        symbols.define("exit", 0x101);
        let decoded = decode_range(ArchId::Mc6800, &img, 0x100, 0x102, &symbols, Options::default()).unwrap();
        let text = render_text(&decoded, &symbols, true, 4);
        assert_eq!(text, "0100: 01   NOP\n0101 <exit>:\n0101: 39   RTS\n");
    }

    #[test]
    fn range_rejects_unmapped_start() {
        let img = image(0x100, &[0x01]);
        assert!(decode_range(ArchId::Mc6800, &img, 0x200, 0x201, &Symbols::new(), Options::default()).is_err());
    }
}
