use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use std::fs;
use std::path::PathBuf;

use retroasm::ArchId;
use retroasm_cli::assemble_source;

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-pass assembler for retro CPUs")]
struct Opts {
    /// Input assembly file (one instruction or directive per line)
    #[arg(short, long)]
    input: PathBuf,
    /// Output binary file
    #[arg(short, long)]
    output: PathBuf,
    /// Target CPU (mc6800, mc6801, hd6301, z80, ns32000, tms32010)
    #[arg(long, default_value = "mc6800")]
    cpu: ArchId,
    /// Start address (used for label resolution and PC-relative encodings)
    #[arg(long, default_value_t = 0u32)]
    start: u32,
    /// Also write the label table as JSON (Vec<{ addr, name }>)
    #[arg(long, value_name = "FILE")]
    labels_out: Option<PathBuf>,
}

#[derive(Debug, serde::Serialize)]
struct LabelKV<'a> {
    addr: u32,
    name: &'a str,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let text = fs::read_to_string(&opts.input)?;
    let program = assemble_source(opts.cpu, &text, opts.start)?;
    let bin = program.image()?;
    tracing::info!(cpu = %opts.cpu, bytes = bin.len(), labels = program.symbols.len(), "assembled");
    fs::write(&opts.output, &bin)?;
    if let Some(path) = &opts.labels_out {
        let labels: Vec<LabelKV<'_>> = program.symbols.iter().map(|(name, addr)| LabelKV { addr, name }).collect();
        fs::write(path, serde_json::to_string_pretty(&labels)?)?;
    }
    Ok(())
}
