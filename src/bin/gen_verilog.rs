//! Writes the generated Verilog snippets for the digdar FPGA build. The
//! output files are version-controlled alongside the FPGA project; their
//! names are stable so the Verilog sources can include them unchanged.

use anyhow::{Context, Result};
use clap::Parser;
use ogdar::regs::Schema;
use ogdar::verilog;
use std::path::PathBuf;

/// gen_verilog CLI arguments.
#[derive(Parser, Debug)]
#[clap(author, version, about = "Generate digdar register Verilog snippets")]
struct Args {
    /// Directory the snippet files are written into
    #[clap(long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let schema = Schema::digdar();
    for (name, emit) in verilog::ARTIFACTS.iter().copied() {
        let path = args.out_dir.join(name);
        std::fs::write(&path, emit(schema))
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}
