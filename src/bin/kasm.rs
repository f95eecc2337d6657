use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kestrel::asm::parse_file;
use kestrel::listing::write_listing;
use kestrel::{Instruction, SymbolTable};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Assemble a source file into a machine-code listing"
)]
struct Opts {
    /// Assembly source file
    #[arg(default_value = "input.asm")]
    input: String,

    /// Listing output file
    #[arg(short, long, default_value = "output.mc")]
    output: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let mut table = SymbolTable::new();
    let mut instructions: Vec<Instruction> = Vec::new();

    // Pass 1 collects labels and data segments, pass 2 parses the
    // instructions and resolves branch targets against them.
    parse_file(&opts.input, &mut instructions, &mut table, true)
        .with_context(|| format!("{}: pass 1 failed", opts.input))?;
    parse_file(&opts.input, &mut instructions, &mut table, false)
        .with_context(|| format!("{}: pass 2 failed", opts.input))?;

    let mut out = std::fs::File::create(&opts.output)
        .with_context(|| format!("cannot create {}", opts.output))?;
    write_listing(&mut out, &table, &instructions)?;

    println!(
        "assembled {} -> {} ({} instructions)",
        opts.input,
        opts.output,
        instructions.len()
    );
    Ok(())
}
