use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kestrel::asm::parse_file;
use kestrel::exec::{self, Exit};
use kestrel::listing::load_listing;
use kestrel::{Cpu, Instruction, Memory, SymbolTable};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run a machine-code listing on the single-cycle simulator"
)]
struct Opts {
    /// Assembly source, read for its data segments and labels
    #[arg(default_value = "input.asm")]
    input: String,

    /// Machine-code listing produced by the assembler
    #[arg(default_value = "output.mc")]
    listing: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    // Only the first pass is needed here: it fills the data segments
    // the simulator unpacks into memory.
    let mut table = SymbolTable::new();
    let mut instructions: Vec<Instruction> = Vec::new();
    parse_file(&opts.input, &mut instructions, &mut table, true)
        .with_context(|| format!("{}: parse failed", opts.input))?;

    let code =
        load_listing(&opts.listing).with_context(|| format!("cannot load {}", opts.listing))?;

    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    exec::init_data_memory(&mut mem, &table);
    exec::init_stack(&mut cpu, &mut mem);

    let exit = exec::run(&mut cpu, &mut mem, &code)?;
    if exit == Exit::Halted {
        let mut dump = std::fs::File::create("data_memory_dump.mc")
            .context("cannot create data_memory_dump.mc")?;
        mem.dump(&mut dump)?;
    }
    let mut dump = std::fs::File::create("final_memory_dump.mc")
        .context("cannot create final_memory_dump.mc")?;
    mem.dump(&mut dump)?;

    println!("simulation complete after {} cycles", cpu.clock);
    Ok(())
}
