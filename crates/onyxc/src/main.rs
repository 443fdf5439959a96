//! Onyx compiler front end: resolves and type checks Onyx sources
//!
//! Usage: onyxc [OPTIONS] <INPUTS>...

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use onyx_compiler::driver::{CompileConfig, Driver, FsLoader, DEFAULT_DATA_BASE};
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser, Debug)]
#[command(name = "onyxc")]
#[command(author = "Onyx Toolchain Team")]
#[command(version)]
#[command(about = "Front-end semantic core for the Onyx WebAssembly language", long_about = None)]
struct Args {
    /// Input source files (.onyx)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory searched by #include_file and #file_contents
    #[arg(short = 'I', long = "include-dir")]
    include_dirs: Vec<PathBuf>,

    /// First address of the static data segment
    #[arg(long, default_value_t = DEFAULT_DATA_BASE)]
    data_base: u32,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Dump tokens (for debugging)
    #[arg(long)]
    dump_tokens: bool,

    /// Dump the entity table after resolution
    #[arg(long)]
    dump_entities: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(1);
        }
    }
}

/// `RUST_LOG` wins; otherwise `info` with `--verbose`, `warn` without
fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<bool> {
    for input in &args.inputs {
        fs::metadata(input).with_context(|| format!("cannot read input '{}'", input.display()))?;
    }

    let config = CompileConfig {
        verbose: args.verbose,
        dump_tokens: args.dump_tokens,
        dump_entities: args.dump_entities,
        include_dirs: args.include_dirs.clone(),
        data_base: args.data_base,
    };
    let loader = FsLoader::new(config.include_dirs.clone());
    let inputs: Vec<String> = args.inputs.iter().map(|p| p.display().to_string()).collect();

    let mut driver = Driver::new(config);
    let ok = driver.compile(&loader, &inputs);
    driver.emit_diagnostics();

    if driver.config().dump_entities {
        eprintln!("=== Entities ===");
        eprint!("{}", driver.dump_entities());
        eprintln!("=== End Entities ===\n");
    }

    if args.verbose {
        let program = driver.program();
        eprintln!(
            "{} entities, {} diagnostics, heap starts at {}",
            program.entity_count(),
            program.diagnostics.len(),
            program.data.heap_start()
        );
    }

    Ok(ok)
}
