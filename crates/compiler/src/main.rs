//! XL Compiler CLI
//!
//! Command-line interface for compiling, inspecting, and running .xl
//! programs on the bundled VM.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use xl_core::disasm;
use xl_core::image::Image;
use xl_runtime::{Vm, VmFault};
use xlc::compile_file;

#[derive(ClapParser)]
#[command(name = "xlc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "XL compiler - compile and run .xl programs on the XL VM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .xl file and execute it
    Run {
        /// Entry .xl source file
        input: PathBuf,

        /// Invoke a named function instead of running from address 0
        #[arg(short, long)]
        entry: Option<String>,

        /// Integer arguments for --entry, comma separated
        #[arg(long, value_delimiter = ',')]
        args: Vec<u64>,

        /// Bound execution to this many VM steps
        #[arg(long)]
        fuel: Option<u64>,
    },

    /// Compile only and print a summary
    Check {
        /// Entry .xl source file
        input: PathBuf,
    },

    /// Compile and print the bytecode listing
    Disasm {
        /// Entry .xl source file
        input: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { input, entry, args, fuel } => run_program(&input, entry.as_deref(), &args, fuel),
        Commands::Check { input } => run_check(&input),
        Commands::Disasm { input } => run_disasm(&input),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "xlc", &mut io::stdout());
        }
    }
}

fn compile_or_exit(input: &Path) -> Image {
    match compile_file(input) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_program(input: &Path, entry: Option<&str>, args: &[u64], fuel: Option<u64>) {
    let image = compile_or_exit(input);
    println!(
        "Compiled {}: {} globals, {} functions, {} instructions",
        input.display(),
        image.globals.len(),
        image.func_addresses.len(),
        image.instruction_count()
    );

    let mut vm = Vm::new(&image);
    let outcome = match entry {
        Some(name) => {
            let Some(addr) = image.function_address(name) else {
                eprintln!("Error: no function named '{}'", name);
                process::exit(1);
            };
            let result = match fuel {
                Some(limit) => vm.execute_function_bounded(addr, args, limit),
                None => vm.execute_function(addr, args),
            };
            result.map(|value| println!("Result: {} (0x{:016x})", value, value))
        }
        None => {
            let result = match fuel {
                Some(limit) => vm.run_bounded(limit).map(|_| ()),
                None => vm.run(),
            };
            result.map(|()| {
                if let Some(value) = vm.stack_top() {
                    println!("Result: {} (0x{:016x})", value, value);
                }
            })
        }
    };

    if let Err(fault) = outcome {
        report_fault(&image, &fault);
        process::exit(1);
    }
}

fn run_check(input: &Path) {
    let image = compile_or_exit(input);
    println!("{}: ok", input.display());
    println!("  globals:      {}", image.globals.len());
    println!("  functions:    {}", image.func_addresses.len());
    println!("  instructions: {}", image.instruction_count());
    println!("  string pool:  {} cells", image.string_pool_cells());
}

fn run_disasm(input: &Path) {
    let image = compile_or_exit(input);
    print!("{}", disasm::disassemble(&image));
}

fn report_fault(image: &Image, fault: &VmFault) {
    eprintln!("Runtime fault: {}", fault);
    let at = match fault {
        VmFault::StackUnderflow { pc }
        | VmFault::InvalidOpcode { pc, .. }
        | VmFault::HeapOutOfBounds { pc, .. }
        | VmFault::GlobalOutOfBounds { pc, .. } => Some(*pc),
        VmFault::FuelExhausted { .. } => None,
    };
    if let Some(pc) = at {
        if pc + 1 < image.code.len() {
            eprintln!("  at {}", disasm::render_at(image, pc).trim_start());
        }
    }
}
