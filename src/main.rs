//! A stack-based bytecode virtual machine.
//!
//! Loads a program image (or assembles a source file), runs it to `HALT`, and
//! prints the operand stack.
//!
//! # Usage
//! ```text
//! stackvm <program> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `program`: Binary image (`.bin`) or assembly source (`.asm`)
//!
//! # Options
//! - `-v, --verbose`: Trace every executed instruction
//! - `--mem-size <n>`: Program and data memory size in cells
//! - `--stack-size <n>`: Operand stack capacity
//! - `--call-stack-size <n>`: Call stack capacity

use stackvm::utils::log::{Level, set_min_level};
use stackvm::virtual_machine::Cell;
use stackvm::virtual_machine::assembler::assemble_file;
use stackvm::virtual_machine::errors::VMError;
use stackvm::virtual_machine::image::{CELL_SIZE, read_image};
use stackvm::virtual_machine::vm::{VM, VmConfig};
use stackvm::{error, info, trace};
use std::env;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let program_path = &args[1];
    let mut config = VmConfig::default();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--verbose" | "-v" => {
                config = config.with_verbose(true);
                i += 1;
            }
            k @ ("--mem-size" | "--stack-size" | "--call-stack-size") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                let size = args[i].parse::<usize>().unwrap_or_else(|_| {
                    error!("Invalid size for {k}: '{}' is not a valid number", args[i]);
                    process::exit(1);
                });
                config = match k {
                    "--mem-size" => config.with_mem_size(size),
                    "--stack-size" => config.with_stack_size(size),
                    _ => config.with_call_stack_size(size),
                };
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    if config.verbose {
        set_min_level(Level::Trace);
    }
    trace!(
        "mem_size={} stack_size={} call_stack_size={}",
        config.mem_size,
        config.stack_size,
        config.call_stack_size
    );

    let cells = load_program(program_path).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });

    let mut vm = VM::new(config);
    if let Err(e) = vm.load(&cells) {
        error!("{e}");
        process::exit(1);
    }
    info!(
        "Loaded {} bytes from {}",
        cells.len() * CELL_SIZE,
        program_path
    );

    info!("VM running...");
    if let Err(e) = vm.run() {
        error!("{e}");
        eprint!("{}", vm.stack_dump());
        process::exit(1);
    }

    print!("{}", vm.stack_dump());
}

/// Assembles `.asm` sources; everything else is read as a binary image.
fn load_program(path: &str) -> Result<Vec<Cell>, VMError> {
    let is_source = Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("asm"));
    if is_source {
        assemble_file(path)
    } else {
        read_image(path)
    }
}

const USAGE: &str = "\
Stack Virtual Machine

USAGE:
    {program} <program> [OPTIONS]

ARGS:
    <program>    Binary image (.bin) or assembly source (.asm)

OPTIONS:
    -v, --verbose              Trace every executed instruction
    --mem-size <n>             Program and data memory size in cells (default 20480)
    --stack-size <n>           Operand stack capacity (default 10240)
    --call-stack-size <n>      Call stack capacity (default 10240)
    -h, --help                 Print this help message

EXAMPLES:
    # Run a compiled image
    {program} program.bin

    # Assemble and run with an instruction trace
    {program} program.asm --verbose

    # Run with a small operand stack
    {program} program.bin --stack-size 16
";

/// Prints usage information.
fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
