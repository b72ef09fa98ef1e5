//! Stack-based bytecode virtual machine.
//!
//! Programs are flat sequences of 64-bit cells: an opcode cell optionally
//! followed by one immediate cell. The VM executes them against two
//! fixed-capacity stacks and a data memory.
//!
//! # Architecture
//!
//! - **Operand stack**: holds computation values
//! - **Call stack**: holds return addresses pushed by `CALL`
//! - **Program memory**: the loaded instruction stream, addressed by the program counter
//! - **Data memory**: slots addressed by `STORE`/`LOAD` immediates
//!
//! # Modules
//!
//! - [`assembler`]: Assembly parsing, label resolution and disassembly
//! - [`errors`]: Load, execution and assembly error types
//! - [`image`]: Binary program image encoding and file I/O
//! - [`isa`]: Opcode table and decoding
//! - [`memory`]: Bounds-checked cell memory
//! - [`stack`]: Fixed-capacity stacks
//! - [`vm`]: Execution engine, configuration and tracing

pub mod assembler;
pub mod errors;
pub mod image;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod memory;
pub mod stack;
pub mod vm;

/// The VM's universal value: opcodes, immediates, addresses and data are all cells.
pub type Cell = i64;
