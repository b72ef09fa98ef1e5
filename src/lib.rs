//! Stack virtual machine library.
//!
//! Provides the bytecode virtual machine, its assembler, and logging utilities.

pub mod utils;
pub mod virtual_machine;
