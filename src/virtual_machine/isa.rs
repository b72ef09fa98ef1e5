//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_opcode!`](crate::for_each_opcode) macro holds the canonical
//! opcode table and invokes a callback macro for code generation, so the VM,
//! the assembler and the ISA hash check all read the same definitions.
//!
//! This module generates:
//! - The [`Opcode`] enum with its numeric codes
//! - `TryFrom<Cell>` for decoding fetched cells
//! - Mnemonic and operand-count lookups
//!
//! # Bytecode Format
//!
//! Every instruction is one opcode cell, optionally followed by one immediate
//! cell. Opcodes with an immediate: `PUSH`, `JMP`, `JZ`, `JNZ`, `STORE`,
//! `LOAD`, `CALL`.

use crate::virtual_machine::Cell;
use crate::virtual_machine::errors::InvalidOpcode;
use std::fmt;

/// Invokes a callback macro with the complete opcode definition list.
///
/// Operand kinds:
/// - `Imm`: a literal value
/// - `Addr`: a program memory address (labels allowed in assembly)
/// - `Slot`: a data memory index
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Stack
            // =========================
            /// NOP ; no effect
            Nop = 0x00, "NOP" => [],
            /// PUSH value ; push value
            Push = 0x01, "PUSH" => [value: Imm],
            /// POP ; discard top
            Pop = 0x02, "POP" => [],
            /// DUP ; push a copy of top
            Dup = 0x03, "DUP" => [],
            // =========================
            // Arithmetic
            // =========================
            /// ADD ; pop b, pop a, push a + b
            Add = 0x10, "ADD" => [],
            /// SUB ; pop b, pop a, push a - b
            Sub = 0x11, "SUB" => [],
            /// MUL ; pop b, pop a, push a * b
            Mul = 0x12, "MUL" => [],
            /// DIV ; pop b, pop a, push a / b (trap on division by zero)
            Div = 0x13, "DIV" => [],
            /// CMP ; pop b, pop a, push 1 if a < b else 0
            Cmp = 0x14, "CMP" => [],
            // =========================
            // Bitwise
            // =========================
            /// AND ; pop b, pop a, push a & b
            And = 0x15, "AND" => [],
            /// OR ; pop b, pop a, push a | b
            Or = 0x16, "OR" => [],
            /// XOR ; pop b, pop a, push a ^ b
            Xor = 0x17, "XOR" => [],
            /// NOT ; pop a, push !a
            Not = 0x18, "NOT" => [],
            /// SHL ; pop amount, pop a, push a << amount
            Shl = 0x19, "SHL" => [],
            /// SHR ; pop amount, pop a, push a >> amount (arithmetic shift)
            Shr = 0x1A, "SHR" => [],
            // =========================
            // Control Flow
            // =========================
            /// JMP addr ; pc = addr
            Jmp = 0x20, "JMP" => [addr: Addr],
            /// JZ addr ; pop a, pc = addr if a == 0
            Jz = 0x21, "JZ" => [addr: Addr],
            /// JNZ addr ; pop a, pc = addr if a != 0
            Jnz = 0x22, "JNZ" => [addr: Addr],
            // =========================
            // Memory and Calls
            // =========================
            /// STORE slot ; pop a, data[slot] = a
            Store = 0x30, "STORE" => [slot: Slot],
            /// LOAD slot ; push data[slot]
            Load = 0x31, "LOAD" => [slot: Slot],
            /// CALL addr ; push return address on the call stack, pc = addr
            Call = 0x32, "CALL" => [addr: Addr],
            /// RET ; pc = pop from the call stack
            Ret = 0x33, "RET" => [],
            /// HALT ; stop execution
            Halt = 0xFF, "HALT" => [],
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $code:literal, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        /// VM opcode. The discriminant is the cell value stored in program memory.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $code,
            )*
        }

        impl TryFrom<Cell> for Opcode {
            type Error = InvalidOpcode;

            fn try_from(code: Cell) -> Result<Self, Self::Error> {
                match code {
                    $( $code => Ok(Opcode::$name), )*
                    _ => Err(InvalidOpcode(code)),
                }
            }
        }

        impl Opcode {
            /// Every opcode in code order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Number of immediate cells following the opcode (0 or 1).
            pub const fn operand_count(&self) -> usize {
                match self {
                    $( Opcode::$name => define_opcodes!(@count $( $field ),*), )*
                }
            }

            /// Looks up an opcode by its mnemonic.
            pub fn from_mnemonic(name: &str) -> Option<Opcode> {
                match name {
                    $( $mnemonic => Some(Opcode::$name), )*
                    _ => None,
                }
            }
        }
    };

    (@count) => { 0usize };
    (@count $( $field:ident ),+) => { <[()]>::len(&[ $( define_opcodes!(@unit $field) ),+ ]) };
    (@unit $field:ident) => { () };
}

for_each_opcode!(define_opcodes);

impl Opcode {
    /// Returns the numeric code stored in program memory.
    pub const fn code(&self) -> Cell {
        *self as u8 as Cell
    }

    /// Whether this opcode is followed by an immediate cell.
    pub const fn has_immediate(&self) -> bool {
        self.operand_count() > 0
    }

    /// Whether the immediate is a program address (jumps and calls).
    pub const fn takes_address(&self) -> bool {
        matches!(
            self,
            Opcode::Jmp | Opcode::Jz | Opcode::Jnz | Opcode::Call
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.mnemonic())
    }
}
