use crate::virtual_machine::Cell;
use crate::virtual_machine::stack::StackKind;
use stackvm_derive::Error;

/// Reasons a program image is rejected before it reaches program memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadFailure {
    /// The image holds no cells.
    #[error("image is empty")]
    Empty,
    /// Byte length is not a whole number of cells.
    #[error("image length {len} is not a multiple of {cell_size} bytes")]
    Misaligned { len: usize, cell_size: usize },
    /// More cells than program memory can hold.
    #[error("image holds {cells} cells but program memory holds {capacity}")]
    TooLarge { cells: usize, capacity: usize },
}

/// A cell that does not name any opcode.
///
/// Returned by `Opcode::try_from`; the VM attaches the program counter when
/// it reports [`VMError::UnknownOpcode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown opcode {0:#x}")]
pub struct InvalidOpcode(pub Cell);

/// Errors that can occur while loading, assembling or executing a program.
///
/// Every variant is fatal to the call that produced it; the VM never retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    /// Program image rejected by `load`.
    #[error("load error: {0}")]
    LoadError(LoadFailure),
    /// Bulk write larger than the target memory.
    #[error("cannot write {requested} cells into memory of {capacity} cells")]
    CapacityError { requested: usize, capacity: usize },
    /// Memory address outside `[0, size)`.
    #[error("memory address {address} out of bounds (size {size})")]
    OutOfBounds { address: Cell, size: usize },
    /// Push onto a full stack.
    #[error("{stack} stack overflow (capacity {capacity})")]
    StackOverflow { stack: StackKind, capacity: usize },
    /// Pop, peek or dup on an empty stack.
    #[error("{stack} stack underflow")]
    StackUnderflow { stack: StackKind },
    /// Fetched cell does not name an opcode.
    #[error("unknown opcode {code:#x} at pc {pc}")]
    UnknownOpcode { code: Cell, pc: usize },
    /// DIV with a zero divisor.
    #[error("division by zero at pc {pc}")]
    DivisionByZero { pc: usize },
    /// Program counter outside program memory.
    #[error("program counter {pc} out of bounds (size {size})")]
    PCOutOfBounds { pc: Cell, size: usize },
    /// File read or write failure in the image wrapper.
    #[error("io error on {path}: {reason}")]
    Io { path: String, reason: String },
    /// Assembly source error with line context.
    #[error("line {line}: {message}")]
    Assembly { line: usize, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_interpolates_named_fields() {
        let err = VMError::StackOverflow {
            stack: StackKind::Call,
            capacity: 4,
        };
        assert_eq!(err.to_string(), "call stack overflow (capacity 4)");
    }

    #[test]
    fn display_wraps_load_failure() {
        let err = VMError::LoadError(LoadFailure::Misaligned {
            len: 6,
            cell_size: 8,
        });
        assert_eq!(
            err.to_string(),
            "load error: image length 6 is not a multiple of 8 bytes"
        );
    }

    #[test]
    fn display_formats_opcode_as_hex() {
        let err = VMError::UnknownOpcode { code: 0x99, pc: 3 };
        assert_eq!(err.to_string(), "unknown opcode 0x99 at pc 3");
    }

    #[test]
    fn invalid_opcode_has_no_pc() {
        assert_eq!(InvalidOpcode(0xFE).to_string(), "unknown opcode 0xfe");
    }

    #[test]
    fn implements_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&VMError::DivisionByZero { pc: 0 });
        assert_error(&LoadFailure::Empty);
        assert_error(&InvalidOpcode(0x05));
    }
}
