//! Fixed-capacity LIFO of cells.
//!
//! The VM owns two independent stacks: the operand stack used for computation
//! and the call stack holding return addresses. Both are preallocated at
//! construction and never grow; exceeding capacity is an error.

use crate::virtual_machine::Cell;
use crate::virtual_machine::errors::VMError;
use std::fmt;

/// Which of the VM's stacks an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackKind {
    Operand,
    Call,
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StackKind::Operand => "operand",
            StackKind::Call => "call",
        })
    }
}

/// Preallocated stack with an explicit live length.
///
/// `len` always equals the number of live elements; slots at or above `len`
/// hold stale values and are never observable.
#[derive(Debug, Clone)]
pub struct Stack {
    kind: StackKind,
    slots: Box<[Cell]>,
    len: usize,
}

impl Stack {
    /// Creates an empty stack holding at most `capacity` cells.
    pub fn new(kind: StackKind, capacity: usize) -> Self {
        Self {
            kind,
            slots: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Pushes `value` on top.
    ///
    /// Returns [`VMError::StackOverflow`] if the stack is full.
    pub fn push(&mut self, value: Cell) -> Result<(), VMError> {
        let capacity = self.slots.len();
        let slot = self.slots.get_mut(self.len).ok_or(VMError::StackOverflow {
            stack: self.kind,
            capacity,
        })?;
        *slot = value;
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the top value.
    ///
    /// Returns [`VMError::StackUnderflow`] if the stack is empty.
    pub fn pop(&mut self) -> Result<Cell, VMError> {
        let value = self.peek()?;
        self.len -= 1;
        Ok(value)
    }

    /// Returns the top value without removing it.
    ///
    /// Returns [`VMError::StackUnderflow`] if the stack is empty.
    pub fn peek(&self) -> Result<Cell, VMError> {
        self.len
            .checked_sub(1)
            .map(|top| self.slots[top])
            .ok_or(VMError::StackUnderflow { stack: self.kind })
    }

    /// Pushes another copy of the top value.
    ///
    /// Fails with [`VMError::StackUnderflow`] when empty and with
    /// [`VMError::StackOverflow`] when the copy does not fit; the stack is
    /// unchanged in both cases.
    pub fn dup(&mut self) -> Result<(), VMError> {
        let top = self.peek()?;
        self.push(top)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn kind(&self) -> StackKind {
        self.kind
    }

    /// Snapshot of the live elements, bottom to top.
    pub fn elements(&self) -> Vec<Cell> {
        self.slots[..self.len].to_vec()
    }

    /// Drops every element.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}
