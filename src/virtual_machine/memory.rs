//! Fixed-capacity cell memory.
//!
//! Used for both program memory (the loaded instruction stream) and data
//! memory (`STORE`/`LOAD` slots). Every access is bounds checked against
//! `[0, capacity)`.

use crate::virtual_machine::Cell;
use crate::virtual_machine::errors::VMError;

/// Zero-initialised array of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    cells: Box<[Cell]>,
}

impl Memory {
    /// Creates a zero-filled memory of `capacity` cells.
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![0; capacity].into_boxed_slice(),
        }
    }

    /// Copies `values` to the start of memory and zeroes the rest.
    ///
    /// Returns [`VMError::CapacityError`] without writing anything if
    /// `values` does not fit.
    pub fn load(&mut self, values: &[Cell]) -> Result<(), VMError> {
        if values.len() > self.cells.len() {
            return Err(VMError::CapacityError {
                requested: values.len(),
                capacity: self.cells.len(),
            });
        }
        let (prefix, rest) = self.cells.split_at_mut(values.len());
        prefix.copy_from_slice(values);
        rest.fill(0);
        Ok(())
    }

    /// Sets every cell to zero.
    pub fn reset(&mut self) {
        self.cells.fill(0);
    }

    /// Returns the cell at `address`.
    ///
    /// Returns [`VMError::OutOfBounds`] if `address >= capacity`.
    pub fn get(&self, address: usize) -> Result<Cell, VMError> {
        self.cells
            .get(address)
            .copied()
            .ok_or_else(|| self.out_of_bounds(address))
    }

    /// Writes `value` at `address`.
    ///
    /// Returns [`VMError::OutOfBounds`] if `address >= capacity`.
    pub fn store(&mut self, address: usize, value: Cell) -> Result<(), VMError> {
        if address >= self.cells.len() {
            return Err(self.out_of_bounds(address));
        }
        self.cells[address] = value;
        Ok(())
    }

    /// Converts a cell-valued index into an address, rejecting negatives and
    /// values past the end.
    pub fn address_of(&self, index: Cell) -> Result<usize, VMError> {
        usize::try_from(index)
            .ok()
            .filter(|&address| address < self.cells.len())
            .ok_or(VMError::OutOfBounds {
                address: index,
                size: self.cells.len(),
            })
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Read-only view of every cell.
    pub fn as_slice(&self) -> &[Cell] {
        &self.cells
    }

    fn out_of_bounds(&self, address: usize) -> VMError {
        VMError::OutOfBounds {
            address: Cell::try_from(address).unwrap_or(Cell::MAX),
            size: self.cells.len(),
        }
    }
}
