//! Core virtual machine implementation.
//!
//! The VM fetches one cell at the program counter, decodes it into an
//! [`Opcode`], and executes it against an operand stack, a call stack and a
//! data memory. Arithmetic uses wrapping two's complement semantics so no
//! program can panic the host.

mod config;
mod trace;

pub use config::{DEFAULT_CALL_STACK_SIZE, DEFAULT_MEM_SIZE, DEFAULT_STACK_SIZE, VmConfig};
pub use trace::{LogTracer, NoTrace, TraceEvent, Tracer};

use crate::virtual_machine::Cell;
use crate::virtual_machine::errors::{LoadFailure, VMError};
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::memory::Memory;
use crate::virtual_machine::stack::{Stack, StackKind};
use std::fmt::Write;

/// Whether execution continues after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

/// Stack-based bytecode virtual machine.
///
/// Owns its memories and stacks exclusively; separate instances never share
/// state. All mutation goes through [`load`](VM::load), [`run`](VM::run),
/// [`step`](VM::step) and [`reset`](VM::reset).
pub struct VM {
    /// Loaded instruction stream.
    program: Memory,
    /// `STORE`/`LOAD` slots.
    data: Memory,
    /// Computation operands.
    operand_stack: Stack,
    /// Return addresses pushed by `CALL`.
    call_stack: Stack,
    /// Address of the next cell to fetch.
    pc: usize,
    /// Immediate fetched by the instruction currently executing.
    operand: Option<Cell>,
    verbose: bool,
}

impl Default for VM {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

impl VM {
    /// Creates a VM with zeroed memories and empty stacks sized by `config`.
    pub fn new(config: VmConfig) -> Self {
        Self {
            program: Memory::new(config.mem_size),
            data: Memory::new(config.mem_size),
            operand_stack: Stack::new(StackKind::Operand, config.stack_size),
            call_stack: Stack::new(StackKind::Call, config.call_stack_size),
            pc: 0,
            operand: None,
            verbose: config.verbose,
        }
    }

    /// Writes `image` into program memory and resets the program counter.
    ///
    /// Program memory is left untouched if the image is empty or larger than
    /// program memory. Stacks and data memory are not cleared; call
    /// [`reset`](VM::reset) first for a clean start.
    pub fn load(&mut self, image: &[Cell]) -> Result<(), VMError> {
        if image.is_empty() {
            return Err(VMError::LoadError(LoadFailure::Empty));
        }
        if image.len() > self.program.capacity() {
            return Err(VMError::LoadError(LoadFailure::TooLarge {
                cells: image.len(),
                capacity: self.program.capacity(),
            }));
        }
        self.program.load(image)?;
        self.pc = 0;
        Ok(())
    }

    /// Zeroes both memories, empties both stacks and rewinds the program counter.
    pub fn reset(&mut self) {
        self.program.reset();
        self.data.reset();
        self.operand_stack.clear();
        self.call_stack.clear();
        self.pc = 0;
        self.operand = None;
    }

    /// Executes until `HALT` or the first error.
    ///
    /// When the VM is verbose every instruction is written to stderr through
    /// [`LogTracer`].
    pub fn run(&mut self) -> Result<(), VMError> {
        if self.verbose {
            self.run_with(&mut LogTracer::stderr())
        } else {
            self.run_with(&mut NoTrace)
        }
    }

    /// Executes until `HALT` or the first error, reporting each instruction to `tracer`.
    pub fn run_with<T: Tracer + ?Sized>(&mut self, tracer: &mut T) -> Result<(), VMError> {
        while self.step_with(tracer)? == Flow::Continue {}
        Ok(())
    }

    /// Executes a single instruction.
    pub fn step(&mut self) -> Result<Flow, VMError> {
        if self.verbose {
            self.step_with(&mut LogTracer::stderr())
        } else {
            self.step_with(&mut NoTrace)
        }
    }

    /// Executes a single instruction, reporting it to `tracer` once it completes.
    pub fn step_with<T: Tracer + ?Sized>(&mut self, tracer: &mut T) -> Result<Flow, VMError> {
        let pc = self.pc;
        let code = self.fetch()?;
        let opcode =
            Opcode::try_from(code).map_err(|_| VMError::UnknownOpcode { code, pc })?;
        self.operand = None;

        let flow = self.exec(opcode, pc)?;

        tracer.on_step(&TraceEvent {
            pc,
            opcode,
            operand: self.operand,
            top: self.operand_stack.peek().ok(),
            next_pc: self.pc,
        });
        Ok(flow)
    }

    /// Address of the next cell to fetch.
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn operand_stack(&self) -> &Stack {
        &self.operand_stack
    }

    pub fn call_stack(&self) -> &Stack {
        &self.call_stack
    }

    pub fn program_memory(&self) -> &Memory {
        &self.program
    }

    pub fn data_memory(&self) -> &Memory {
        &self.data
    }

    /// Renders the operand stack top to bottom, one value per line.
    pub fn stack_dump(&self) -> String {
        let mut out = String::from("Stack (top to bottom):\n");
        let elements = self.operand_stack.elements();
        if elements.is_empty() {
            out.push_str("  (empty)\n");
        }
        for value in elements.iter().rev() {
            let _ = writeln!(out, "  {value}");
        }
        out
    }

    /// Reads the cell at the program counter and advances past it.
    ///
    /// Returns [`VMError::PCOutOfBounds`] if the program counter has left program memory.
    fn fetch(&mut self) -> Result<Cell, VMError> {
        let cell = self
            .program
            .get(self.pc)
            .map_err(|_| VMError::PCOutOfBounds {
                pc: Cell::try_from(self.pc).unwrap_or(Cell::MAX),
                size: self.program.capacity(),
            })?;
        self.pc += 1;
        Ok(cell)
    }

    /// Fetches the immediate operand of the current instruction.
    fn fetch_operand(&mut self) -> Result<Cell, VMError> {
        let value = self.fetch()?;
        self.operand = Some(value);
        Ok(value)
    }

    /// Validates a jump or return target against program memory.
    fn jump_target(&self, addr: Cell) -> Result<usize, VMError> {
        usize::try_from(addr)
            .ok()
            .filter(|&target| target < self.program.capacity())
            .ok_or(VMError::PCOutOfBounds {
                pc: addr,
                size: self.program.capacity(),
            })
    }

    /// Executes one decoded instruction. `pc` is the address of its opcode cell.
    fn exec(&mut self, opcode: Opcode, pc: usize) -> Result<Flow, VMError> {
        match opcode {
            // Stack
            Opcode::Nop => {}
            Opcode::Push => self.op_push()?,
            Opcode::Pop => self.op_pop()?,
            Opcode::Dup => self.operand_stack.dup()?,
            // Arithmetic
            Opcode::Add => self.binary(|a, b| a.wrapping_add(b))?,
            Opcode::Sub => self.binary(|a, b| a.wrapping_sub(b))?,
            Opcode::Mul => self.binary(|a, b| a.wrapping_mul(b))?,
            Opcode::Div => self.op_div(pc)?,
            Opcode::Cmp => self.binary(|a, b| Cell::from(a < b))?,
            // Bitwise
            Opcode::And => self.binary(|a, b| a & b)?,
            Opcode::Or => self.binary(|a, b| a | b)?,
            Opcode::Xor => self.binary(|a, b| a ^ b)?,
            Opcode::Not => self.op_not()?,
            Opcode::Shl => self.binary(|a, amount| a.wrapping_shl(amount as u32))?,
            Opcode::Shr => self.binary(|a, amount| a.wrapping_shr(amount as u32))?,
            // Control flow
            Opcode::Jmp => self.op_jmp()?,
            Opcode::Jz => self.op_branch(|a| a == 0)?,
            Opcode::Jnz => self.op_branch(|a| a != 0)?,
            // Memory and calls
            Opcode::Store => self.op_store()?,
            Opcode::Load => self.op_load()?,
            Opcode::Call => self.op_call()?,
            Opcode::Ret => self.op_ret()?,
            Opcode::Halt => return Ok(Flow::Halt),
        }
        Ok(Flow::Continue)
    }

    /// Pops `b`, then `a`, and pushes `f(a, b)`.
    fn binary(&mut self, f: impl FnOnce(Cell, Cell) -> Cell) -> Result<(), VMError> {
        let b = self.operand_stack.pop()?;
        let a = self.operand_stack.pop()?;
        self.operand_stack.push(f(a, b))
    }

    fn op_push(&mut self) -> Result<(), VMError> {
        let value = self.fetch_operand()?;
        self.operand_stack.push(value)
    }

    fn op_pop(&mut self) -> Result<(), VMError> {
        self.operand_stack.pop().map(drop)
    }

    fn op_div(&mut self, pc: usize) -> Result<(), VMError> {
        let b = self.operand_stack.pop()?;
        let a = self.operand_stack.pop()?;
        if b == 0 {
            return Err(VMError::DivisionByZero { pc });
        }
        self.operand_stack.push(a.wrapping_div(b))
    }

    fn op_not(&mut self) -> Result<(), VMError> {
        let a = self.operand_stack.pop()?;
        self.operand_stack.push(!a)
    }

    fn op_jmp(&mut self) -> Result<(), VMError> {
        let addr = self.fetch_operand()?;
        self.pc = self.jump_target(addr)?;
        Ok(())
    }

    /// `JZ`/`JNZ`: pops the condition before fetching the target.
    fn op_branch(&mut self, taken: impl FnOnce(Cell) -> bool) -> Result<(), VMError> {
        let a = self.operand_stack.pop()?;
        let addr = self.fetch_operand()?;
        if taken(a) {
            self.pc = self.jump_target(addr)?;
        }
        Ok(())
    }

    fn op_store(&mut self) -> Result<(), VMError> {
        let value = self.operand_stack.pop()?;
        let index = self.fetch_operand()?;
        let address = self.data.address_of(index)?;
        self.data.store(address, value)
    }

    fn op_load(&mut self) -> Result<(), VMError> {
        let index = self.fetch_operand()?;
        let address = self.data.address_of(index)?;
        let value = self.data.get(address)?;
        self.operand_stack.push(value)
    }

    fn op_call(&mut self) -> Result<(), VMError> {
        let addr = self.fetch_operand()?;
        let target = self.jump_target(addr)?;
        self.call_stack.push(self.pc as Cell)?;
        self.pc = target;
        Ok(())
    }

    fn op_ret(&mut self) -> Result<(), VMError> {
        let ret = self.call_stack.pop()?;
        self.pc = self.jump_target(ret)?;
        Ok(())
    }
}
