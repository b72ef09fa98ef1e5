/// Default program and data memory size, in cells.
pub const DEFAULT_MEM_SIZE: usize = 1024 * 20;
/// Default operand stack capacity, in cells.
pub const DEFAULT_STACK_SIZE: usize = 1024 * 10;
/// Default call stack capacity, in return addresses.
pub const DEFAULT_CALL_STACK_SIZE: usize = 1024 * 10;

/// Construction-time sizing and behaviour of a [`VM`](super::VM).
///
/// Program memory and data memory share `mem_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Cells in each of program memory and data memory.
    pub mem_size: usize,
    /// Operand stack capacity.
    pub stack_size: usize,
    /// Call stack capacity.
    pub call_stack_size: usize,
    /// Emit a trace line per executed instruction.
    pub verbose: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            mem_size: DEFAULT_MEM_SIZE,
            stack_size: DEFAULT_STACK_SIZE,
            call_stack_size: DEFAULT_CALL_STACK_SIZE,
            verbose: false,
        }
    }
}

impl VmConfig {
    pub fn with_mem_size(mut self, mem_size: usize) -> Self {
        self.mem_size = mem_size;
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn with_call_stack_size(mut self, call_stack_size: usize) -> Self {
        self.call_stack_size = call_stack_size;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
