use crate::utils::log::{Level, write_record};
use crate::virtual_machine::Cell;
use crate::virtual_machine::isa::Opcode;
use std::fmt;
use termcolor::{ColorChoice, StandardStream, WriteColor};

/// One executed instruction, reported after it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent {
    /// Address of the opcode cell.
    pub pc: usize,
    pub opcode: Opcode,
    /// Immediate operand, for opcodes that take one.
    pub operand: Option<Cell>,
    /// Operand stack top after execution.
    pub top: Option<Cell>,
    /// Program counter after execution.
    pub next_pc: usize,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>6}  {:<5}", self.pc, self.opcode)?;
        match self.operand {
            Some(operand) => write!(f, " {:<8}", operand)?,
            None => write!(f, " {:<8}", "")?,
        }
        match self.top {
            Some(top) => write!(f, " top={top}")?,
            None => write!(f, " top=-")?,
        }
        if self.next_pc != self.pc + 1 + self.opcode.operand_count() {
            write!(f, " -> {}", self.next_pc)?;
        }
        Ok(())
    }
}

/// Receives one [`TraceEvent`] per executed instruction.
///
/// Tracing is observation only: sinks cannot alter VM state.
pub trait Tracer {
    fn on_step(&mut self, event: &TraceEvent);
}

/// Discards every event.
pub struct NoTrace;

impl Tracer for NoTrace {
    #[inline(always)]
    fn on_step(&mut self, _event: &TraceEvent) {}
}

/// Writes each event as a trace-level log line.
///
/// Lines are written whatever the global minimum log level is; creating the
/// tracer is what enables them.
pub struct LogTracer<W: WriteColor = StandardStream> {
    out: W,
}

impl LogTracer {
    /// Tracer writing to stderr, coloured when it is a terminal.
    pub fn stderr() -> Self {
        Self::new(StandardStream::stderr(ColorChoice::Auto))
    }
}

impl<W: WriteColor> LogTracer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the underlying sink.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: WriteColor> Tracer for LogTracer<W> {
    fn on_step(&mut self, event: &TraceEvent) {
        let _ = write_record(&mut self.out, Level::Trace, &event.to_string());
    }
}

/// Collects events in execution order.
impl Tracer for Vec<TraceEvent> {
    fn on_step(&mut self, event: &TraceEvent) {
        self.push(*event);
    }
}
