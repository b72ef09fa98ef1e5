//! Assembly language parser and bytecode compiler.
//!
//! Converts human-readable assembly source into program cells ready for
//! [`VM::load`](crate::virtual_machine::vm::VM::load), and renders cells back
//! into text with [`disassemble`].
//!
//! # Syntax
//!
//! ```text
//! label:                 # optional, on its own line or before an instruction
//! INSTRUCTION [operand]  # optional comment
//! ```
//!
//! - Instructions are uppercase (e.g., `PUSH`, `JNZ`)
//! - Operands are decimal or `0x` hex integers, optionally negative
//! - Jump and call operands may name a label instead of an address
//! - Comments start with `#`
//! - Commas are ignored

use crate::virtual_machine::Cell;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = '#';
const LABEL_SUFFIX: char = ':';

/// Formats a compiler-style diagnostic for assembly failures.
fn render_assembly_diagnostic(file: &str, source: &str, line: usize, message: &str) -> String {
    let mut diag = String::new();
    let _ = writeln!(diag, "{message}");
    let _ = writeln!(diag, " --> {file}:{line}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, raw_line.trim_end_matches('\r'));
        let _ = write!(diag, "  |");
    }

    diag
}

/// Logs a diagnostic for assembly errors; other errors are logged as-is.
fn log_assembly_error(file: &str, source: &str, err: &VMError) {
    match err {
        VMError::Assembly { line, message } => {
            crate::error!(
                "{}",
                render_assembly_diagnostic(file, source, *line, message)
            );
        }
        _ => crate::error!("{err}"),
    }
}

/// Label table built during the first pass.
#[derive(Debug, Default)]
struct AsmContext {
    /// Label names mapped to absolute cell addresses.
    labels: HashMap<String, usize>,
}

impl AsmContext {
    /// Registers a label at the given cell address.
    fn define_label(&mut self, name: &str, address: usize, line: usize) -> Result<(), VMError> {
        if self.labels.contains_key(name) {
            return Err(asm_error(line, format!("duplicate label `{name}`")));
        }
        self.labels.insert(name.to_string(), address);
        Ok(())
    }

    /// Resolves a label to its cell address.
    fn resolve_label(&self, name: &str, line: usize) -> Result<usize, VMError> {
        self.labels
            .get(name)
            .copied()
            .ok_or_else(|| asm_error(line, format!("undefined label `{name}`")))
    }
}

/// One instruction awaiting encoding in the second pass.
#[derive(Debug)]
struct PendingInstr<'a> {
    /// 1-based source line.
    line: usize,
    opcode: Opcode,
    operand: Option<&'a str>,
}

fn asm_error(line: usize, message: impl Into<String>) -> VMError {
    VMError::Assembly {
        line,
        message: message.into(),
    }
}

/// Splits a line into whitespace/comma separated tokens, dropping any comment.
fn tokenize(line: &str) -> Vec<&str> {
    let code = line.split(COMMENT_CHAR).next().unwrap_or("");
    code.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|tok| !tok.is_empty())
        .collect()
}

/// Checks if a token is a label definition (ends with `:`).
fn is_label_def(tok: &str) -> bool {
    tok.ends_with(LABEL_SUFFIX) && tok.len() > 1
}

/// Extracts the label name from a label definition token.
fn label_name(tok: &str) -> &str {
    &tok[..tok.len() - 1]
}

/// Label names start with a letter or `_` and continue with alphanumerics or `_`.
fn is_valid_label(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses a decimal or `0x` hex integer, with an optional leading `-`.
fn parse_int(tok: &str) -> Option<Cell> {
    let (negative, digits) = match tok.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, tok),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u64>().ok()?,
    };
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        Cell::try_from(magnitude).ok()
    }
}

/// Encodes an immediate operand, resolving labels for jump and call opcodes.
fn parse_operand(
    ctx: &AsmContext,
    opcode: Opcode,
    tok: &str,
    line: usize,
) -> Result<Cell, VMError> {
    if let Some(value) = parse_int(tok) {
        return Ok(value);
    }
    if opcode.takes_address() && is_valid_label(tok) {
        let address = ctx.resolve_label(tok, line)?;
        return Cell::try_from(address)
            .map_err(|_| asm_error(line, format!("label `{tok}` address does not fit a cell")));
    }
    Err(asm_error(
        line,
        format!("invalid operand `{tok}` for {opcode}"),
    ))
}

/// Performs two-pass assembly.
///
/// Pass 1: tokenizes all lines, checks mnemonics and arity, and records label
/// positions as absolute cell addresses.
///
/// Pass 2: resolves operands and emits cells.
fn assemble_lines(source: &str) -> Result<Vec<Cell>, VMError> {
    let mut ctx = AsmContext::default();
    let mut pending: Vec<PendingInstr> = Vec::new();
    let mut address = 0usize;

    for (line_no, line) in source.lines().enumerate() {
        let line_no = line_no + 1;
        let mut tokens = tokenize(line).into_iter().peekable();

        // Leading label definitions
        while let Some(tok) = tokens.next_if(|tok| is_label_def(tok)) {
            let name = label_name(tok);
            if !is_valid_label(name) {
                return Err(asm_error(line_no, format!("invalid label name `{name}`")));
            }
            ctx.define_label(name, address, line_no)?;
        }

        let Some(mnemonic) = tokens.next() else {
            continue;
        };
        let opcode = Opcode::from_mnemonic(mnemonic)
            .ok_or_else(|| asm_error(line_no, format!("unknown instruction `{mnemonic}`")))?;

        let operands: Vec<&str> = tokens.collect();
        if operands.len() != opcode.operand_count() {
            return Err(asm_error(
                line_no,
                format!(
                    "{opcode} expects {} operand(s), found {}",
                    opcode.operand_count(),
                    operands.len()
                ),
            ));
        }

        address += 1 + opcode.operand_count();
        pending.push(PendingInstr {
            line: line_no,
            opcode,
            operand: operands.first().copied(),
        });
    }

    let mut cells = Vec::with_capacity(address);
    for instr in pending {
        cells.push(instr.opcode.code());
        if let Some(tok) = instr.operand {
            cells.push(parse_operand(&ctx, instr.opcode, tok, instr.line)?);
        }
    }
    Ok(cells)
}

/// Assembles a full source string into program cells.
pub fn assemble_source(source: &str) -> Result<Vec<Cell>, VMError> {
    assemble_source_with_name(source, "<source>")
}

/// Assembles source with an associated filename for error diagnostics.
fn assemble_source_with_name(source: &str, source_name: &str) -> Result<Vec<Cell>, VMError> {
    let result = assemble_lines(source);
    if let Err(err) = &result {
        log_assembly_error(source_name, source, err);
    }
    result
}

/// Convenience: assemble directly from file path
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Vec<Cell>, VMError> {
    let path_ref = path.as_ref();
    let source = fs::read_to_string(path_ref).map_err(|e| VMError::Io {
        path: path_ref.display().to_string(),
        reason: e.to_string(),
    })?;
    assemble_source_with_name(&source, &path_ref.display().to_string())
}

/// Renders program cells as assembly text, one instruction per line prefixed
/// by its address.
///
/// Cells that do not decode are shown as `.cell <value>`; an immediate cut
/// off by the end of the slice is shown as `<missing>`.
pub fn disassemble(cells: &[Cell]) -> String {
    let mut out = String::new();
    let mut pc = 0usize;

    while pc < cells.len() {
        let code = cells[pc];
        let _ = write!(out, "{pc:04}: ");
        match Opcode::try_from(code) {
            Ok(opcode) if opcode.has_immediate() => match cells.get(pc + 1) {
                Some(operand) => {
                    let _ = writeln!(out, "{opcode} {operand}");
                    pc += 2;
                }
                None => {
                    let _ = writeln!(out, "{opcode} <missing>");
                    pc += 1;
                }
            },
            Ok(opcode) => {
                let _ = writeln!(out, "{opcode}");
                pc += 1;
            }
            Err(_) => {
                let _ = writeln!(out, ".cell {code:#x}");
                pc += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_decimal_and_hex() {
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-7"), Some(-7));
        assert_eq!(parse_int("0xFF"), Some(255));
        assert_eq!(parse_int("0x1a"), Some(26));
        assert_eq!(parse_int("-0x10"), Some(-16));
        assert_eq!(parse_int("9223372036854775807"), Some(i64::MAX));
        assert_eq!(parse_int("-9223372036854775808"), Some(i64::MIN));
    }

    #[test]
    fn parse_int_rejects_garbage() {
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("-"), None);
        assert_eq!(parse_int("0x"), None);
        assert_eq!(parse_int("12ab"), None);
        assert_eq!(parse_int("loop"), None);
        assert_eq!(parse_int("9223372036854775808"), None);
    }

    #[test]
    fn assemble_empty_source() {
        assert!(assemble_source("").unwrap().is_empty());
        assert!(assemble_source("\n   \n# only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn assemble_add_program() {
        let cells = assemble_source(
            r#"
                PUSH 5
                PUSH 3   # second operand
                ADD
                HALT
            "#,
        )
        .unwrap();
        assert_eq!(cells, vec![0x01, 5, 0x01, 3, 0x10, 0xFF]);
    }

    #[test]
    fn commas_and_tabs_are_separators() {
        let cells = assemble_source("PUSH,\t-1\nHALT").unwrap();
        assert_eq!(cells, vec![0x01, -1, 0xFF]);
    }

    #[test]
    fn labels_resolve_to_absolute_addresses() {
        let cells = assemble_source(
            r#"
                PUSH 0
                JZ done
                PUSH 1
            done:
                HALT
            "#,
        )
        .unwrap();
        assert_eq!(cells, vec![0x01, 0x00, 0x21, 0x06, 0x01, 0x01, 0xFF]);
    }

    #[test]
    fn forward_and_backward_labels() {
        let cells = assemble_source(
            r#"
            start: CALL sub
                   JMP start
            sub:   RET
            "#,
        )
        .unwrap();
        assert_eq!(cells, vec![0x32, 4, 0x20, 0, 0x33]);
    }

    #[test]
    fn several_labels_on_one_address() {
        let cells = assemble_source("a: b:\nJMP b\nJMP a").unwrap();
        assert_eq!(cells, vec![0x20, 0, 0x20, 0]);
    }

    #[test]
    fn duplicate_label_is_error() {
        let err = assemble_source("x:\nNOP\nx: HALT").unwrap_err();
        assert_eq!(
            err,
            VMError::Assembly {
                line: 3,
                message: "duplicate label `x`".into()
            }
        );
    }

    #[test]
    fn undefined_label_is_error() {
        let err = assemble_source("NOP\nJMP nowhere").unwrap_err();
        assert_eq!(
            err,
            VMError::Assembly {
                line: 2,
                message: "undefined label `nowhere`".into()
            }
        );
    }

    #[test]
    fn labels_only_for_address_operands() {
        let err = assemble_source("here:\nPUSH here").unwrap_err();
        assert!(matches!(err, VMError::Assembly { line: 2, .. }));
    }

    #[test]
    fn invalid_label_name() {
        assert!(matches!(
            assemble_source("1abc: HALT"),
            Err(VMError::Assembly { line: 1, .. })
        ));
    }

    #[test]
    fn unknown_mnemonic_reports_line() {
        let err = assemble_source("PUSH 1\n\nMOD").unwrap_err();
        assert_eq!(
            err,
            VMError::Assembly {
                line: 3,
                message: "unknown instruction `MOD`".into()
            }
        );
    }

    #[test]
    fn mnemonics_are_case_sensitive() {
        assert!(assemble_source("push 1").is_err());
    }

    #[test]
    fn arity_is_checked() {
        assert_eq!(
            assemble_source("PUSH").unwrap_err(),
            VMError::Assembly {
                line: 1,
                message: "PUSH expects 1 operand(s), found 0".into()
            }
        );
        assert_eq!(
            assemble_source("ADD 1").unwrap_err(),
            VMError::Assembly {
                line: 1,
                message: "ADD expects 0 operand(s), found 1".into()
            }
        );
        assert!(assemble_source("STORE 1 2").is_err());
    }

    #[test]
    fn invalid_operand() {
        assert_eq!(
            assemble_source("STORE x1").unwrap_err(),
            VMError::Assembly {
                line: 1,
                message: "invalid operand `x1` for STORE".into()
            }
        );
    }

    #[test]
    fn every_mnemonic_assembles_to_its_code() {
        for &opcode in Opcode::ALL {
            let source = if opcode.has_immediate() {
                format!("{} 0", opcode.mnemonic())
            } else {
                opcode.mnemonic().to_string()
            };
            let cells = assemble_source(&source).unwrap();
            assert_eq!(cells[0], opcode.code());
            assert_eq!(cells.len(), 1 + opcode.operand_count());
        }
    }

    #[test]
    fn assemble_file_reads_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog.asm");
        fs::write(&path, "PUSH 0x0A\nSTORE 0\nHALT\n").unwrap();
        assert_eq!(assemble_file(&path).unwrap(), vec![0x01, 10, 0x30, 0, 0xFF]);
    }

    #[test]
    fn assemble_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            assemble_file(dir.path().join("nope.asm")),
            Err(VMError::Io { .. })
        ));
    }

    #[test]
    fn disassemble_lists_addresses() {
        let text = disassemble(&[0x01, 5, 0x01, 3, 0x10, 0xFF]);
        assert_eq!(text, "0000: PUSH 5\n0002: PUSH 3\n0004: ADD\n0005: HALT\n");
    }

    #[test]
    fn disassemble_unknown_and_truncated() {
        let text = disassemble(&[0x99, 0x01]);
        assert_eq!(text, "0000: .cell 0x99\n0001: PUSH <missing>\n");
    }

    #[test]
    fn disassemble_output_reassembles() {
        let cells = vec![0x01, 7, 0x21, 6, 0x03, 0x33, 0xFF];
        let source: String = disassemble(&cells)
            .lines()
            .map(|l| l.split_once(": ").map(|(_, instr)| instr).unwrap_or(l))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(assemble_source(&source).unwrap(), cells);
    }

    #[test]
    fn diagnostic_shows_source_line() {
        let diag = render_assembly_diagnostic("prog.asm", "NOP\nBAD 1\n", 2, "unknown");
        assert!(diag.starts_with("unknown\n --> prog.asm:2\n"));
        assert!(diag.contains("   2 | BAD 1"));
    }
}
