//! Error types for loading and executing programs.

use std::fmt::{self, Display};

use itertools::Itertools;

use crate::instruction::{Instruction, Operand, Region};

/// Reason a source line was rejected by the loader.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// A label name that is not an identifier.
    InvalidLabel(String),

    /// A label defined a second time.
    DuplicateLabel {
        label: String,
        /// Line of the first definition.
        first_line: usize,
    },

    /// A `:` anywhere else than directly after a lone label name.
    MisplacedColon,

    /// An opcode that is not an identifier.
    InvalidOpcode(String),

    /// A register or buffer reference without a name.
    InvalidOperand(String),

    /// A `0x` or `0d` token whose digits are not a hexadecimal `u16`.
    InvalidAddress(String),
}

impl Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseErrorKind::InvalidLabel(label) => write!(f, "invalid label name '{}'", label),
            ParseErrorKind::DuplicateLabel { label, first_line } => {
                write!(f, "label '{}' already defined on line {}", label, first_line)
            }
            ParseErrorKind::MisplacedColon => {
                write!(f, "a label must be alone on its line")
            }
            ParseErrorKind::InvalidOpcode(op) => write!(f, "invalid opcode '{}'", op),
            ParseErrorKind::InvalidOperand(op) => write!(f, "invalid operand '{}'", op),
            ParseErrorKind::InvalidAddress(op) => write!(f, "invalid address '{}'", op),
        }
    }
}

/// Error type containing the reason of the error and its location.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// The line number of the error location.
    pub line: usize,
    /// The column number of the error location.
    pub column: usize,
    pub kind: ParseErrorKind,
    rest: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, column: usize, kind: ParseErrorKind, source_line: &str) -> ParseError {
        let rest = source_line
            .chars()
            .skip(column.saturating_sub(1))
            .take(20)
            .collect();

        ParseError {
            line,
            column,
            kind,
            rest,
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "at line {} col {}: {}, at '{}'", self.line, self.column, self.kind, self.rest)
    }
}

impl std::error::Error for ParseError {}

/// Reason an instruction faulted at execution time.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// No handler is registered for the opcode.
    UnknownInstruction {
        mnemonic: String,
        /// Closest registered opcode name, if any is close enough.
        suggestion: Option<String>,
    },

    /// A jump target that is not in the label table.
    UnknownLabel(String),

    /// An operand of a kind the instruction does not accept.
    InvalidOperand {
        /// Position of the operand, starting from zero.
        index: usize,
        operand: Operand,
    },

    /// A write to something that is not a register or a memory cell.
    InvalidDestination(Operand),

    /// Wrong number of operands for the instruction.
    OperandCount {
        min: usize,
        max: usize,
        got: usize,
    },

    /// A memory access outside of `[0, capacity)`.
    AddressOutOfRange {
        region: Region,
        address: usize,
        capacity: usize,
    },

    /// A buffer used before `setbuffer`.
    UninitializedBuffer(String),

    /// A register read before its first write, with strict registers enabled.
    UninitializedRegister(String),

    /// A value that maps to no character. Builtin instructions only print bytes, which
    /// always map to one; handlers printing wider values report this.
    UnicodeRange(u32),
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::UnknownInstruction { mnemonic, suggestion: Some(suggestion) } => {
                write!(f, "unknown instruction '{}' (did you mean '{}'?)", mnemonic, suggestion)
            }
            ErrorKind::UnknownInstruction { mnemonic, suggestion: None } => {
                write!(f, "unknown instruction '{}'", mnemonic)
            }
            ErrorKind::UnknownLabel(label) => write!(f, "unknown label '{}'", label),
            ErrorKind::InvalidOperand { index, operand } => write!(
                f,
                "operand {} ('{}') can not be a {}",
                index + 1,
                operand,
                operand.kind()
            ),
            ErrorKind::InvalidDestination(operand) => {
                write!(f, "can not write to {} '{}'", operand.kind(), operand)
            }
            ErrorKind::OperandCount { min, max, got } if min == max => {
                write!(f, "expected {} operands, got {}", min, got)
            }
            ErrorKind::OperandCount { min, max, got } => {
                write!(f, "expected {} to {} operands, got {}", min, max, got)
            }
            ErrorKind::AddressOutOfRange { region, address, capacity } => write!(
                f,
                "{} address 0x{:x} out of range (capacity 0x{:x})",
                region, address, capacity
            ),
            ErrorKind::UninitializedBuffer(name) => write!(f, "buffer '{}' used before setbuffer", name),
            ErrorKind::UninitializedRegister(name) => write!(f, "register '{}' read before written", name),
            ErrorKind::UnicodeRange(value) => write!(f, "invalid unicode value {}", value),
        }
    }
}

/// An instruction executed before a fault.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub pc: usize,
    pub instruction: Instruction,
}

impl Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04} (line {}): {}", self.pc, self.instruction.line, self.instruction)
    }
}

/// Trailing record of a run, kept for reporting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// The last successfully executed instructions, oldest first.
    pub executed: Vec<TraceEntry>,

    /// Every piece of text written to the output during the run, flushes included.
    pub output: String,
}

/// A runtime fault together with the state needed to report it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionError {
    pub kind: ErrorKind,
    /// Program counter of the faulting instruction.
    pub pc: usize,
    pub instruction: Instruction,
    pub diagnostics: Diagnostics,
}

impl ExecutionError {
    /// Renders the error followed by the trailing instruction trace.
    pub fn report(&self) -> String {
        let trace = self.diagnostics.executed.iter()
            .map(|entry| format!("  {}", entry))
            .join("\n");

        format!("{}\nexecuted before the fault:\n{}", self, trace)
    }
}

impl Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} at {:04} (line {}): {}",
            self.kind, self.pc, self.instruction.line, self.instruction
        )
    }
}

impl std::error::Error for ExecutionError {}

#[test]
fn test_parse_error_display() {
    let line = "    foo: mov 0x10, 5";
    let err = ParseError::new(3, 8, ParseErrorKind::MisplacedColon, line);

    assert_eq!(
        err.to_string(),
        "at line 3 col 8: a label must be alone on its line, at ': mov 0x10, 5'"
    );
}

#[test]
fn test_error_kind_display() {
    let kind = ErrorKind::UnknownInstruction {
        mnemonic: "stdot".into(),
        suggestion: Some("stdout".into()),
    };

    assert_eq!(kind.to_string(), "unknown instruction 'stdot' (did you mean 'stdout'?)");

    let kind = ErrorKind::AddressOutOfRange {
        region: Region::Ram,
        address: 0x1000,
        capacity: 0x1000,
    };

    assert_eq!(kind.to_string(), "RAM address 0x1000 out of range (capacity 0x1000)");
}
