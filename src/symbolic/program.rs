use slog::Logger;

use crate::error::ParseError;
use crate::instruction::Instruction;
use crate::label_table::LabelTable;

/// A loaded program: instructions with the labels removed, and the label table.
///
/// Immutable for the duration of a run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub labels: LabelTable,
}

impl Program {
    /// Loads a program from source text.
    ///
    /// Labels may be referenced before they are defined; unknown labels are only
    /// reported when a jump to them is executed.
    pub fn parse(input: &str) -> Result<Program, ParseError> {
        super::parser::parse_program(input, None)
    }

    /// Same as [Program::parse], tracing every instruction and label to `logger`.
    pub fn parse_with_logger(input: &str, logger: Logger) -> Result<Program, ParseError> {
        super::parser::parse_program(input, logger)
    }

    /// Number of instructions. Also the "past the end" index where execution halts.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }
}
