//! Line oriented loader for the symbolic assembly format.
//!
//! ```text
//! ; comment
//! label:
//!     opcode operand, operand   ; trailing comment
//! ```

use logos::{Logos, Span};
use slog::{o, trace, Discard, Logger};

use crate::error::{ParseError, ParseErrorKind};
use crate::instruction::{Instruction, OpCode};
use crate::label_table::LabelTable;
use crate::operand::classify;

use super::program::Program;
use super::token::{is_identifier, Token};

/// A single classified source line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line<'a> {
    /// Empty or comment-only line.
    Blank,

    /// `name:`
    Label(&'a str),

    Instruction(Instruction),
}

fn column(line: &str, span: &Span) -> usize {
    line[..span.start].chars().count() + 1
}

/// Parses one line of source.
///
/// # Parameters
/// - `number`: 1-based line number, stored in the instruction and in errors.
/// - `line`: the line without its terminating newline.
pub fn parse_line(number: usize, line: &str) -> Result<Line, ParseError> {
    let tokens: Vec<(Token, Span)> = Token::lexer(line).spanned().collect();

    let error = |span: &Span, kind| ParseError::new(number, column(line, span), kind, line);

    match tokens.as_slice() {
        [] => Ok(Line::Blank),
        [(Token::Word(name), span), (Token::Colon, _)] => {
            if is_identifier(name) {
                Ok(Line::Label(*name))
            } else {
                Err(error(span, ParseErrorKind::InvalidLabel(name.to_string())))
            }
        }
        [(Token::Word(opcode), span), rest @ ..] => {
            if !is_identifier(opcode) {
                return Err(error(span, ParseErrorKind::InvalidOpcode(opcode.to_string())));
            }

            let mut operands = Vec::new();

            for (token, span) in rest {
                match token {
                    Token::Separator => (),
                    Token::Word(word) => {
                        let operand = classify(word).map_err(|kind| error(span, kind))?;
                        operands.push(operand);
                    }
                    Token::Colon => return Err(error(span, ParseErrorKind::MisplacedColon)),
                    Token::Error => {
                        let text = line[span.clone()].to_string();
                        return Err(error(span, ParseErrorKind::InvalidOperand(text)));
                    }
                }
            }

            Ok(Line::Instruction(Instruction {
                mnemonic: opcode.to_lowercase(),
                operands,
                line: number,
            }))
        }
        [(Token::Colon, span), ..] => Err(error(span, ParseErrorKind::MisplacedColon)),
        [(token, span), ..] => Err(error(span, ParseErrorKind::InvalidOpcode(token.to_string()))),
    }
}

/// Parses a whole program. Stops at the first malformed line.
pub fn parse_program<L>(input: &str, logger: L) -> Result<Program, ParseError>
where
    L: Into<Option<Logger>>,
{
    let logger = logger
        .into()
        .unwrap_or(Logger::root(Discard, o!()))
        .new(o!("stage" => "loading"));

    let mut instructions = Vec::new();
    let mut labels = LabelTable::new();

    for (index, line) in input.lines().enumerate() {
        let number = index + 1;

        match parse_line(number, line)? {
            Line::Blank => (),
            Line::Label(name) => {
                trace!(logger, "define label"; "label" => name, "index" => instructions.len());

                if let Err(first) = labels.define(name, instructions.len(), number) {
                    let column = line.find(name).map(|i| i + 1).unwrap_or(1);
                    let kind = ParseErrorKind::DuplicateLabel {
                        label: name.to_string(),
                        first_line: first.line,
                    };

                    return Err(ParseError::new(number, column, kind, line));
                }
            }
            Line::Instruction(instruction) => {
                trace!(logger, "append instruction";
                       "index" => instructions.len(),
                       "instruction" => %instruction,
                       "builtin" => OpCode::from_name(&instruction.mnemonic).is_some());

                instructions.push(instruction);
            }
        }
    }

    Ok(Program {
        instructions,
        labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Operand;

    #[test]
    fn test_parse_instruction_line() {
        let line = parse_line(4, "    MOV 0x10,   5 ; comment").unwrap();

        assert_eq!(line, Line::Instruction(Instruction {
            mnemonic: "mov".into(),
            operands: vec![Operand::RamAddress(0x10), Operand::Immediate(5)],
            line: 4,
        }));
    }

    #[test]
    fn test_separators_collapse() {
        let line = parse_line(1, "addbuffer 0bp ,, 65").unwrap();
        let expected = parse_line(1, "addbuffer 0bp 65").unwrap();

        assert_eq!(line, expected);
    }

    #[test]
    fn test_parse_blank_and_comment() {
        assert_eq!(parse_line(1, ""), Ok(Line::Blank));
        assert_eq!(parse_line(1, "   \t"), Ok(Line::Blank));
        assert_eq!(parse_line(1, "; only a comment"), Ok(Line::Blank));
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_line(1, "start:"), Ok(Line::Label("start")));
        assert_eq!(parse_line(1, "  start :  ; entry"), Ok(Line::Label("start")));

        let err = parse_line(2, "1st:").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidLabel("1st".into()));
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_line(3, "start: ret").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MisplacedColon);
        assert_eq!((err.line, err.column), (3, 6));

        let err = parse_line(1, "mov 0xzz, 1").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidAddress("0xzz".into()));
        assert_eq!(err.column, 5);

        let err = parse_line(1, ", mov").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidOpcode(",".into()));

        let err = parse_line(1, "0x10 mov").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidOpcode("0x10".into()));
    }

    #[test]
    fn test_labels_point_at_next_instruction() {
        let program = parse_program(
            "jmp foo\nstdout 1\nfoo:\nbar:\nstdout 2\nend:\n",
            None,
        ).unwrap();

        assert_eq!(program.instructions.len(), 3);
        assert_eq!(program.labels.get("foo"), Some(2));
        assert_eq!(program.labels.get("bar"), Some(2));
        assert_eq!(program.labels.get("end"), Some(3));
    }

    #[test]
    fn test_duplicate_label() {
        let err = parse_program("a:\nnop\n  a:\n", None).unwrap_err();

        assert_eq!(err.kind, ParseErrorKind::DuplicateLabel {
            label: "a".into(),
            first_line: 1,
        });
        assert_eq!((err.line, err.column), (3, 3));
    }
}
