//! Tokens and a tokenizer for a single source line.

use logos::Logos;

use std::fmt;

/// Enumeration of all tokens of the source format.
#[derive(Logos, Debug, PartialEq, Clone, Copy)]
pub enum Token<'a> {
    /// Errorneous token that could not be interpreted as any of the other variants.
    #[error]
    #[regex(r"[ \t\r\n\f]+", logos::skip)]
    #[regex(r";[^\n]*", logos::skip)]
    Error,

    /// Token (`,`) that separates operands. Whitespace separates them as well.
    #[token(",")]
    Separator,

    /// Token (`:`) that ends a label definition.
    #[token(":")]
    Colon,

    /// An opcode, a label name or an operand.
    #[regex(r"[^ \t\r\n\f,;:]+", logos::Lexer::slice)]
    Word(&'a str),
}

impl<'t> fmt::Display for Token<'t> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Error => write!(f, "<error>"),
            Token::Separator => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Word(word) => write!(f, "{}", word),
        }
    }
}

/// True for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => (),
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[test]
fn test_tokenize_line() {
    let tokens: Vec<_> = Token::lexer("  mov 0x10,5 ; set it").collect();

    assert_eq!(tokens, vec![
        Token::Word("mov"),
        Token::Word("0x10"),
        Token::Separator,
        Token::Word("5"),
    ]);

    let tokens: Vec<_> = Token::lexer("loop :").collect();
    assert_eq!(tokens, vec![Token::Word("loop"), Token::Colon]);
}

#[test]
fn test_identifier() {
    assert!(is_identifier("print_hello"));
    assert!(is_identifier("_x1"));
    assert!(!is_identifier("1abc"));
    assert!(!is_identifier("a-b"));
    assert!(!is_identifier(""));
}
