//! Lexer token types

use serde::{Deserialize, Serialize};

/// Token kinds for the SKilL schema language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Reserved words
    Include,
    With,
    Extends,
    Auto,
    Const,
    Map,
    Set,
    List,

    // Punctuation
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Lt,
    Gt,
    Colon,
    Semicolon,
    Comma,
    Eq,
    At,
    Bang,

    // Literals
    Identifier(String),
    Integer(i64),
    Float(f64),
    String(String),

    /// Block comment text. Comments are first-class: the parser attaches
    /// them to the following declaration or field as documentation.
    Comment(String),

    // Special
    Eof,
    Error(String),
}

/// Source location span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}
