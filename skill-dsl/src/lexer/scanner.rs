//! Lexer implementation

use super::token::*;
use std::iter::Peekable;
use std::str::CharIndices;

/// Lexer for SKilL schema source.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            pos: 0,
        }
    }

    /// Tokenize the entire source into a vector of tokens.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        tokens
    }

    /// Get the next token from the source.
    fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let start_pos = self.pos;
        let start_line = self.line;
        let start_col = self.column;

        let kind = match self.peek_char() {
            None => TokenKind::Eof,
            Some(c) => match c {
                '{' => {
                    self.advance();
                    TokenKind::LBrace
                }
                '}' => {
                    self.advance();
                    TokenKind::RBrace
                }
                '[' => {
                    self.advance();
                    TokenKind::LBracket
                }
                ']' => {
                    self.advance();
                    TokenKind::RBracket
                }
                '(' => {
                    self.advance();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RParen
                }
                '<' => {
                    self.advance();
                    TokenKind::Lt
                }
                '>' => {
                    self.advance();
                    TokenKind::Gt
                }
                ':' => {
                    self.advance();
                    TokenKind::Colon
                }
                ';' => {
                    self.advance();
                    TokenKind::Semicolon
                }
                ',' => {
                    self.advance();
                    TokenKind::Comma
                }
                '=' => {
                    self.advance();
                    TokenKind::Eq
                }
                '@' => {
                    self.advance();
                    TokenKind::At
                }
                '!' => {
                    self.advance();
                    TokenKind::Bang
                }

                '/' => self.scan_block_comment(),

                '"' => self.scan_string(),

                '-' => {
                    self.advance();
                    if self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                        self.scan_number(start_pos)
                    } else {
                        TokenKind::Error("Unexpected character: -".to_string())
                    }
                }

                c if c.is_ascii_digit() => self.scan_number(start_pos),

                c if is_identifier_start(c) => self.scan_identifier(),

                c => {
                    self.advance();
                    TokenKind::Error(format!("Unexpected character: {}", c))
                }
            },
        };

        Token {
            kind,
            span: Span {
                start: start_pos,
                end: self.pos,
                line: start_line,
                column: start_col,
            },
        }
    }

    /// Scan an identifier or reserved word.
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;

        while let Some(c) = self.peek_char() {
            if is_identifier_continue(c) {
                self.advance();
            } else {
                break;
            }
        }

        let ident = &self.source[start..self.pos];

        // Reserved words are matched case-insensitively, like every other
        // name in the language.
        match ident.to_lowercase().as_str() {
            "include" => TokenKind::Include,
            "with" => TokenKind::With,
            "extends" => TokenKind::Extends,
            "auto" => TokenKind::Auto,
            "const" => TokenKind::Const,
            "map" => TokenKind::Map,
            "set" => TokenKind::Set,
            "list" => TokenKind::List,
            _ => TokenKind::Identifier(ident.to_string()),
        }
    }

    /// Scan a double-quoted string literal. No escape sequences.
    fn scan_string(&mut self) -> TokenKind {
        self.advance(); // consume opening quote
        let start = self.pos;

        loop {
            match self.peek_char() {
                None => return TokenKind::Error("Unterminated string".to_string()),
                Some('"') => {
                    let value = self.source[start..self.pos].to_string();
                    self.advance();
                    return TokenKind::String(value);
                }
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    /// Scan an integer (decimal or `0x` hex) or a float literal. `start`
    /// may point at a leading minus sign.
    fn scan_number(&mut self, start: usize) -> TokenKind {
        if self.peek_char() == Some('0') {
            self.advance();
            if matches!(self.peek_char(), Some('x') | Some('X')) {
                self.advance();
                let digits_start = self.pos;
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_hexdigit() {
                        self.advance();
                    } else {
                        break;
                    }
                }
                let digits = &self.source[digits_start..self.pos];
                if digits.is_empty() {
                    return TokenKind::Error("Hex literal with no digits".to_string());
                }
                let negative = self.source[start..].starts_with('-');
                return match u64::from_str_radix(digits, 16) {
                    Ok(value) => {
                        let value = value as i64;
                        TokenKind::Integer(if negative { value.wrapping_neg() } else { value })
                    }
                    Err(_) => TokenKind::Error(format!("Invalid hex literal: 0x{}", digits)),
                };
            }
        }

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        // A dot followed by digits makes this a float literal, used only in
        // restriction arguments.
        if self.peek_char() == Some('.')
            && self
                .peek_next_char()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
        {
            self.advance(); // .
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
            let text = &self.source[start..self.pos];
            return match text.parse::<f64>() {
                Ok(n) => TokenKind::Float(n),
                Err(_) => TokenKind::Error(format!("Invalid number: {}", text)),
            };
        }

        let text = &self.source[start..self.pos];
        match text.parse::<i64>() {
            Ok(n) => TokenKind::Integer(n),
            Err(_) => TokenKind::Error(format!("Invalid number: {}", text)),
        }
    }

    /// Scan a `/* ... */` block comment as a token. Line comments and
    /// whitespace never reach here; `skip_trivia` consumes them.
    fn scan_block_comment(&mut self) -> TokenKind {
        self.advance(); // /
        if self.peek_char() != Some('*') {
            return TokenKind::Error("Unexpected character: /".to_string());
        }
        self.advance(); // *
        let start = self.pos;

        loop {
            match self.peek_char() {
                None => return TokenKind::Error("Unterminated comment".to_string()),
                Some('*') if self.peek_next_char() == Some('/') => {
                    let text = clean_comment(&self.source[start..self.pos]);
                    self.advance();
                    self.advance();
                    return TokenKind::Comment(text);
                }
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip whitespace and `//` line comments. Block comments are tokens
    /// and are not skipped.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                Some('/') if self.peek_next_char() == Some('/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.source[self.pos..].char_indices();
        iter.next();
        iter.next().map(|(_, c)| c)
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((i, c)) = self.chars.next() {
            self.pos = i + c.len_utf8();
            self.column += 1;
            Some(c)
        } else {
            None
        }
    }
}

/// Identifier start: ASCII letter, underscore, or anything in
/// `\u{7F}..=\u{FFFF}`.
fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || ('\u{7F}'..='\u{FFFF}').contains(&c)
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || ('\u{7F}'..='\u{FFFF}').contains(&c)
}

/// Strip the decorative frame of a block comment: per-line leading `*`
/// and surrounding whitespace.
fn clean_comment(raw: &str) -> String {
    raw.lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).tokenize().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_declaration_shape() {
        let toks = kinds("Message { string text; }");
        assert_eq!(
            toks,
            vec![
                TokenKind::Identifier("Message".into()),
                TokenKind::LBrace,
                TokenKind::Identifier("string".into()),
                TokenKind::Identifier("text".into()),
                TokenKind::Semicolon,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn reserved_words_are_case_insensitive() {
        assert_eq!(
            kinds("CONST Auto extends"),
            vec![TokenKind::Const, TokenKind::Auto, TokenKind::Extends, TokenKind::Eof]
        );
    }

    #[test]
    fn scans_hex_and_decimal_integers() {
        assert_eq!(
            kinds("0xFF 42 -7"),
            vec![
                TokenKind::Integer(255),
                TokenKind::Integer(42),
                TokenKind::Integer(-7),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn block_comments_are_tokens_line_comments_are_not() {
        let toks = kinds("/* doc */ Message // trailing\n{}");
        assert_eq!(
            toks,
            vec![
                TokenKind::Comment("doc".into()),
                TokenKind::Identifier("Message".into()),
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_have_no_escapes() {
        assert_eq!(
            kinds(r#""sub\dir""#),
            vec![TokenKind::String(r"sub\dir".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn unicode_identifiers() {
        assert_eq!(
            kinds("größe"),
            vec![TokenKind::Identifier("größe".into()), TokenKind::Eof]
        );
    }
}
