//! Parser implementation

use super::ast::*;
use crate::lexer::*;

/// Parse one schema file into its AST.
pub fn parse(source: &str) -> Result<SkillFile, ParseError> {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.tokenize();
    let mut parser = Parser::new(tokens);
    parser.parse()
}

/// Recursive-descent parser over the token stream.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Parse `File ::= Include* Decl*`.
    pub fn parse(&mut self) -> Result<SkillFile, ParseError> {
        let mut includes = Vec::new();
        let mut declarations = Vec::new();

        // Include directives come first. A leading `with` can only be an
        // include here; inside a declaration it separates the super clause.
        while self.check(&TokenKind::Include) || self.check(&TokenKind::With) {
            self.advance();
            let mut any = false;
            while let TokenKind::String(path) = &self.current().kind {
                includes.push(path.clone());
                any = true;
                self.advance();
            }
            if !any {
                return Err(self.error("Expected file name after include"));
            }
        }

        while !self.check(&TokenKind::Eof) {
            declarations.push(self.parse_definition()?);
        }

        Ok(SkillFile {
            includes,
            declarations,
        })
    }

    /// Parse `Decl ::= Desc id ((":"|"with"|"extends") id)? "{" Field* "}"`.
    fn parse_definition(&mut self) -> Result<Definition, ParseError> {
        let description = self.parse_description()?;
        let span = self.current().span;
        let name = self.expect_identifier()?;

        let super_name = if self.check(&TokenKind::Colon)
            || self.check(&TokenKind::With)
            || self.check(&TokenKind::Extends)
        {
            self.advance();
            Some(self.expect_identifier()?)
        } else {
            None
        };

        self.expect(TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.error("Unclosed type body"));
            }
            body.push(self.parse_field()?);
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Definition {
            description,
            name,
            super_name,
            body,
            span,
        })
    }

    /// Parse `Desc ::= Comment? (Restriction|Hint)*`.
    fn parse_description(&mut self) -> Result<Description, ParseError> {
        let mut desc = Description::default();

        if let TokenKind::Comment(text) = &self.current().kind {
            desc.doc = Some(text.clone());
            self.advance();
        }

        loop {
            match &self.current().kind {
                TokenKind::At => {
                    self.advance();
                    desc.restrictions.push(self.parse_restriction()?);
                }
                TokenKind::Bang => {
                    self.advance();
                    let span = self.current().span;
                    let name = self.expect_identifier()?;
                    desc.hints.push(HintNode { name, span });
                }
                _ => break,
            }
        }

        Ok(desc)
    }

    /// Parse the remainder of `Restriction ::= "@" id ("(" args ")")?`.
    fn parse_restriction(&mut self) -> Result<RestrictionNode, ParseError> {
        let span = self.current().span;
        let name = self.expect_identifier()?;
        let mut args = Vec::new();

        if self.check(&TokenKind::LParen) {
            self.advance();
            while !self.check(&TokenKind::RParen) {
                if self.check(&TokenKind::Eof) {
                    return Err(self.error("Unclosed restriction argument list"));
                }
                args.push(self.parse_literal()?);
                if self.check(&TokenKind::Comma) {
                    self.advance();
                }
            }
            self.expect(TokenKind::RParen)?;
        }

        Ok(RestrictionNode { name, args, span })
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        match self.current().kind.clone() {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Literal::Int(n))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Literal::Float(n))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Literal::Str(s))
            }
            _ => Err(self.error("Expected integer, float or string literal")),
        }
    }

    /// Parse `Field ::= Desc (Const|Data) ";"`.
    fn parse_field(&mut self) -> Result<FieldDecl, ParseError> {
        let description = self.parse_description()?;
        let span = self.current().span;

        let body = if self.check(&TokenKind::Const) {
            self.advance();
            let type_expr = self.parse_type_expr()?;
            let name = self.expect_identifier()?;
            self.expect(TokenKind::Eq)?;
            let value = self.expect_integer()?;
            FieldBody::Constant {
                type_expr,
                name,
                value,
            }
        } else {
            let auto = if self.check(&TokenKind::Auto) {
                self.advance();
                if self.check(&TokenKind::Const) {
                    return Err(self.error("auto fields cannot be constant"));
                }
                true
            } else {
                false
            };
            let type_expr = self.parse_type_expr()?;
            let name = self.expect_identifier()?;
            FieldBody::Data {
                auto,
                type_expr,
                name,
            }
        };

        self.expect(TokenKind::Semicolon)?;

        Ok(FieldDecl {
            description,
            body,
            span,
        })
    }

    /// Parse a type expression. `set` and `list` take exactly one base
    /// type, `map` at least two; both constraints are enforced here.
    fn parse_type_expr(&mut self) -> Result<TypeExpr, ParseError> {
        match self.current().kind.clone() {
            TokenKind::Map => {
                self.advance();
                let bases = self.parse_base_list()?;
                if bases.len() < 2 {
                    return Err(self.error("map requires at least two base types"));
                }
                Ok(TypeExpr::Map { bases })
            }
            TokenKind::Set => {
                self.advance();
                let mut bases = self.parse_base_list()?;
                if bases.len() != 1 {
                    return Err(self.error("set takes exactly one base type"));
                }
                Ok(TypeExpr::Set {
                    base: bases.remove(0),
                })
            }
            TokenKind::List => {
                self.advance();
                let mut bases = self.parse_base_list()?;
                if bases.len() != 1 {
                    return Err(self.error("list takes exactly one base type"));
                }
                Ok(TypeExpr::List {
                    base: bases.remove(0),
                })
            }
            TokenKind::Identifier(base) => {
                self.advance();
                if self.check(&TokenKind::LBracket) {
                    self.advance();
                    if self.check(&TokenKind::RBracket) {
                        self.advance();
                        return Ok(TypeExpr::VarArray { base });
                    }
                    let length = self.expect_integer()?;
                    if length < 0 {
                        return Err(self.error("Array length cannot be negative"));
                    }
                    self.expect(TokenKind::RBracket)?;
                    return Ok(TypeExpr::FixedArray {
                        base,
                        length: length as u64,
                    });
                }
                Ok(TypeExpr::Base(base))
            }
            _ => Err(self.error("Expected a type")),
        }
    }

    /// Parse `"<" BaseType ("," BaseType)* ">"`.
    fn parse_base_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(TokenKind::Lt)?;
        let mut bases = vec![self.expect_identifier()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            bases.push(self.expect_identifier()?);
        }
        self.expect(TokenKind::Gt)?;
        Ok(bases)
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("Expected {:?}", kind)))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.current().kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("Expected identifier")),
        }
    }

    fn expect_integer(&mut self) -> Result<i64, ParseError> {
        match self.current().kind {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(n)
            }
            _ => Err(self.error("Expected integer literal")),
        }
    }

    fn error(&self, msg: &str) -> ParseError {
        let span = self.current().span;
        ParseError {
            message: msg.to_string(),
            line: span.line,
            column: span.column,
        }
    }
}
