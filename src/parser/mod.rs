pub mod ast;
mod expr;

use std::error::Error;
use std::fmt;

use crate::lexer::token::{Token, TokenKind};
use ast::{Expr, Param, Program, Stmt, TypeAnnotation};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, token: &Token) -> Self {
        Self {
            message: message.into(),
            line: token.line,
            column: token.column,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parse error at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl Error for ParseError {}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();

        self.skip_newlines();
        while !self.is_at_end() {
            if self.check_kind(&TokenKind::Indent) {
                return Err(ParseError::new("unexpected indent", self.peek()));
            }
            statements.push(self.statement()?);
            self.skip_newlines();
        }

        Ok(Program { statements })
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.matches_kind(TokenKind::Def) {
            return self.function_definition();
        }

        if self.matches_kind(TokenKind::If) {
            return self.if_statement();
        }

        if self.check_kind(&TokenKind::While) || self.check_kind(&TokenKind::For) {
            return Err(ParseError::new(
                "loops are not supported by the ahead-of-time compiler",
                self.peek(),
            ));
        }

        if self.check_kind(&TokenKind::Import) {
            return Err(ParseError::new("modules are not supported", self.peek()));
        }

        let stmt = self.simple_statement()?;
        self.consume_statement_end()?;
        Ok(stmt)
    }

    fn simple_statement(&mut self) -> Result<Stmt, ParseError> {
        if self.matches_kind(TokenKind::Return) {
            if self.at_statement_end() {
                return Ok(Stmt::Return { value: None });
            }
            let value = self.expression()?;
            return Ok(Stmt::Return { value: Some(value) });
        }

        if self.matches_kind(TokenKind::Pass) {
            return Ok(Stmt::Pass);
        }

        if self.looks_like_assignment() {
            let target = self.consume_identifier("expected assignment target")?;
            self.consume_kind(TokenKind::Equal, "expected '=' in assignment")?;
            let value = self.expression()?;
            return Ok(Stmt::Assign { target, value });
        }

        let expr = self.expression()?;
        match expr {
            Expr::Call { func, args } if func == "print" => Ok(Stmt::Print { args }),
            other => Ok(Stmt::Expr(other)),
        }
    }

    fn function_definition(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume_identifier("expected function name after 'def'")?;
        self.consume_kind(TokenKind::LeftParen, "expected '(' after function name")?;

        let mut params = Vec::new();
        if !self.check_kind(&TokenKind::RightParen) {
            loop {
                let param_token = self.peek().clone();
                let param_name = self.consume_identifier("expected parameter name")?;
                if params.iter().any(|p: &Param| p.name == param_name) {
                    return Err(ParseError::new(
                        format!("duplicate parameter '{}' in function definition", param_name),
                        &param_token,
                    ));
                }
                let annotation = if self.matches_kind(TokenKind::Colon) {
                    Some(self.type_annotation()?)
                } else {
                    None
                };
                params.push(Param {
                    name: param_name,
                    annotation,
                });

                if !self.matches_kind(TokenKind::Comma) || self.check_kind(&TokenKind::RightParen)
                {
                    break;
                }
            }
        }
        self.consume_kind(TokenKind::RightParen, "expected ')' after parameter list")?;

        let return_type = if self.matches_kind(TokenKind::Arrow) {
            Some(self.type_annotation()?)
        } else {
            None
        };

        self.consume_kind(TokenKind::Colon, "expected ':' before function body")?;
        let body = self.suite()?;
        Ok(Stmt::FunctionDef {
            name,
            params,
            return_type,
            body,
        })
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        let test = self.expression()?;
        self.consume_kind(TokenKind::Colon, "expected ':' after condition")?;
        let body = self.suite()?;

        let orelse = if self.matches_kind(TokenKind::Elif) {
            vec![self.if_statement()?]
        } else if self.matches_kind(TokenKind::Else) {
            self.consume_kind(TokenKind::Colon, "expected ':' after 'else'")?;
            self.suite()?
        } else {
            Vec::new()
        };

        Ok(Stmt::If { test, body, orelse })
    }

    /// Parse the body after a ':'. Either an indented block or a single simple
    /// statement on the same line.
    fn suite(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if !self.matches_kind(TokenKind::Newline) {
            let stmt = self.simple_statement()?;
            self.consume_statement_end()?;
            return Ok(vec![stmt]);
        }

        self.consume_kind(TokenKind::Indent, "expected an indented block")?;
        let mut body = Vec::new();
        self.skip_newlines();
        while !self.check_kind(&TokenKind::Dedent) && !self.is_at_end() {
            body.push(self.statement()?);
            self.skip_newlines();
        }
        self.consume_kind(TokenKind::Dedent, "expected end of indented block")?;
        Ok(body)
    }

    fn type_annotation(&mut self) -> Result<TypeAnnotation, ParseError> {
        let token = self.peek().clone();
        let name = self.consume_identifier("expected type name")?;
        match name.as_str() {
            "int" => Ok(TypeAnnotation::Int),
            "float" => Ok(TypeAnnotation::Float),
            other => Err(ParseError::new(
                format!("unsupported type annotation '{}' (expected 'int' or 'float')", other),
                &token,
            )),
        }
    }

    fn looks_like_assignment(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Identifier(_))
            && matches!(self.peek_kind_at(1), Some(TokenKind::Equal))
    }

    fn at_statement_end(&self) -> bool {
        self.check_kind(&TokenKind::Newline) || self.is_at_end()
    }

    fn consume_statement_end(&mut self) -> Result<(), ParseError> {
        if self.matches_kind(TokenKind::Newline) || self.is_at_end() {
            return Ok(());
        }
        Err(ParseError::new(
            format!(
                "expected end of line, found {}",
                self.peek_kind().describe()
            ),
            self.peek(),
        ))
    }

    fn skip_newlines(&mut self) {
        while self.matches_kind(TokenKind::Newline) {}
    }

    pub(crate) fn consume_identifier(&mut self, message: &str) -> Result<String, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(ParseError::new(message, self.peek())),
        }
    }

    pub(crate) fn consume_kind(
        &mut self,
        kind: TokenKind,
        message: &str,
    ) -> Result<&Token, ParseError> {
        if self.check_kind(&kind) {
            return Ok(self.advance());
        }
        Err(ParseError::new(
            format!("{}, found {}", message, self.peek_kind().describe()),
            self.peek(),
        ))
    }

    pub(crate) fn matches_kind(&mut self, kind: TokenKind) -> bool {
        if self.check_kind(&kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check_kind(&self, kind: &TokenKind) -> bool {
        if self.is_at_end() {
            return matches!(kind, TokenKind::Eof);
        }

        token_kinds_equal(self.peek_kind(), kind)
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.current + offset).map(|token| &token.kind)
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }
}

fn token_kinds_equal(a: &TokenKind, b: &TokenKind) -> bool {
    match (a, b) {
        (TokenKind::Identifier(_), TokenKind::Identifier(_))
        | (TokenKind::Int(_), TokenKind::Int(_))
        | (TokenKind::Float(_), TokenKind::Float(_))
        | (TokenKind::String(_), TokenKind::String(_)) => true,
        _ => a == b,
    }
}
