//! Frontend for tinypy, a statically typed subset of Python that is compiled
//! ahead of time by `tinypyc`.

pub mod errors;
pub mod lexer;
pub mod parser;

use parser::ast::Program;

/// Lex and parse a complete source file.
pub fn parse_source(source: &str) -> Result<Program, FrontendError> {
    let tokens = lexer::lex(source).map_err(FrontendError::Lex)?;
    let mut parser = parser::Parser::new(tokens);
    parser.parse_program().map_err(FrontendError::Parse)
}

/// Either stage of the frontend failed.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendError {
    Lex(lexer::LexError),
    Parse(parser::ParseError),
}

impl FrontendError {
    pub fn line(&self) -> usize {
        match self {
            FrontendError::Lex(err) => err.line,
            FrontendError::Parse(err) => err.line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            FrontendError::Lex(err) => err.column,
            FrontendError::Parse(err) => err.column,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            FrontendError::Lex(err) => &err.message,
            FrontendError::Parse(err) => &err.message,
        }
    }

    /// Render with a source excerpt, see [`errors::pretty::format_diagnostic`].
    pub fn render(&self, label: &str, source: &str) -> String {
        errors::pretty::format_diagnostic(label, source, self.line(), self.column(), self.message())
    }
}

impl std::fmt::Display for FrontendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrontendError::Lex(err) => write!(f, "{}", err),
            FrontendError::Parse(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for FrontendError {}
