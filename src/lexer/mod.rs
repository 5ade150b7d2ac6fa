pub mod token;

use std::error::Error;
use std::fmt;

use token::{Token, TokenKind};

const TAB_WIDTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl LexError {
    fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lex error at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl Error for LexError {}

/// Tokenize a source file. Leading whitespace is turned into `Indent` and
/// `Dedent` tokens, and every logical line ends with a `Newline` token.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).lex()
}

struct Lexer {
    chars: Vec<char>,
    current: usize,
    start: usize,
    line: usize,
    column: usize,
    token_line: usize,
    token_column: usize,
    paren_depth: usize,
    at_line_start: bool,
    indents: Vec<usize>,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            current: 0,
            start: 0,
            line: 1,
            column: 1,
            token_line: 1,
            token_column: 1,
            paren_depth: 0,
            at_line_start: true,
            indents: vec![0],
            tokens: Vec::new(),
        }
    }

    fn lex(mut self) -> Result<Vec<Token>, LexError> {
        while !self.is_at_end() {
            if self.at_line_start {
                self.at_line_start = false;
                self.indentation()?;
                continue;
            }
            self.start_token();
            self.scan_token()?;
        }

        self.start_token();
        if !matches!(
            self.tokens.last().map(|token| &token.kind),
            None | Some(TokenKind::Newline)
        ) {
            self.add_synthetic(TokenKind::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.add_synthetic(TokenKind::Dedent);
        }
        self.add_synthetic(TokenKind::Eof);

        Ok(self.tokens)
    }

    fn indentation(&mut self) -> Result<(), LexError> {
        let mut width = 0;
        loop {
            match self.peek() {
                ' ' => width += 1,
                '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                _ => break,
            }
            self.advance();
        }

        // Blank and comment-only lines never affect indentation.
        if matches!(self.peek(), '\n' | '\r' | '#') || self.is_at_end() {
            self.skip_line_comment();
            if !self.is_at_end() {
                self.advance();
            }
            self.at_line_start = true;
            return Ok(());
        }

        self.start_token();
        let current = self.current_indent();
        if width > current {
            self.indents.push(width);
            self.add_synthetic(TokenKind::Indent);
        } else if width < current {
            while self.current_indent() > width {
                self.indents.pop();
                self.add_synthetic(TokenKind::Dedent);
            }
            if self.current_indent() != width {
                return Err(LexError::new(
                    "unindent does not match any outer indentation level",
                    self.token_line,
                    self.token_column,
                ));
            }
        }

        Ok(())
    }

    fn scan_token(&mut self) -> Result<(), LexError> {
        let c = self.advance();
        match c {
            '(' => {
                self.paren_depth += 1;
                self.add_token(TokenKind::LeftParen);
            }
            ')' => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                self.add_token(TokenKind::RightParen);
            }
            ',' => self.add_token(TokenKind::Comma),
            ':' => self.add_token(TokenKind::Colon),
            '+' => self.add_token(TokenKind::Plus),
            '*' => self.add_token(TokenKind::Star),
            '/' => self.add_token(TokenKind::Slash),
            '\n' => {
                if self.paren_depth == 0 {
                    self.add_token(TokenKind::Newline);
                    self.at_line_start = true;
                }
            }
            '-' => {
                if self.matches('>') {
                    self.add_token(TokenKind::Arrow);
                } else {
                    self.add_token(TokenKind::Minus);
                }
            }
            '!' => {
                if self.matches('=') {
                    self.add_token(TokenKind::BangEqual);
                } else {
                    return Err(LexError::new(
                        "unexpected character '!' (use 'not' for negation)",
                        self.token_line,
                        self.token_column,
                    ));
                }
            }
            '=' => {
                if self.matches('=') {
                    self.add_token(TokenKind::EqualEqual);
                } else {
                    self.add_token(TokenKind::Equal);
                }
            }
            '<' => {
                if self.matches('=') {
                    self.add_token(TokenKind::LessEqual);
                } else {
                    self.add_token(TokenKind::Less);
                }
            }
            '>' => {
                if self.matches('=') {
                    self.add_token(TokenKind::GreaterEqual);
                } else {
                    self.add_token(TokenKind::Greater);
                }
            }
            '\\' => {
                if self.matches('\n') {
                    // explicit line joining
                } else {
                    return Err(LexError::new(
                        "unexpected character after line continuation",
                        self.token_line,
                        self.token_column,
                    ));
                }
            }
            '#' => self.skip_line_comment(),
            '"' | '\'' => self.string(c)?,
            ' ' | '\r' | '\t' => {}
            '.' if self.peek().is_ascii_digit() => self.number()?,
            d if d.is_ascii_digit() => self.number()?,
            a if is_ident_start(a) => self.identifier(),
            _ => {
                return Err(LexError::new(
                    format!("unexpected character '{}'", c),
                    self.token_line,
                    self.token_column,
                ))
            }
        }

        Ok(())
    }

    fn string(&mut self, quote: char) -> Result<(), LexError> {
        let mut value = String::new();
        let mut closed = false;

        while !self.is_at_end() {
            let c = self.advance();
            match c {
                c if c == quote => {
                    closed = true;
                    break;
                }
                '\n' => break,
                '\\' => {
                    if self.is_at_end() {
                        break;
                    }
                    let escaped = self.advance();
                    match escaped {
                        '"' => value.push('"'),
                        '\'' => value.push('\''),
                        '\\' => value.push('\\'),
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        '0' => value.push('\0'),
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                _ => value.push(c),
            }
        }

        if !closed {
            return Err(LexError::new(
                "unterminated string literal",
                self.token_line,
                self.token_column,
            ));
        }

        self.add_token(TokenKind::String(value));
        Ok(())
    }

    fn number(&mut self) -> Result<(), LexError> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let mut is_float = self.chars[self.start] == '.';
        if !is_float && self.peek() == '.' {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let lexeme = self.current_lexeme();
        if is_float {
            let value = lexeme.parse::<f64>().map_err(|_| {
                LexError::new(
                    format!("invalid float literal '{}'", lexeme),
                    self.token_line,
                    self.token_column,
                )
            })?;
            self.add_token(TokenKind::Float(value));
        } else {
            let value = lexeme.parse::<i64>().map_err(|_| {
                LexError::new(
                    format!("invalid int literal '{}'", lexeme),
                    self.token_line,
                    self.token_column,
                )
            })?;
            self.add_token(TokenKind::Int(value));
        }

        Ok(())
    }

    fn identifier(&mut self) {
        while is_ident_continue(self.peek()) {
            self.advance();
        }

        let lexeme = self.current_lexeme();
        let kind = match lexeme.as_str() {
            "def" => TokenKind::Def,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "return" => TokenKind::Return,
            "pass" => TokenKind::Pass,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "import" => TokenKind::Import,
            _ => TokenKind::Identifier(lexeme.clone()),
        };

        self.add_token(kind);
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme = self.current_lexeme();
        self.tokens
            .push(Token::new(kind, lexeme, self.token_line, self.token_column));
    }

    fn add_synthetic(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(
            kind,
            String::new(),
            self.token_line,
            self.token_column,
        ));
    }

    fn current_indent(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }

    fn start_token(&mut self) {
        self.start = self.current;
        self.token_line = self.line;
        self.token_column = self.column;
    }

    fn current_lexeme(&self) -> String {
        self.chars[self.start..self.current].iter().collect()
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }
        self.advance();
        true
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.chars[self.current]
        }
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn blank_and_comment_lines_do_not_indent() {
        let kinds = kinds("def f():\n\n    # note\n    return 1\n");
        let indents = kinds.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = kinds.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
    }

    #[test]
    fn newlines_inside_parens_are_joined() {
        let kinds = kinds("f(1,\n  2)\n");
        let newlines = kinds.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
        assert!(!kinds.contains(&TokenKind::Indent));
    }

    #[test]
    fn tabs_advance_to_next_stop() {
        let tokens = lex("if x:\n\tpass\n").expect("lex should succeed");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Indent));
    }
}
