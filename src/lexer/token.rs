#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    Comma,
    Colon,
    Arrow,
    Plus,
    Minus,
    Star,
    Slash,
    Equal,
    EqualEqual,
    BangEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Newline,
    Indent,
    Dedent,
    Identifier(String),
    Int(i64),
    Float(f64),
    String(String),
    Def,
    If,
    Elif,
    Else,
    Return,
    Pass,
    And,
    Or,
    Not,
    True,
    False,
    While,
    For,
    Import,
    Eof,
}

impl TokenKind {
    /// Human readable name used in parse diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Indent => "indent".to_string(),
            TokenKind::Dedent => "dedent".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::Identifier(name) => format!("identifier '{}'", name),
            TokenKind::Int(value) => format!("integer {}", value),
            TokenKind::Float(value) => format!("float {}", value),
            TokenKind::String(_) => "string literal".to_string(),
            other => format!("{:?}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Self {
            kind,
            lexeme,
            line,
            column,
        }
    }
}
