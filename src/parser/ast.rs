#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    /// Iterate over the function definitions at module level.
    pub fn functions(&self) -> impl Iterator<Item = FunctionDef<'_>> {
        self.statements.iter().filter_map(|stmt| match stmt {
            Stmt::FunctionDef {
                name,
                params,
                return_type,
                body,
            } => Some(FunctionDef {
                name,
                params,
                return_type: *return_type,
                body,
            }),
            _ => None,
        })
    }
}

/// Borrowed view of a `def` statement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionDef<'a> {
    pub name: &'a str,
    pub params: &'a [Param],
    pub return_type: Option<TypeAnnotation>,
    pub body: &'a [Stmt],
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    FunctionDef {
        name: String,
        params: Vec<Param>,
        return_type: Option<TypeAnnotation>,
        body: Vec<Stmt>,
    },
    Assign {
        target: String,
        value: Expr,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Return {
        value: Option<Expr>,
    },
    Print {
        args: Vec<Expr>,
    },
    Expr(Expr),
    Pass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub annotation: Option<TypeAnnotation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeAnnotation {
    Int,
    Float,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Constant),
    Name(String),
    BinOp {
        lhs: Box<Expr>,
        op: BinaryOp,
        rhs: Box<Expr>,
    },
    Compare {
        lhs: Box<Expr>,
        op: CompareOp,
        rhs: Box<Expr>,
    },
    BoolOp {
        lhs: Box<Expr>,
        op: BoolOperator,
        rhs: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Call {
        func: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mult,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
    Not,
}
