//! Static expression types.

use std::fmt;

use tinypy::parser::ast::{BinaryOp, BoolOperator, CompareOp, Constant, Expr, UnaryOperator};

use super::function::SignatureRegistry;
use super::symbols::SymbolTable;
use super::CodegenError;
use crate::ir::{ReturnType, ScalarType};

/// Static type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprType {
    /// Int or float, the storable types
    Scalar(ScalarType),
    /// Result of a comparison or logical operator
    Bool,
    /// Only string literals have this type.
    Str,
}

impl ExprType {
    /// Shorthand for `Scalar(Int)`
    pub const INT: ExprType = ExprType::Scalar(ScalarType::Int);
    /// Shorthand for `Scalar(Float)`
    pub const FLOAT: ExprType = ExprType::Scalar(ScalarType::Float);

    /// The storage type, if this is one.
    pub fn scalar(self) -> Option<ScalarType> {
        match self {
            ExprType::Scalar(ty) => Some(ty),
            _ => None,
        }
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprType::Scalar(ty) => write!(f, "{}", ty),
            ExprType::Bool => write!(f, "bool"),
            ExprType::Str => write!(f, "str"),
        }
    }
}

/// Computes expression types from the symbol table and the signatures of
/// every function in the module. Never emits code.
pub struct TypeResolver<'a> {
    symbols: &'a SymbolTable,
    signatures: &'a SignatureRegistry,
}

impl<'a> TypeResolver<'a> {
    /// Resolver over the given tables
    pub fn new(symbols: &'a SymbolTable, signatures: &'a SignatureRegistry) -> Self {
        Self {
            symbols,
            signatures,
        }
    }

    /// Type of `expr`, or the first type error inside it.
    pub fn resolve(&self, expr: &Expr) -> Result<ExprType, CodegenError> {
        match expr {
            Expr::Constant(constant) => Ok(literal_type(constant)),
            Expr::Name(name) => Ok(ExprType::Scalar(self.symbols.lookup(name)?.1)),
            Expr::BinOp { lhs, op, rhs } => {
                let ty = arithmetic_type(*op, self.resolve(lhs)?, self.resolve(rhs)?)?;
                Ok(ExprType::Scalar(ty))
            }
            Expr::Compare { lhs, op, rhs } => {
                comparison_type(*op, self.resolve(lhs)?, self.resolve(rhs)?)?;
                Ok(ExprType::Bool)
            }
            Expr::BoolOp { lhs, op, rhs } => {
                let context = format!("operands of '{}'", bool_op_symbol(*op));
                require_bool(&context, self.resolve(lhs)?)?;
                require_bool(&context, self.resolve(rhs)?)?;
                Ok(ExprType::Bool)
            }
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                operand,
            } => {
                require_bool("operand of 'not'", self.resolve(operand)?)?;
                Ok(ExprType::Bool)
            }
            Expr::UnaryOp {
                op: UnaryOperator::Neg,
                operand,
            } => Ok(ExprType::Scalar(negation_type(self.resolve(operand)?)?)),
            Expr::Call { func, .. } => {
                let signature = self.signatures.lookup(func)?;
                Ok(ExprType::Scalar(value_return_type(func, signature.ret)?))
            }
        }
    }
}

pub(crate) fn literal_type(constant: &Constant) -> ExprType {
    match constant {
        Constant::Int(_) => ExprType::INT,
        Constant::Float(_) => ExprType::FLOAT,
        Constant::Bool(_) => ExprType::Bool,
        Constant::Str(_) => ExprType::Str,
    }
}

/// Both operands must share one scalar type; there is no implicit widening.
pub(crate) fn arithmetic_type(
    op: BinaryOp,
    lhs: ExprType,
    rhs: ExprType,
) -> Result<ScalarType, CodegenError> {
    same_scalar(&format!("operands of '{}'", binary_op_symbol(op)), lhs, rhs)
}

pub(crate) fn comparison_type(
    op: CompareOp,
    lhs: ExprType,
    rhs: ExprType,
) -> Result<ScalarType, CodegenError> {
    same_scalar(&format!("operands of '{}'", compare_op_symbol(op)), lhs, rhs)
}

fn same_scalar(context: &str, lhs: ExprType, rhs: ExprType) -> Result<ScalarType, CodegenError> {
    match (lhs, rhs) {
        (ExprType::Scalar(a), ExprType::Scalar(b)) if a == b => Ok(a),
        (ExprType::Scalar(a), other) => Err(CodegenError::mismatch(context, a, other)),
        (other, _) => Err(CodegenError::mismatch(context, "int or float", other)),
    }
}

pub(crate) fn negation_type(operand: ExprType) -> Result<ScalarType, CodegenError> {
    operand
        .scalar()
        .ok_or_else(|| CodegenError::mismatch("operand of unary '-'", "int or float", operand))
}

pub(crate) fn require_bool(context: &str, ty: ExprType) -> Result<(), CodegenError> {
    if ty == ExprType::Bool {
        Ok(())
    } else {
        Err(CodegenError::mismatch(context, "bool", ty))
    }
}

/// Return type of a call used for its value.
pub(crate) fn value_return_type(callee: &str, ret: ReturnType) -> Result<ScalarType, CodegenError> {
    match ret {
        ReturnType::Scalar(ty) => Ok(ty),
        ReturnType::Void => Err(CodegenError::mismatch(
            format!("call to '{}'", callee),
            "a value",
            "None",
        )),
    }
}

pub(crate) fn binary_op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mult => "*",
        BinaryOp::Div => "/",
    }
}

pub(crate) fn compare_op_symbol(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "==",
        CompareOp::NotEq => "!=",
        CompareOp::Lt => "<",
        CompareOp::LtE => "<=",
        CompareOp::Gt => ">",
        CompareOp::GtE => ">=",
    }
}

pub(crate) fn bool_op_symbol(op: BoolOperator) -> &'static str {
    match op {
        BoolOperator::And => "and",
        BoolOperator::Or => "or",
    }
}
