use tinypy::parser::ast::{BinaryOp, BoolOperator, CompareOp, Constant, Expr, UnaryOperator};

use super::function::FunctionEmitter;
use super::types::{
    arithmetic_type, bool_op_symbol, comparison_type, negation_type, require_bool, ExprType,
};
use super::CodegenError;
use crate::ir::{
    BinaryOp as IrBinaryOp, Constant as IrConstant, FloatPredicate, IntPredicate, ReturnType,
    ScalarType, Value,
};

impl FunctionEmitter<'_> {
    /// Lower an expression into the current block.
    pub(crate) fn lower_expr(&mut self, expr: &Expr) -> Result<Value, CodegenError> {
        Ok(self.lower_typed(expr)?.0)
    }

    pub(crate) fn lower_typed(&mut self, expr: &Expr) -> Result<(Value, ExprType), CodegenError> {
        match expr {
            Expr::Constant(constant) => self.lower_constant(constant),
            Expr::Name(name) => {
                let (slot, ty) = self.symbols.lookup(name)?;
                Ok((self.builder.load(slot, ty)?, ExprType::Scalar(ty)))
            }
            Expr::BinOp { lhs, op, rhs } => {
                if *op == BinaryOp::Div && is_zero_literal(rhs) {
                    return Err(CodegenError::DivisionByZero);
                }
                let (lhs, lhs_ty) = self.lower_typed(lhs)?;
                let (rhs, rhs_ty) = self.lower_typed(rhs)?;
                let ty = arithmetic_type(*op, lhs_ty, rhs_ty)?;
                let value = self.builder.binary(arithmetic_opcode(*op, ty), lhs, rhs)?;
                Ok((value, ExprType::Scalar(ty)))
            }
            Expr::Compare { lhs, op, rhs } => {
                let (lhs, lhs_ty) = self.lower_typed(lhs)?;
                let (rhs, rhs_ty) = self.lower_typed(rhs)?;
                let value = match comparison_type(*op, lhs_ty, rhs_ty)? {
                    ScalarType::Int => self.builder.icmp(int_predicate(*op), lhs, rhs)?,
                    ScalarType::Float => self.builder.fcmp(float_predicate(*op), lhs, rhs)?,
                };
                Ok((value, ExprType::Bool))
            }
            Expr::BoolOp { lhs, op, rhs } => {
                let context = format!("operands of '{}'", bool_op_symbol(*op));
                let (lhs, lhs_ty) = self.lower_typed(lhs)?;
                require_bool(&context, lhs_ty)?;
                let (rhs, rhs_ty) = self.lower_typed(rhs)?;
                require_bool(&context, rhs_ty)?;
                let opcode = match op {
                    BoolOperator::And => IrBinaryOp::And,
                    BoolOperator::Or => IrBinaryOp::Or,
                };
                Ok((self.builder.binary(opcode, lhs, rhs)?, ExprType::Bool))
            }
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                operand,
            } => {
                let (value, ty) = self.lower_typed(operand)?;
                require_bool("operand of 'not'", ty)?;
                let truth = Value::Const(IrConstant::Bool(true));
                Ok((self.builder.binary(IrBinaryOp::Xor, value, truth)?, ExprType::Bool))
            }
            Expr::UnaryOp {
                op: UnaryOperator::Neg,
                operand,
            } => self.lower_negation(operand),
            Expr::Call { func, args } => {
                let (value, ret) = self.lower_call(func, args)?;
                match (value, ret) {
                    (Some(value), ReturnType::Scalar(ty)) => Ok((value, ExprType::Scalar(ty))),
                    _ => Err(CodegenError::mismatch(
                        format!("call to '{}'", func),
                        "a value",
                        "None",
                    )),
                }
            }
        }
    }

    /// Lower a call and return its result, `None` for void callees.
    pub(crate) fn lower_call(
        &mut self,
        func: &str,
        args: &[Expr],
    ) -> Result<(Option<Value>, ReturnType), CodegenError> {
        let signatures = self.signatures;
        let signature = signatures.lookup(func)?;
        if args.len() != signature.params.len() {
            return Err(CodegenError::ArityMismatch {
                callee: func.to_string(),
                expected: signature.params.len(),
                found: args.len(),
            });
        }

        let mut values = Vec::with_capacity(args.len());
        for (index, (arg, param)) in args.iter().zip(&signature.params).enumerate() {
            let (value, ty) = self.lower_typed(arg)?;
            if ty != ExprType::Scalar(param.ty) {
                return Err(CodegenError::mismatch(
                    format!("argument {} of '{}'", index + 1, func),
                    param.ty,
                    ty,
                ));
            }
            values.push(value);
        }

        let result = self.builder.call(func, values, signature.ret.ir_type())?;
        Ok((result, signature.ret))
    }

    fn lower_constant(&mut self, constant: &Constant) -> Result<(Value, ExprType), CodegenError> {
        let lowered = match constant {
            Constant::Int(value) => (
                Value::Const(IrConstant::Int(int_literal(*value)?)),
                ExprType::INT,
            ),
            Constant::Float(value) => (Value::Const(IrConstant::Float(*value)), ExprType::FLOAT),
            Constant::Bool(value) => (Value::Const(IrConstant::Bool(*value)), ExprType::Bool),
            Constant::Str(text) => (
                Value::Global(self.module.intern_string(text)),
                ExprType::Str,
            ),
        };
        Ok(lowered)
    }

    fn lower_negation(&mut self, operand: &Expr) -> Result<(Value, ExprType), CodegenError> {
        // Negative literals fold to constants so that i32::MIN is expressible.
        match operand {
            Expr::Constant(Constant::Int(value)) => {
                let folded = int_literal(-*value)?;
                return Ok((Value::Const(IrConstant::Int(folded)), ExprType::INT));
            }
            Expr::Constant(Constant::Float(value)) => {
                return Ok((Value::Const(IrConstant::Float(-*value)), ExprType::FLOAT));
            }
            _ => {}
        }

        let (value, ty) = self.lower_typed(operand)?;
        let value = match negation_type(ty)? {
            ScalarType::Int => {
                let zero = Value::Const(IrConstant::Int(0));
                self.builder.binary(IrBinaryOp::Sub, zero, value)?
            }
            ScalarType::Float => self.builder.fneg(value)?,
        };
        Ok((value, ty))
    }
}

fn int_literal(value: i64) -> Result<i32, CodegenError> {
    i32::try_from(value).map_err(|_| {
        CodegenError::mismatch(
            format!("integer literal {}", value),
            "a 32-bit int",
            "an out-of-range value",
        )
    })
}

/// `0`, `0.0` and their negations.
fn is_zero_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Constant(Constant::Int(0)) => true,
        Expr::Constant(Constant::Float(value)) => *value == 0.0,
        Expr::UnaryOp {
            op: UnaryOperator::Neg,
            operand,
        } => is_zero_literal(operand),
        _ => false,
    }
}

fn arithmetic_opcode(op: BinaryOp, ty: ScalarType) -> IrBinaryOp {
    match (op, ty) {
        (BinaryOp::Add, ScalarType::Int) => IrBinaryOp::Add,
        (BinaryOp::Sub, ScalarType::Int) => IrBinaryOp::Sub,
        (BinaryOp::Mult, ScalarType::Int) => IrBinaryOp::Mul,
        (BinaryOp::Div, ScalarType::Int) => IrBinaryOp::SDiv,
        (BinaryOp::Add, ScalarType::Float) => IrBinaryOp::FAdd,
        (BinaryOp::Sub, ScalarType::Float) => IrBinaryOp::FSub,
        (BinaryOp::Mult, ScalarType::Float) => IrBinaryOp::FMul,
        (BinaryOp::Div, ScalarType::Float) => IrBinaryOp::FDiv,
    }
}

fn int_predicate(op: CompareOp) -> IntPredicate {
    match op {
        CompareOp::Eq => IntPredicate::Eq,
        CompareOp::NotEq => IntPredicate::Ne,
        CompareOp::Lt => IntPredicate::Slt,
        CompareOp::LtE => IntPredicate::Sle,
        CompareOp::Gt => IntPredicate::Sgt,
        CompareOp::GtE => IntPredicate::Sge,
    }
}

fn float_predicate(op: CompareOp) -> FloatPredicate {
    match op {
        CompareOp::Eq => FloatPredicate::Oeq,
        CompareOp::NotEq => FloatPredicate::Une,
        CompareOp::Lt => FloatPredicate::Olt,
        CompareOp::LtE => FloatPredicate::Ole,
        CompareOp::Gt => FloatPredicate::Ogt,
        CompareOp::GtE => FloatPredicate::Oge,
    }
}
