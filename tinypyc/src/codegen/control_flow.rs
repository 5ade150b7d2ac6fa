use tinypy::parser::ast::{Expr, Stmt};

use super::function::FunctionEmitter;
use super::types::{require_bool, ExprType};
use super::{CodegenError, ENTRY_POINT};
use crate::ir::{BlockId, Constant, ReturnType, ScalarType, Terminator, Value};

impl FunctionEmitter<'_> {
    /// Lower `if`/`else` into a diamond: the condition ends the current
    /// block, each arm branches to the merge block unless it returned, and
    /// lowering continues in the merge block.
    pub(crate) fn lower_if(
        &mut self,
        test: &Expr,
        body: &[Stmt],
        orelse: &[Stmt],
    ) -> Result<(), CodegenError> {
        require_bool("if condition", self.resolver().resolve(test)?)?;
        let cond = self.lower_expr(test)?;

        let index = self.next_if_index();
        let then_block = self.builder.create_block(format!("if.then.{}", index));
        let else_block = if orelse.is_empty() {
            None
        } else {
            Some(self.builder.create_block(format!("if.else.{}", index)))
        };
        let merge_block = self.builder.create_block(format!("if.end.{}", index));

        self.builder.terminate(Terminator::CondBranch {
            cond,
            then_block,
            else_block: else_block.unwrap_or(merge_block),
        })?;

        self.lower_arm(then_block, body, merge_block)?;
        if let Some(else_block) = else_block {
            self.lower_arm(else_block, orelse, merge_block)?;
        }

        self.builder.switch_to_block(merge_block);
        // Every arm returned: nothing can follow this statement.
        if self.builder.predecessor_count(merge_block) == 0 {
            self.builder.terminate(Terminator::Unreachable)?;
        }
        Ok(())
    }

    fn lower_arm(
        &mut self,
        block: BlockId,
        body: &[Stmt],
        merge_block: BlockId,
    ) -> Result<(), CodegenError> {
        self.builder.switch_to_block(block);
        self.lower_block(body)?;
        if !self.builder.is_terminated() {
            self.builder.terminate(Terminator::Branch(merge_block))?;
        }
        Ok(())
    }

    pub(crate) fn lower_return(&mut self, value: Option<&Expr>) -> Result<(), CodegenError> {
        let signature = self.builder.signature();
        let context = format!("return from '{}'", signature.name);
        let is_entry_point = signature.name == ENTRY_POINT;

        let terminator = match (value, signature.ret) {
            (None, ReturnType::Void) => Terminator::Return(None),
            (None, ReturnType::Scalar(ScalarType::Int)) if is_entry_point => {
                Terminator::Return(Some(Value::Const(Constant::Int(0))))
            }
            (None, ReturnType::Scalar(expected)) => {
                return Err(CodegenError::mismatch(context, expected, "None"));
            }
            (Some(expr), ReturnType::Void) => {
                let found = self.resolver().resolve(expr)?;
                return Err(CodegenError::mismatch(context, "None", found));
            }
            (Some(expr), ReturnType::Scalar(expected)) => {
                let found = self.resolver().resolve(expr)?;
                if found != ExprType::Scalar(expected) {
                    return Err(CodegenError::mismatch(context, expected, found));
                }
                Terminator::Return(Some(self.lower_expr(expr)?))
            }
        };

        self.builder.terminate(terminator)?;
        Ok(())
    }
}
