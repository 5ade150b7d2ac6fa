//! Bindings to the C runtime.

use tinypy::parser::ast::Expr;

use super::function::FunctionEmitter;
use super::types::ExprType;
use super::CodegenError;
use crate::ir::builder::ModuleBuilder;
use crate::ir::{ExternFunction, ScalarType, Type, Value};

/// The C function behind `print`
pub const PRINTF: &str = "printf";

/// Declare `i32 printf(ptr, ...)` in `module`.
pub fn declare_runtime(module: &mut ModuleBuilder) {
    module.declare_extern(ExternFunction {
        name: PRINTF.to_string(),
        params: vec![Type::Ptr],
        ret: Type::I32,
        variadic: true,
    });
}

impl FunctionEmitter<'_> {
    /// Lower `print(a, b, ...)` to a single `printf` call. Arguments are
    /// separated by one space and the line ends with `\n`.
    pub(crate) fn lower_print(&mut self, args: &[Expr]) -> Result<(), CodegenError> {
        let mut specifiers = Vec::with_capacity(args.len());
        let mut values = Vec::with_capacity(args.len());

        for arg in args {
            let (value, ty) = self.lower_typed(arg)?;
            let (specifier, value) = match ty {
                ExprType::Scalar(ScalarType::Int) => ("%d", value),
                ExprType::Scalar(ScalarType::Float) => ("%f", value),
                ExprType::Str => ("%s", value),
                ExprType::Bool => {
                    let on_true = Value::Global(self.module.intern_string("True"));
                    let on_false = Value::Global(self.module.intern_string("False"));
                    ("%s", self.builder.select(Type::Ptr, value, on_true, on_false)?)
                }
            };
            specifiers.push(specifier);
            values.push(value);
        }

        let format = format!("{}\n", specifiers.join(" "));
        let mut call_args = vec![Value::Global(self.module.intern_string(&format))];
        call_args.extend(values);
        self.builder.call(PRINTF, call_args, Type::I32)?;
        Ok(())
    }
}
