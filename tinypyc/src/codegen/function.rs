//! Signatures and per-function emission.

use std::collections::HashMap;

use tinypy::parser::ast::{Constant as Literal, Expr, FunctionDef, Stmt, TypeAnnotation};

use super::symbols::SymbolTable;
use super::types::TypeResolver;
use super::{CodegenError, ENTRY_POINT};
use crate::ir::builder::{FunctionBuilder, ModuleBuilder};
use crate::ir::{Constant, Function, Parameter, ReturnType, ScalarType, Signature, Terminator, Value};

/// Names that belong to the runtime and cannot be defined by a program.
const RESERVED: &[&str] = &["print", "printf"];

/// Signatures of every function in the module, registered before any body
/// is lowered so that calls may refer to later definitions.
#[derive(Debug, Default)]
pub struct SignatureRegistry {
    signatures: HashMap<String, Signature>,
}

impl SignatureRegistry {
    /// Add a signature. Fails for a repeated name or a runtime name.
    pub fn register(&mut self, signature: Signature) -> Result<(), CodegenError> {
        if RESERVED.contains(&signature.name.as_str()) {
            return Err(CodegenError::Unsupported(
                "redefinitions of built-in functions",
            ));
        }
        if self.signatures.contains_key(&signature.name) {
            return Err(CodegenError::DuplicateFunction {
                name: signature.name,
            });
        }
        self.signatures.insert(signature.name.clone(), signature);
        Ok(())
    }

    /// Signature of `name`, `UnboundName` if there is none.
    pub fn lookup(&self, name: &str) -> Result<&Signature, CodegenError> {
        self.signatures
            .get(name)
            .ok_or_else(|| CodegenError::UnboundName {
                name: name.to_string(),
            })
    }
}

/// Derive the signature of a definition.
///
/// Parameters are `int` unless annotated. Without a return annotation the
/// function returns `int` when any `return` statement carries a value and
/// nothing otherwise. `main` is always `int main()`.
pub fn infer_signature(def: &FunctionDef<'_>) -> Result<Signature, CodegenError> {
    if def.name == ENTRY_POINT {
        if !def.params.is_empty() {
            return Err(CodegenError::InvalidEntryPoint {
                reason: "'main' cannot take parameters".to_string(),
            });
        }
        if def.return_type == Some(TypeAnnotation::Float) {
            return Err(CodegenError::InvalidEntryPoint {
                reason: "'main' must return int".to_string(),
            });
        }
        return Ok(Signature {
            name: def.name.to_string(),
            params: Vec::new(),
            ret: ReturnType::Scalar(ScalarType::Int),
        });
    }

    let params = def
        .params
        .iter()
        .map(|param| Parameter {
            name: param.name.clone(),
            ty: param.annotation.map_or(ScalarType::Int, scalar_type),
        })
        .collect();

    let ret = match def.return_type {
        Some(annotation) => ReturnType::Scalar(scalar_type(annotation)),
        None if has_valued_return(def.body) => ReturnType::Scalar(ScalarType::Int),
        None => ReturnType::Void,
    };

    Ok(Signature {
        name: def.name.to_string(),
        params,
        ret,
    })
}

fn scalar_type(annotation: TypeAnnotation) -> ScalarType {
    match annotation {
        TypeAnnotation::Int => ScalarType::Int,
        TypeAnnotation::Float => ScalarType::Float,
    }
}

fn has_valued_return(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| match stmt {
        Stmt::Return { value } => value.is_some(),
        Stmt::If { body, orelse, .. } => has_valued_return(body) || has_valued_return(orelse),
        _ => false,
    })
}

/// Lowers one function definition into IR.
pub struct FunctionEmitter<'a> {
    pub(crate) builder: FunctionBuilder,
    pub(crate) symbols: SymbolTable,
    pub(crate) signatures: &'a SignatureRegistry,
    pub(crate) module: &'a mut ModuleBuilder,
    next_if: usize,
}

impl<'a> FunctionEmitter<'a> {
    /// Emit `def` using its registered signature. String constants and
    /// runtime declarations are added to `module`; the function itself is
    /// returned to the caller.
    pub fn emit(
        signatures: &'a SignatureRegistry,
        module: &'a mut ModuleBuilder,
        def: &FunctionDef<'_>,
    ) -> Result<Function, CodegenError> {
        let signature = signatures.lookup(def.name)?.clone();
        let mut emitter = FunctionEmitter {
            builder: FunctionBuilder::new(signature),
            symbols: SymbolTable::new(),
            signatures,
            module,
            next_if: 0,
        };

        emitter.emit_body(def.body)?;
        let slots = emitter.symbols.into_slots();
        Ok(emitter.builder.build(slots))
    }

    fn emit_body(&mut self, body: &[Stmt]) -> Result<(), CodegenError> {
        let entry = self.builder.create_block("entry");
        self.builder.switch_to_block(entry);

        let params = self.builder.signature().params.clone();
        for (index, param) in params.iter().enumerate() {
            let slot = self.symbols.declare(&param.name, param.ty)?;
            self.builder.store(slot, Value::Param(index as u32))?;
        }

        self.lower_block(body)?;
        self.finish()
    }

    /// Close the final block if the body fell off its end.
    fn finish(&mut self) -> Result<(), CodegenError> {
        if self.builder.is_terminated() {
            return Ok(());
        }

        let signature = self.builder.signature();
        let terminator = match signature.ret {
            ReturnType::Void => Terminator::Return(None),
            ReturnType::Scalar(_) if signature.name == ENTRY_POINT => {
                Terminator::Return(Some(Value::Const(Constant::Int(0))))
            }
            ReturnType::Scalar(expected) => {
                return Err(CodegenError::MissingReturn { expected });
            }
        };
        self.builder.terminate(terminator)?;
        Ok(())
    }

    pub(crate) fn resolver(&self) -> TypeResolver<'_> {
        TypeResolver::new(&self.symbols, self.signatures)
    }

    pub(crate) fn next_if_index(&mut self) -> usize {
        let index = self.next_if;
        self.next_if += 1;
        index
    }

    pub(crate) fn lower_block(&mut self, body: &[Stmt]) -> Result<(), CodegenError> {
        for stmt in body {
            self.lower_statement(stmt)?;
        }
        Ok(())
    }

    fn lower_statement(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        if self.builder.is_terminated() {
            return Err(CodegenError::DeadCode);
        }

        match stmt {
            Stmt::Assign { target, value } => self.lower_assign(target, value),
            Stmt::If { test, body, orelse } => self.lower_if(test, body, orelse),
            Stmt::Return { value } => self.lower_return(value.as_ref()),
            Stmt::Print { args } => self.lower_print(args),
            Stmt::Expr(Expr::Call { func, args }) => {
                self.lower_call(func, args)?;
                Ok(())
            }
            stmt if is_docstring(stmt) => Ok(()),
            Stmt::Expr(expr) => {
                self.lower_expr(expr)?;
                Ok(())
            }
            Stmt::Pass => Ok(()),
            Stmt::FunctionDef { .. } => Err(CodegenError::Unsupported("nested function definitions")),
        }
    }

    fn lower_assign(&mut self, target: &str, value: &Expr) -> Result<(), CodegenError> {
        let ty = self.resolver().resolve(value)?;
        let Some(scalar) = ty.scalar() else {
            return Err(CodegenError::mismatch(
                format!("assignment to '{}'", target),
                "int or float",
                ty,
            ));
        };

        let lowered = self.lower_expr(value)?;
        let slot = self.symbols.declare(target, scalar)?;
        self.builder.store(slot, lowered)?;
        Ok(())
    }
}

/// True for statements that only document the code.
pub(crate) fn is_docstring(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::Expr(Expr::Constant(Literal::Str(_)))
    )
}
