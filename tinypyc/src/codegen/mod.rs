//! Code generation orchestration
//!
//! Lowers a parsed program into an IR [`Module`]. Signatures are registered
//! for every definition first, then each body is emitted by a
//! [`FunctionEmitter`] with a fresh symbol table. The module is verified
//! before it is returned; on any error nothing is returned.

mod control_flow;
mod error;
mod expr;
pub mod function;
pub mod runtime;
pub mod symbols;
pub mod types;

pub use error::CodegenError;
pub use function::{infer_signature, FunctionEmitter, SignatureRegistry};
pub use types::{ExprType, TypeResolver};

use tinypy::parser::ast::{Expr, FunctionDef, Program, Stmt};

use crate::ir::builder::ModuleBuilder;
use crate::ir::Module;
use crate::CompileError;

/// Name of the program entry point.
pub const ENTRY_POINT: &str = "main";

/// Main codegen entry point.
#[derive(Debug, Clone, Default)]
pub struct CodeGenerator {
    /// Target triple recorded in the module.
    pub target_triple: Option<String>,
}

impl CodeGenerator {
    /// Create a new code generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower `program` into a verified module named `module_name`.
    ///
    /// Top-level statements other than definitions form the body of a
    /// synthesized `main`. A program that defines `main` may still call it
    /// once at top level; that call is the entry point itself.
    pub fn generate(&self, program: &Program, module_name: &str) -> Result<Module, CompileError> {
        let mut script: Vec<Stmt> = program
            .statements
            .iter()
            .filter(|stmt| {
                !matches!(stmt, Stmt::FunctionDef { .. }) && !function::is_docstring(stmt)
            })
            .cloned()
            .collect();
        let mut definitions: Vec<FunctionDef<'_>> = program.functions().collect();

        let defines_main = definitions.iter().any(|def| def.name == ENTRY_POINT);
        if defines_main && matches!(script.as_slice(), [stmt] if is_entry_call(stmt)) {
            script.clear();
        }

        if !script.is_empty() {
            if defines_main {
                return Err(in_function(ENTRY_POINT, CodegenError::ConflictingEntryPoint));
            }
            definitions.push(FunctionDef {
                name: ENTRY_POINT,
                params: &[],
                return_type: None,
                body: &script,
            });
        }

        let mut signatures = SignatureRegistry::default();
        for def in &definitions {
            infer_signature(def)
                .and_then(|signature| signatures.register(signature))
                .map_err(|err| in_function(def.name, err))?;
        }

        let mut module = ModuleBuilder::new(module_name);
        module.set_target_triple(self.target_triple.clone());
        runtime::declare_runtime(&mut module);

        for def in &definitions {
            let function = FunctionEmitter::emit(&signatures, &mut module, def)
                .map_err(|err| in_function(def.name, err))?;
            module.add_function(function);
        }

        let module = module.build();
        module.verify()?;
        Ok(module)
    }
}

/// `main()` as a statement.
fn is_entry_call(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Expr(Expr::Call { func, args }) if func == ENTRY_POINT && args.is_empty())
}

fn in_function(name: &str, source: CodegenError) -> CompileError {
    CompileError::Codegen {
        function: name.to_string(),
        source,
    }
}
