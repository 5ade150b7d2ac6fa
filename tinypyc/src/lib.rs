//! tinypyc - ahead-of-time compiler for tinypy
//!
//! Turns a parsed tinypy program into a verified, LLVM-shaped IR module and
//! hands the module to the LLVM tools to produce a native executable.
//!
//! ```text
//! source -> tinypy::parse_source -> CodeGenerator -> ir::Module -> llc + clang
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod codegen;
pub mod ir;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tinypy::lexer::LexError;
use tinypy::parser::ast::Program;
use tinypy::parser::ParseError;
use tinypy::FrontendError;

use backend::{Artifacts, Backend, BackendError, BuildRequest, LlvmToolchain, ToolchainConfig};
use codegen::{CodeGenerator, CodegenError, ENTRY_POINT};
use ir::VerifyError;

/// tinypyc version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Main compiler interface
#[derive(Debug, Clone)]
pub struct Compiler {
    /// Optimization level (0-3)
    pub opt_level: u8,
    /// Target triple, host when `None`
    pub target_triple: Option<String>,
    /// External tools used to build executables
    pub toolchain: ToolchainConfig,
}

impl Compiler {
    /// Create a new compiler with default settings
    pub fn new() -> Self {
        Self {
            opt_level: 0,
            target_triple: None,
            toolchain: ToolchainConfig::from_env(),
        }
    }

    /// Compile tinypy source text into IR.
    pub fn compile_source(&self, source: &str, module_name: &str) -> Result<ir::Module, CompileError> {
        let program = tinypy::parse_source(source)?;
        self.compile_program(&program, module_name)
    }

    /// Compile a parsed program into IR.
    pub fn compile_program(
        &self,
        program: &Program,
        module_name: &str,
    ) -> Result<ir::Module, CompileError> {
        let generator = CodeGenerator {
            target_triple: self.target_triple.clone(),
        };
        generator.generate(program, module_name)
    }

    /// Read and compile a source file. The module is named after the file.
    pub fn compile_file(&self, path: &Path) -> Result<ir::Module, CompileError> {
        let source = fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let module_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string());
        self.compile_source(&source, &module_name)
    }

    /// Build an executable at `output`.
    ///
    /// Intermediate files go to `artifacts_dir` when given, otherwise to a
    /// temporary directory that is removed afterwards.
    pub fn build_executable(
        &self,
        module: &ir::Module,
        output: &Path,
        artifacts_dir: Option<&Path>,
    ) -> Result<Artifacts, CompileError> {
        if module.function(ENTRY_POINT).is_none() {
            return Err(CompileError::Codegen {
                function: ENTRY_POINT.to_string(),
                source: CodegenError::InvalidEntryPoint {
                    reason: "the program defines no 'main' and has no top-level statements"
                        .to_string(),
                },
            });
        }

        let scratch;
        let work_dir = match artifacts_dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|source| CompileError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
                dir
            }
            None => {
                scratch = tempfile::tempdir().map_err(|source| CompileError::Io {
                    path: std::env::temp_dir(),
                    source,
                })?;
                scratch.path()
            }
        };

        let stem = output
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "a.out".to_string());
        let request = BuildRequest {
            work_dir,
            stem: &stem,
            output,
            opt_level: self.opt_level,
        };

        let backend = LlvmToolchain::new(self.toolchain.clone());
        Ok(backend.generate(module, &request)?)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Compilation errors
#[derive(Debug, Error)]
pub enum CompileError {
    /// Tokenizing failed
    #[error("{0}")]
    Lex(LexError),
    /// Parsing failed
    #[error("{0}")]
    Parse(ParseError),
    /// Lowering a function failed
    #[error("in function '{function}'")]
    Codegen {
        function: String,
        source: CodegenError,
    },
    /// The generated module is malformed
    #[error("generated module failed verification")]
    InvalidIr(#[from] VerifyError),
    /// `llc` or the linker failed
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Reading the script or preparing the work directory failed
    #[error("cannot access '{}'", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl CompileError {
    /// The frontend error, if compilation stopped before code generation.
    pub fn frontend(&self) -> Option<FrontendError> {
        match self {
            CompileError::Lex(err) => Some(FrontendError::Lex(err.clone())),
            CompileError::Parse(err) => Some(FrontendError::Parse(err.clone())),
            _ => None,
        }
    }

    /// The semantic error, if code generation failed.
    pub fn codegen(&self) -> Option<&CodegenError> {
        match self {
            CompileError::Codegen { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<FrontendError> for CompileError {
    fn from(err: FrontendError) -> Self {
        match err {
            FrontendError::Lex(err) => CompileError::Lex(err),
            FrontendError::Parse(err) => CompileError::Parse(err),
        }
    }
}
