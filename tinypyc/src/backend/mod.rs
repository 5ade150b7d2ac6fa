//! Code generation backends
//!
//! A backend turns a verified module into a native executable. The only
//! implementation drives the LLVM command line tools.

pub mod llvm;

pub use llvm::{LlvmToolchain, ObjectFile, ToolchainConfig};

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ir::Module;

/// Code generation backend trait
pub trait Backend {
    /// Produce an executable for `module`
    fn generate(&self, module: &Module, request: &BuildRequest<'_>) -> Result<Artifacts, BackendError>;

    /// Get backend name
    fn name(&self) -> &'static str;
}

/// Where a build puts its files
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    /// Directory receiving the intermediate `.ll` and `.o` files
    pub work_dir: &'a Path,
    /// File stem for the intermediate files
    pub stem: &'a str,
    /// Path of the final executable
    pub output: &'a Path,
    /// Optimization level passed to the code generator (0-3)
    pub opt_level: u8,
}

/// Files written by a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// Textual IR handed to `llc`
    pub ir: PathBuf,
    /// Object file produced by `llc`
    pub object: PathBuf,
    /// Linked executable
    pub executable: PathBuf,
    /// External commands in the order they ran
    pub commands: Vec<String>,
}

/// Failures of the external build tools
#[derive(Debug, Error)]
pub enum BackendError {
    /// The tool could not be started
    #[error("'{tool}' was not found; install LLVM 14 or later or set {env_var}")]
    ToolNotFound { tool: String, env_var: &'static str },
    /// The tool predates opaque pointers and cannot read the emitted IR
    #[error("'{tool}' is from LLVM {major}; LLVM 14 or later is required")]
    UnsupportedVersion { tool: String, major: u32 },
    /// The tool ran and exited unsuccessfully
    #[error("'{tool}' failed ({status}):\n{stderr}")]
    Invocation {
        tool: String,
        status: String,
        stderr: String,
    },
    /// Reading or writing an intermediate file failed
    #[error("I/O error on '{}'", path.display())]
    Io { path: PathBuf, source: io::Error },
}
