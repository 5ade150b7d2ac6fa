//! Native executables through `llc` and a C compiler driver.
//!
//! The module is written as textual IR, compiled to a position independent
//! object with `llc`, then linked against the C library by `clang`.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{Artifacts, Backend, BackendError, BuildRequest};
use crate::ir::Module;

/// Overrides the `llc` executable.
pub const LLC_ENV: &str = "TINYPY_LLC";
/// Overrides the compiler driver used for linking.
pub const CC_ENV: &str = "TINYPY_CC";

/// Oldest LLVM release whose `llc` reads opaque-pointer IR, behind a flag.
const MIN_LLVM_MAJOR: u32 = 14;
/// First LLVM release that reads opaque-pointer IR by default.
const OPAQUE_POINTERS_DEFAULT: u32 = 15;

/// Paths of the external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainConfig {
    /// LLVM static compiler
    pub llc: PathBuf,
    /// C compiler driver used as the linker
    pub cc: PathBuf,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            llc: PathBuf::from("llc"),
            cc: PathBuf::from("clang"),
        }
    }
}

impl ToolchainConfig {
    /// Defaults, overridden by `TINYPY_LLC` and `TINYPY_CC` when set.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            llc: env::var_os(LLC_ENV).map_or(defaults.llc, PathBuf::from),
            cc: env::var_os(CC_ENV).map_or(defaults.cc, PathBuf::from),
        }
    }

    /// True when both tools answer `--version`.
    pub fn is_available(&self) -> bool {
        self.llc_available() && responds(&self.cc)
    }

    /// True when `llc` answers `--version`.
    pub fn llc_available(&self) -> bool {
        responds(&self.llc)
    }

    /// Major LLVM version reported by `llc --version`.
    pub fn llc_major_version(&self) -> Option<u32> {
        let output = Command::new(&self.llc).arg("--version").output().ok()?;
        parse_llvm_major(&String::from_utf8_lossy(&output.stdout))
    }
}

fn responds(tool: &Path) -> bool {
    Command::new(tool)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Find `LLVM version X.Y.Z` in `--version` output. Vendor builds prefix the
/// line, e.g. `Ubuntu LLVM version 14.0.0`.
fn parse_llvm_major(version: &str) -> Option<u32> {
    version.lines().find_map(|line| {
        let (_, rest) = line.split_once("LLVM version ")?;
        rest.trim().split('.').next()?.parse().ok()
    })
}

/// Textual IR and the object compiled from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFile {
    /// The `.ll` file
    pub ir: PathBuf,
    /// The `.o` file
    pub object: PathBuf,
    /// The `llc` command line
    pub command: String,
}

/// Backend driving `llc` and a C compiler driver.
pub struct LlvmToolchain {
    config: ToolchainConfig,
}

impl LlvmToolchain {
    /// Backend using the given tools.
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    /// Write `<stem>.ll` into `work_dir` and compile it to `<stem>.o`.
    pub fn compile_object(
        &self,
        module: &Module,
        work_dir: &Path,
        stem: &str,
        opt_level: u8,
    ) -> Result<ObjectFile, BackendError> {
        let ir = work_dir.join(format!("{}.ll", stem));
        let object = work_dir.join(format!("{}.o", stem));
        fs::write(&ir, module.to_string()).map_err(|source| BackendError::Io {
            path: ir.clone(),
            source,
        })?;

        let mut llc = Command::new(&self.config.llc);
        match self.config.llc_major_version() {
            Some(major) if major < MIN_LLVM_MAJOR => {
                return Err(BackendError::UnsupportedVersion {
                    tool: self.config.llc.to_string_lossy().into_owned(),
                    major,
                });
            }
            Some(major) if major < OPAQUE_POINTERS_DEFAULT => {
                llc.arg("-opaque-pointers");
            }
            _ => {}
        }
        llc.arg("-filetype=obj")
            .arg("-relocation-model=pic")
            .arg(format!("-O{}", opt_level.min(3)))
            .arg(&ir)
            .arg("-o")
            .arg(&object);

        let command = describe(&llc);
        run(&mut llc, LLC_ENV)?;
        Ok(ObjectFile {
            ir,
            object,
            command,
        })
    }
}

impl Default for LlvmToolchain {
    fn default() -> Self {
        Self::new(ToolchainConfig::from_env())
    }
}

impl Backend for LlvmToolchain {
    fn generate(&self, module: &Module, request: &BuildRequest<'_>) -> Result<Artifacts, BackendError> {
        let compiled =
            self.compile_object(module, request.work_dir, request.stem, request.opt_level)?;

        let mut cc = Command::new(&self.config.cc);
        if let Some(triple) = &module.target_triple {
            cc.arg(format!("--target={}", triple));
        }
        cc.arg(&compiled.object)
            .arg("-fPIC")
            .arg("-pie")
            .arg("-o")
            .arg(request.output);

        let commands = vec![compiled.command, describe(&cc)];
        run(&mut cc, CC_ENV)?;

        Ok(Artifacts {
            ir: compiled.ir,
            object: compiled.object,
            executable: request.output.to_path_buf(),
            commands,
        })
    }

    fn name(&self) -> &'static str {
        "llvm"
    }
}

/// Run a tool to completion. Its stderr is captured and reported verbatim
/// on failure.
fn run(command: &mut Command, env_var: &'static str) -> Result<(), BackendError> {
    let tool = command.get_program().to_string_lossy().into_owned();
    let output = command.output().map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => BackendError::ToolNotFound {
            tool: tool.clone(),
            env_var,
        },
        _ => BackendError::Io {
            path: PathBuf::from(&tool),
            source: err,
        },
    })?;

    if !output.status.success() {
        return Err(BackendError::Invocation {
            tool,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        });
    }
    Ok(())
}

fn describe(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().into_owned()];
    parts.extend(command.get_args().map(|arg| arg.to_string_lossy().into_owned()));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_module() -> Module {
        Module::new("empty".to_string())
    }

    #[test]
    fn missing_llc_is_reported_by_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = LlvmToolchain::new(ToolchainConfig {
            llc: PathBuf::from("tinypy-no-such-llc"),
            cc: PathBuf::from("tinypy-no-such-cc"),
        });
        let output = dir.path().join("prog");
        let request = BuildRequest {
            work_dir: dir.path(),
            stem: "prog",
            output: &output,
            opt_level: 2,
        };

        let err = backend
            .generate(&empty_module(), &request)
            .expect_err("missing tool must fail");
        match err {
            BackendError::ToolNotFound { tool, env_var } => {
                assert_eq!(tool, "tinypy-no-such-llc");
                assert_eq!(env_var, LLC_ENV);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(dir.path().join("prog.ll").exists());
    }

    #[test]
    fn llvm_major_version_is_read_from_version_banner() {
        let upstream = "LLVM (http://llvm.org/):\n  LLVM version 14.0.6\n  Optimized build.\n";
        assert_eq!(parse_llvm_major(upstream), Some(14));
        let vendor = "Ubuntu LLVM version 17.0.6\n  Optimized build.\n";
        assert_eq!(parse_llvm_major(vendor), Some(17));
        assert_eq!(parse_llvm_major("clang version 17.0.6"), None);
    }

    #[test]
    fn commands_are_rendered_with_arguments() {
        let mut command = Command::new("llc");
        command.arg("-O2").arg("x.ll");
        assert_eq!(describe(&command), "llc -O2 x.ll");
    }
}
