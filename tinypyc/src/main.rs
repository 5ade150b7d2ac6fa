//! Command line driver for tinypyc.
//!
//! ```bash
//! # build ./fib from fib.py
//! tinypyc fib.py
//!
//! # print the LLVM IR without linking
//! tinypyc fib.py --emit ir --no-link
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;

use tinypyc::{CompileError, Compiler};

#[derive(Parser)]
#[command(name = "tinypyc", about = "tinypy ahead-of-time compiler", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Python source file to compile
    script: PathBuf,

    /// Path of the executable, defaults to the script name without extension
    #[arg(short, long, value_name = "EXE")]
    output: Option<PathBuf>,

    /// Print the compiled module to stdout
    #[arg(long, value_enum)]
    emit: Option<Emit>,

    /// Stop after code generation, do not invoke llc or the linker
    #[arg(long)]
    no_link: bool,

    /// Optimization level passed to llc
    #[arg(short = 'O', default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    opt_level: u8,

    /// Target triple written into the module and passed to the linker
    #[arg(long, value_name = "TRIPLE")]
    target: Option<String>,

    /// Keep the intermediate .ll and .o files in this directory
    #[arg(long, value_name = "DIR")]
    keep_artifacts: Option<PathBuf>,

    /// Report each compilation phase on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Textual LLVM IR
    Ir,
    /// The IR module as JSON
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&cli.script, &err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let source = fs::read_to_string(&cli.script)
        .with_context(|| format!("failed to read '{}'", cli.script.display()))?;
    let module_name = cli
        .script
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string());

    let compiler = Compiler {
        opt_level: cli.opt_level,
        target_triple: cli.target.clone(),
        ..Compiler::new()
    };

    let program = tinypy::parse_source(&source).map_err(CompileError::from)?;
    log(cli, format!("parsed {} definitions", program.functions().count()));

    let module = compiler.compile_program(&program, &module_name)?;
    for function in &module.functions {
        log(
            cli,
            format!(
                "emitted function {} ({} blocks)",
                function.name(),
                function.blocks.len()
            ),
        );
    }

    match cli.emit {
        Some(Emit::Ir) => print!("{}", module),
        Some(Emit::Json) => println!("{}", module.to_json().context("failed to serialize module")?),
        None => {}
    }

    if cli.no_link {
        return Ok(());
    }

    let output = cli.output.clone().unwrap_or_else(|| default_output(&cli.script));
    if output == cli.script {
        bail!("refusing to overwrite the script '{}' with the executable", output.display());
    }
    let artifacts = compiler.build_executable(&module, &output, cli.keep_artifacts.as_deref())?;
    for command in &artifacts.commands {
        log(cli, format!("ran {}", command));
    }
    log(cli, format!("wrote {}", artifacts.executable.display()));
    Ok(())
}

/// The script path without its extension. A script without an extension
/// gets `.out` appended so the executable never replaces the source.
fn default_output(script: &Path) -> PathBuf {
    match script.extension() {
        Some(_) => script.with_extension(""),
        None => {
            let mut name = script.as_os_str().to_os_string();
            name.push(".out");
            PathBuf::from(name)
        }
    }
}

fn log(cli: &Cli, message: String) {
    if cli.verbose {
        eprintln!("{} {}", "tinypyc:".cyan().bold(), message);
    }
}

fn report(script: &Path, err: &anyhow::Error) {
    let label = script.display().to_string();
    let frontend = err
        .downcast_ref::<CompileError>()
        .and_then(CompileError::frontend);

    match (frontend, fs::read_to_string(script)) {
        (Some(frontend), Ok(source)) => {
            eprintln!("{} {}", "error:".red().bold(), frontend.render(&label, &source));
        }
        _ => {
            eprintln!("{} {}: {:#}", "error:".red().bold(), label, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_drops_the_script_extension() {
        assert_eq!(default_output(Path::new("demos/fib.py")), PathBuf::from("demos/fib"));
        assert_eq!(default_output(Path::new("fib.tar.py")), PathBuf::from("fib.tar"));
    }

    #[test]
    fn extensionless_scripts_are_never_overwritten() {
        let script = Path::new("scripts/prog");
        let output = default_output(script);
        assert_ne!(output, script);
        assert_eq!(output, PathBuf::from("scripts/prog.out"));
    }
}
