//! End-to-end tests that build and run executables. They return early when
//! `llc` or `clang` is not installed; the object-only tests need just `llc`.

use std::process::Command;

use tinypyc::backend::LlvmToolchain;
use tinypyc::Compiler;

/// Compile `source` down to an object file with `llc` alone.
fn compile_to_object(source: &str) {
    let compiler = Compiler::new();
    if !compiler.toolchain.llc_available() {
        eprintln!("skipping: llc not available");
        return;
    }

    let module = compiler
        .compile_source(source, "obj.py")
        .expect("compile should succeed");
    let dir = tempfile::tempdir().expect("tempdir");
    let compiled = LlvmToolchain::new(compiler.toolchain.clone())
        .compile_object(&module, dir.path(), "obj", 0)
        .unwrap_or_else(|err| panic!("llc rejected the module: {err}\n{module}"));
    assert!(compiled.object.exists());
}

fn build_and_run(source: &str) -> Option<String> {
    let compiler = Compiler {
        opt_level: 2,
        ..Compiler::new()
    };
    if !compiler.toolchain.is_available() {
        eprintln!("skipping: llc/clang not available");
        return None;
    }

    let module = compiler
        .compile_source(source, "e2e.py")
        .expect("compile should succeed");
    let dir = tempfile::tempdir().expect("tempdir");
    let exe = dir.path().join("prog");
    let artifacts = compiler
        .build_executable(&module, &exe, Some(dir.path()))
        .expect("build should succeed");
    assert!(artifacts.ir.exists());
    assert!(artifacts.object.exists());

    let output = Command::new(&exe).output().expect("run executable");
    assert!(output.status.success(), "exit status {:?}", output.status);
    Some(String::from_utf8(output.stdout).expect("utf-8 output"))
}

#[test]
fn prints_arithmetic_result() {
    let Some(stdout) = build_and_run("a = 3\nb = 4\nprint(a + b * 2)\n") else {
        return;
    };
    assert_eq!(stdout, "11\n");
}

#[test]
fn takes_the_then_branch() {
    let source = "\
def main():
    x = 5
    if x > 3:
        print(1)
    else:
        print(0)
";
    let Some(stdout) = build_and_run(source) else {
        return;
    };
    assert_eq!(stdout, "1\n");
}

#[test]
fn recursion_and_mixed_print() {
    let source = "\
def fact(n):
    if n <= 1:
        return 1
    return n * fact(n - 1)

def half(x: float) -> float:
    return x / 2.0

print(fact(5), half(5.0), fact(3) == 6, \"done\")
";
    let Some(stdout) = build_and_run(source) else {
        return;
    };
    assert_eq!(stdout, "120 2.500000 True done\n");
}

#[test]
fn runs_the_fibonacci_demo() {
    let Some(stdout) = build_and_run(include_str!("../../demos/fib.py")) else {
        return;
    };
    assert_eq!(stdout, "Fibonacci: 5\nFactorial: 120\n");
}

#[test]
fn llc_accepts_parameters_and_locals_with_similar_names() {
    let source = "\
def f(addr):
    p = 1
    return addr + p

print(f(2))
";
    compile_to_object(source);
}

#[test]
fn llc_accepts_every_demo() {
    compile_to_object(include_str!("../../demos/fib.py"));
    compile_to_object(include_str!("../../demos/temperature.py"));
}

#[test]
fn llc_accepts_bool_and_float_printing() {
    let source = "\
def check(x: float) -> float:
    if x > 1.0 and not x == 2.0:
        return -x
    return x / 4.0

print(check(3.0), check(2.0) < 1.0, \"ok\")
";
    compile_to_object(source);
}
