use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn script(dir: &tempfile::TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, source).expect("write script");
    path
}

#[test]
fn emits_llvm_ir() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = script(&dir, "add.py", "def add(a, b):\n    return a + b\n\nprint(add(1, 2))\n");

    let mut cmd = Command::cargo_bin("tinypyc")?;
    cmd.arg(&path).arg("--emit").arg("ir").arg("--no-link");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("define i32 @add(i32 %a.param, i32 %b.param)"))
        .stdout(predicate::str::contains("define i32 @main()"));
    Ok(())
}

#[test]
fn emits_json() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = script(&dir, "one.py", "print(1)\n");

    let mut cmd = Command::cargo_bin("tinypyc")?;
    cmd.arg(&path).args(["--emit", "json", "--no-link"]);
    let output = cmd.output()?;
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["name"], "one.py");
    Ok(())
}

#[test]
fn verbose_reports_phases() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = script(&dir, "v.py", "def f():\n    pass\n\nf()\n");

    let mut cmd = Command::cargo_bin("tinypyc")?;
    cmd.arg(&path).args(["--no-link", "-v"]);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("parsed 1 definitions"))
        .stderr(predicate::str::contains("emitted function main (1 blocks)"));
    Ok(())
}

#[test]
fn division_by_zero_fails_before_linking() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = script(&dir, "div.py", "y = 4\nprint(y / 0)\n");

    let mut cmd = Command::cargo_bin("tinypyc")?;
    cmd.arg(&path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("in function 'main': division by zero"));
    assert!(!dir.path().join("div").exists());
    Ok(())
}

#[test]
fn syntax_errors_show_the_source_line() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = script(&dir, "bad.py", "x = 1\ny = $\n");

    let mut cmd = Command::cargo_bin("tinypyc")?;
    cmd.arg(&path).arg("--no-link");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains(":2:5: unexpected character '$'"))
        .stderr(predicate::str::contains("y = $\n    ^"));
    Ok(())
}

#[test]
fn missing_script_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("tinypyc")?;
    cmd.arg("does-not-exist.py");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to read 'does-not-exist.py'"));
    Ok(())
}

#[test]
fn rejects_unknown_optimization_levels() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("tinypyc")?;
    cmd.args(["x.py", "-O", "7"]);
    cmd.assert().failure();
    Ok(())
}

#[test]
fn never_overwrites_the_script() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let source = "print(1)\n";
    let path = script(&dir, "prog", source);

    let mut cmd = Command::cargo_bin("tinypyc")?;
    cmd.arg(&path).arg("-o").arg(&path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("refusing to overwrite the script"));
    assert_eq!(fs::read_to_string(&path)?, source);
    Ok(())
}
