//! Integration tests for the tinypyc code generator

use tinypyc::codegen::CodegenError;
use tinypyc::ir::{Constant, ReturnType, ScalarType, Terminator, Value};
use tinypyc::*;

fn compile(source: &str) -> ir::Module {
    Compiler::new()
        .compile_source(source, "test.py")
        .expect("compile should succeed")
}

fn codegen_error(source: &str) -> (String, CodegenError) {
    match Compiler::new().compile_source(source, "test.py") {
        Err(CompileError::Codegen { function, source }) => (function, source),
        Err(other) => panic!("expected a codegen error, got: {other}"),
        Ok(module) => panic!("expected a codegen error, got module:\n{module}"),
    }
}

fn count_terminators(func: &ir::Function, pred: impl Fn(&Terminator) -> bool) -> usize {
    func.blocks
        .iter()
        .filter_map(|block| block.terminator.as_ref())
        .filter(|term| pred(term))
        .count()
}

#[test]
fn test_straight_line_function_has_one_block() {
    let module = compile("def add(a, b):\n    return a + b * 2\n");
    let func = module.function("add").expect("add is defined");

    assert_eq!(func.blocks.len(), 1);
    assert_eq!(
        func.opcodes(),
        vec!["store", "store", "load", "load", "mul", "add", "ret"]
    );
    assert_eq!(func.signature.ret, ReturnType::Scalar(ScalarType::Int));

    let text = module.to_string();
    assert!(text.contains("define i32 @add(i32 %a.param, i32 %b.param) {"));
    assert!(text.contains("  %a.addr = alloca i32, align 4"));
    assert!(text.contains("  %t2 = mul i32 %t1, 2"));
    assert!(text.contains("  %t3 = add i32 %t0, %t2"));
    assert!(text.contains("  ret i32 %t3"));
}

#[test]
fn test_if_else_builds_a_diamond() {
    let source = "\
def main():
    x = 5
    if x > 3:
        print(1)
    else:
        print(0)
";
    let module = compile(source);
    let main = module.function("main").expect("main is defined");

    let labels: Vec<&str> = main.blocks.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["entry", "if.then.0", "if.else.0", "if.end.0"]);
    assert_eq!(
        count_terminators(main, |t| matches!(t, Terminator::CondBranch { .. })),
        1
    );
    assert_eq!(
        count_terminators(main, |t| matches!(t, Terminator::Branch(_))),
        2
    );
    assert_eq!(
        main.blocks[3].terminator,
        Some(Terminator::Return(Some(Value::Const(Constant::Int(0)))))
    );

    // both prints share one format string
    assert_eq!(module.globals.len(), 1);
    assert_eq!(module.globals[0].value, "%d\n");
}

#[test]
fn test_if_without_else_branches_to_merge() {
    let module = compile("def f(n):\n    y = 0\n    if n > 0:\n        y = 1\n    return y\n");
    let func = module.function("f").expect("f is defined");

    assert_eq!(func.blocks.len(), 3);
    match func.blocks[0].terminator {
        Some(Terminator::CondBranch {
            then_block,
            else_block,
            ..
        }) => {
            assert_eq!(func.blocks[then_block.index()].label, "if.then.0");
            assert_eq!(func.blocks[else_block.index()].label, "if.end.0");
        }
        ref other => panic!("expected conditional branch, got {other:?}"),
    }
}

#[test]
fn test_returning_arms_leave_merge_unreachable() {
    let module = compile("def sign(n):\n    if n > 0:\n        return 1\n    else:\n        return -1\n");
    let func = module.function("sign").expect("sign is defined");

    assert_eq!(func.blocks.len(), 4);
    assert_eq!(func.blocks[3].terminator, Some(Terminator::Unreachable));
    assert_eq!(
        count_terminators(func, |t| matches!(t, Terminator::Branch(_))),
        0
    );
    assert!(module.to_string().contains("ret i32 -1"));
}

#[test]
fn test_elif_nests_a_second_if() {
    let source = "\
def grade(n):
    if n > 90:
        return 1
    elif n > 50:
        return 2
    return 3
";
    let func_labels: Vec<String> = compile(source)
        .function("grade")
        .expect("grade is defined")
        .blocks
        .iter()
        .map(|b| b.label.clone())
        .collect();
    assert_eq!(
        func_labels,
        vec!["entry", "if.then.0", "if.else.0", "if.end.0", "if.then.1", "if.end.1"]
    );
}

#[test]
fn test_generation_is_idempotent() {
    let source = "\
def fact(n):
    if n <= 1:
        return 1
    return n * fact(n - 1)

print(fact(5), 2.5, 1 < 2)
";
    let first = compile(source);
    let second = compile(source);
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn test_forward_and_recursive_calls() {
    let source = "\
def main():
    print(fact(5))

def fact(n):
    if n <= 1:
        return 1
    return n * fact(n - 1)
";
    let module = compile(source);
    let text = module.to_string();
    assert!(text.contains("call i32 @fact(i32 5)"));
    assert!(text.contains("call i32 @fact(i32 %t"));
}

#[test]
fn test_script_statements_become_main() {
    let module = compile("a = 3\nb = 4\nprint(a + b * 2)\n");
    let main = module.function("main").expect("main is synthesized");

    assert_eq!(main.signature.params.len(), 0);
    assert_eq!(main.blocks.len(), 1);
    assert_eq!(
        main.opcodes(),
        vec!["store", "store", "load", "load", "mul", "add", "call", "ret"]
    );
    assert!(module.to_string().contains("ret i32 0"));
}

#[test]
fn test_float_functions() {
    let module = compile("def half(x: float) -> float:\n    return x / 2.0\n\nprint(half(3.0))\n");
    let text = module.to_string();

    assert!(text.contains("define double @half(double %x.param) {"));
    assert!(text.contains("fdiv double %t0, 0x4000000000000000"));
    assert!(text.contains("call double @half(double 0x4008000000000000)"));
    assert!(text.contains("c\"%f\\0A\\00\""));
}

#[test]
fn test_print_layout() {
    let text = compile("print(\"hi\", 3)\nprint()\n").to_string();
    assert!(text.contains("@.str.0 = private unnamed_addr constant [3 x i8] c\"hi\\00\", align 1"));
    assert!(text.contains(
        "@.str.1 = private unnamed_addr constant [7 x i8] c\"%s %d\\0A\\00\", align 1"
    ));
    assert!(text.contains("@.str.2 = private unnamed_addr constant [2 x i8] c\"\\0A\\00\", align 1"));
    assert!(text.contains("declare i32 @printf(ptr, ...)"));
    assert!(text.contains("call i32 (ptr, ...) @printf(ptr @.str.1, ptr @.str.0, i32 3)"));
    assert!(text.contains("call i32 (ptr, ...) @printf(ptr @.str.2)"));
}

#[test]
fn test_bools_print_as_words() {
    let text = compile("print(1 < 2)\n").to_string();
    assert!(text.contains("%t0 = icmp slt i32 1, 2"));
    assert!(text.contains("%t1 = select i1 %t0, ptr @.str.0, ptr @.str.1"));
    assert!(text.contains("c\"True\\00\""));
    assert!(text.contains("c\"False\\00\""));
    assert!(text.contains("@printf(ptr @.str.2, ptr %t1)"));
}

#[test]
fn test_boolean_operators_are_bitwise() {
    let text = compile("def f(a, b):\n    if a > 0 and not b > 0:\n        return 1\n    return 0\n")
        .to_string();
    assert!(text.contains("xor i1 %t"));
    assert!(text.contains(", true"));
    assert!(text.contains("and i1 %t"));
}

#[test]
fn test_void_functions() {
    let text = compile("def greet():\n    print(1)\n\ngreet()\n").to_string();
    assert!(text.contains("define void @greet() {"));
    assert!(text.contains("  ret void"));
    assert!(text.contains("  call void @greet()"));
}

#[test]
fn test_module_renders_as_json() {
    let module = compile("print(1)\n");
    let json = module.to_json().expect("serialize");
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(parsed["name"], "test.py");
    assert_eq!(parsed["functions"][0]["signature"]["name"], "main");
}

#[test]
fn test_target_triple_is_recorded() {
    let compiler = Compiler {
        target_triple: Some("x86_64-pc-linux-gnu".to_string()),
        ..Compiler::new()
    };
    let module = compiler
        .compile_source("print(1)\n", "t.py")
        .expect("compile should succeed");
    assert!(module
        .to_string()
        .contains("target triple = \"x86_64-pc-linux-gnu\""));
}

#[test]
fn test_arity_mismatch() {
    let (function, err) = codegen_error("def inc(x):\n    return x + 1\n\nprint(inc(1, 2))\n");
    assert_eq!(function, "main");
    assert_eq!(
        err,
        CodegenError::ArityMismatch {
            callee: "inc".to_string(),
            expected: 1,
            found: 2,
        }
    );
}

#[test]
fn test_division_by_literal_zero() {
    let (function, err) = codegen_error("def f(y):\n    return y / 0\n");
    assert_eq!(function, "f");
    assert_eq!(err, CodegenError::DivisionByZero);

    let (_, err) = codegen_error("def g(y: float) -> float:\n    return y / -0.0\n");
    assert_eq!(err, CodegenError::DivisionByZero);
}

#[test]
fn test_code_after_return_is_dead() {
    let (_, err) = codegen_error("def f():\n    return 1\n    x = 2\n");
    assert_eq!(err, CodegenError::DeadCode);

    let (_, err) = codegen_error(
        "def g(n):\n    if n > 0:\n        return 1\n    else:\n        return 2\n    print(n)\n",
    );
    assert_eq!(err, CodegenError::DeadCode);
}

#[test]
fn test_missing_return() {
    let (function, err) = codegen_error("def f(n):\n    if n > 0:\n        return 1\n");
    assert_eq!(function, "f");
    assert_eq!(
        err,
        CodegenError::MissingReturn {
            expected: ScalarType::Int
        }
    );
}

#[test]
fn test_redeclaration_with_another_type() {
    let (_, err) = codegen_error("x = 1\nx = 2.5\n");
    assert_eq!(
        err,
        CodegenError::Redeclaration {
            name: "x".to_string(),
            previous: ScalarType::Int,
            attempted: ScalarType::Float,
        }
    );
}

#[test]
fn test_unbound_name() {
    let (_, err) = codegen_error("print(y)\n");
    assert_eq!(
        err,
        CodegenError::UnboundName {
            name: "y".to_string()
        }
    );
}

#[test]
fn test_type_mismatches() {
    for source in [
        "x = 1 + 2.0\n",
        "x = \"text\"\n",
        "x = 1 < 2\n",
        "def f(a: float) -> float:\n    return a\n\nprint(f(1))\n",
        "def f() -> int:\n    return 1.5\n",
        "def f():\n    print(1)\n\nx = f()\n",
        "def f() -> int:\n    return\n",
        "if 1:\n    print(1)\n",
        "x = 3000000000\n",
    ] {
        match Compiler::new().compile_source(source, "t.py") {
            Err(CompileError::Codegen {
                source: CodegenError::TypeMismatch { .. },
                ..
            }) => {}
            other => panic!("expected a type mismatch for {source:?}, got {other:?}"),
        }
    }
}

#[test]
fn test_entry_point_rules() {
    let (_, err) = codegen_error("def main():\n    print(1)\n\nprint(2)\n");
    assert_eq!(err, CodegenError::ConflictingEntryPoint);

    let (_, err) = codegen_error("def main(argc):\n    return 0\n");
    assert!(matches!(err, CodegenError::InvalidEntryPoint { .. }));

    let (_, err) = codegen_error("def f():\n    pass\n\ndef f():\n    pass\n");
    assert_eq!(
        err,
        CodegenError::DuplicateFunction {
            name: "f".to_string()
        }
    );
}

#[test]
fn test_top_level_main_call_is_the_entry_point() {
    let module = compile("def main():\n    print(1)\n\nmain()\n");
    assert_eq!(module.functions.len(), 1);
    assert!(!module.to_string().contains("call i32 @main"));

    let (_, err) = codegen_error("def main():\n    print(1)\n\nmain()\nmain()\n");
    assert_eq!(err, CodegenError::ConflictingEntryPoint);

    let (_, err) = codegen_error("def main():\n    print(1)\n\nprint(0)\nmain()\n");
    assert_eq!(err, CodegenError::ConflictingEntryPoint);
}

#[test]
fn test_docstrings_are_ignored() {
    let module = compile("\"module docs\"\n\ndef main():\n    \"doc\"\n    return 0\n");
    assert_eq!(module.functions.len(), 1);
}

#[test]
fn test_bare_return_in_main_exits_cleanly() {
    let module = compile("def main():\n    return\n");
    let main = module.function("main").expect("main is defined");
    assert_eq!(
        main.blocks[0].terminator,
        Some(Terminator::Return(Some(Value::Const(Constant::Int(0)))))
    );
}

#[test]
fn test_demo_programs_compile() {
    let fib = compile(include_str!("../../demos/fib.py"));
    let names: Vec<&str> = fib.functions.iter().map(|f| f.name()).collect();
    assert_eq!(names, vec!["fibonacci", "factorial", "main"]);
    assert!(fib.to_string().contains("c\"%s %d\\0A\\00\""));

    let temperature = compile(include_str!("../../demos/temperature.py"));
    let describe = temperature.function("describe").expect("describe is defined");
    assert_eq!(describe.signature.ret, ReturnType::Void);
    assert!(temperature.to_string().contains("fcmp oeq double"));
}

/// Every `%name` defined in each function body, parameters included.
fn local_definitions(text: &str) -> Vec<Vec<String>> {
    let mut functions = Vec::new();
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("define ") {
            let params = rest
                .split_once('(')
                .and_then(|(_, tail)| tail.split_once(')'))
                .map(|(params, _)| params)
                .unwrap_or("");
            let names: Vec<String> = params
                .split(", ")
                .filter_map(|param| param.split_once(" %"))
                .map(|(_, name)| name.to_string())
                .collect();
            functions.push(names);
        } else if let Some((lhs, _)) = line.trim_start().split_once(" = ") {
            if let (Some(name), Some(current)) = (lhs.strip_prefix('%'), functions.last_mut()) {
                current.push(name.to_string());
            }
        }
    }
    functions
}

#[test]
fn test_local_names_are_unique_per_function() {
    let source = "\
def f(addr):
    p = 1
    return addr + p

def g(x, param):
    x = x + 1
    if param > 0:
        t0 = 2
        return x + t0
    return x

print(f(2), g(1, 2))
";
    let text = compile(source).to_string();
    assert!(text.contains("define i32 @f(i32 %addr.param) {"));
    assert!(text.contains("  %p.addr = alloca i32, align 4"));

    for names in local_definitions(&text) {
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len(), "duplicate locals in {names:?}");
    }
}
