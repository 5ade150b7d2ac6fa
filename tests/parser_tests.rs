use tinypy::parser::ast::{
    BinaryOp, BoolOperator, CompareOp, Constant, Expr, Stmt, TypeAnnotation, UnaryOperator,
};

fn parse(source: &str) -> Vec<Stmt> {
    let tokens = tinypy::lexer::lex(source).expect("lex should succeed");
    let mut parser = tinypy::parser::Parser::new(tokens);
    let program = parser.parse_program().expect("parse should succeed");
    program.statements
}

fn parse_error(source: &str) -> tinypy::parser::ParseError {
    let tokens = tinypy::lexer::lex(source).expect("lex should succeed");
    let mut parser = tinypy::parser::Parser::new(tokens);
    parser.parse_program().expect_err("parse should fail")
}

#[test]
fn parses_function_definition() {
    let statements = parse("def add(a, b: float) -> float:\n    return a + b\n");
    match &statements[0] {
        Stmt::FunctionDef {
            name,
            params,
            return_type,
            body,
        } => {
            assert_eq!(name, "add");
            assert_eq!(params.len(), 2);
            assert_eq!(params[0].annotation, None);
            assert_eq!(params[1].annotation, Some(TypeAnnotation::Float));
            assert_eq!(*return_type, Some(TypeAnnotation::Float));
            assert!(matches!(body[0], Stmt::Return { value: Some(_) }));
        }
        _ => panic!("expected function definition"),
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let statements = parse("x = a + b * 2\n");
    match &statements[0] {
        Stmt::Assign { target, value } => {
            assert_eq!(target, "x");
            match value {
                Expr::BinOp { op, rhs, .. } => {
                    assert_eq!(*op, BinaryOp::Add);
                    assert!(matches!(
                        **rhs,
                        Expr::BinOp {
                            op: BinaryOp::Mult,
                            ..
                        }
                    ));
                }
                _ => panic!("expected binary expression"),
            }
        }
        _ => panic!("expected assignment"),
    }
}

#[test]
fn parses_print_statement() {
    let statements = parse("print(1, \"two\")\n");
    match &statements[0] {
        Stmt::Print { args } => {
            assert_eq!(args.len(), 2);
            assert_eq!(args[1], Expr::Constant(Constant::Str("two".to_string())));
        }
        _ => panic!("expected print statement"),
    }
}

#[test]
fn elif_becomes_nested_if() {
    let statements = parse("if a > 1:\n    pass\nelif a < 0:\n    pass\nelse:\n    x = 1\n");
    match &statements[0] {
        Stmt::If { orelse, .. } => {
            assert_eq!(orelse.len(), 1);
            match &orelse[0] {
                Stmt::If { test, orelse, .. } => {
                    assert!(matches!(
                        test,
                        Expr::Compare {
                            op: CompareOp::Lt,
                            ..
                        }
                    ));
                    assert!(matches!(orelse[0], Stmt::Assign { .. }));
                }
                _ => panic!("expected nested if"),
            }
        }
        _ => panic!("expected if statement"),
    }
}

#[test]
fn boolean_operator_precedence() {
    let statements = parse("x = not a or b and c\n");
    match &statements[0] {
        Stmt::Assign { value, .. } => match value {
            Expr::BoolOp { lhs, op, rhs } => {
                assert_eq!(*op, BoolOperator::Or);
                assert!(matches!(
                    **lhs,
                    Expr::UnaryOp {
                        op: UnaryOperator::Not,
                        ..
                    }
                ));
                assert!(matches!(
                    **rhs,
                    Expr::BoolOp {
                        op: BoolOperator::And,
                        ..
                    }
                ));
            }
            _ => panic!("expected boolean operation"),
        },
        _ => panic!("expected assignment"),
    }
}

#[test]
fn single_line_suites() {
    let statements = parse("def f(n):\n    if n > 0: return 1\n    return 0\n");
    match &statements[0] {
        Stmt::FunctionDef { body, .. } => {
            assert_eq!(body.len(), 2);
            assert!(matches!(&body[0], Stmt::If { body, .. } if body.len() == 1));
        }
        _ => panic!("expected function definition"),
    }
}

#[test]
fn call_statements_are_expressions() {
    let statements = parse("greet()\n");
    assert_eq!(
        statements[0],
        Stmt::Expr(Expr::Call {
            func: "greet".to_string(),
            args: Vec::new(),
        })
    );
}

#[test]
fn rejects_loops() {
    let err = parse_error("while x:\n    pass\n");
    assert!(err.message.contains("loops are not supported"));
    assert_eq!(err.line, 1);
}

#[test]
fn rejects_chained_comparisons() {
    let err = parse_error("x = 1 < y < 3\n");
    assert!(err.message.contains("chained comparisons"));
}

#[test]
fn rejects_duplicate_parameters() {
    let err = parse_error("def f(a, a):\n    pass\n");
    assert!(err.message.contains("duplicate parameter 'a'"));
    assert_eq!(err.column, 10);
}

#[test]
fn rejects_unknown_annotations() {
    let err = parse_error("def f(a: str):\n    pass\n");
    assert!(err.message.contains("unsupported type annotation 'str'"));
}

#[test]
fn missing_block_is_reported() {
    let err = parse_error("if x:\npass\n");
    assert!(err.message.contains("expected an indented block"));
    assert_eq!(err.line, 2);
}
