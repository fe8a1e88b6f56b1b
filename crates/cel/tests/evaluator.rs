//! End-to-end coverage of the tree-walking evaluator through the public
//! `Environment`/`Program`/`Runner` façade.

use cel::{BinaryOp, CelType, Environment, EvalErrorKind, Expr, Literal, UnaryOp, Value};

fn lit_int(v: i64) -> Expr {
    Expr::Literal(Literal::Int(v))
}

fn lit_str(v: &str) -> Expr {
    Expr::Literal(Literal::String(v.into()))
}

fn run(ast: Expr, bindings: &[(&str, Value)]) -> Result<Value, cel::EvalError> {
    let env = Environment::new();
    let program = env.program(ast);
    program.interpreted_runner().evaluate(bindings)
}

#[test]
fn arithmetic_respects_precedence_via_explicit_tree() {
    // 2 + 3 * 4
    let ast = Expr::Binary(
        BinaryOp::Add,
        lit_int(2).boxed(),
        Expr::Binary(BinaryOp::Mul, lit_int(3).boxed(), lit_int(4).boxed()).boxed(),
    );
    assert_eq!(run(ast, &[]).unwrap(), Value::Int(14));
}

#[test]
fn string_concatenation() {
    let ast = Expr::Binary(BinaryOp::Add, lit_str("foo").boxed(), lit_str("bar").boxed());
    assert_eq!(run(ast, &[]).unwrap(), Value::String("foobar".into()));
}

#[test]
fn list_literal_short_circuits_on_first_error() {
    let bad = Expr::Binary(BinaryOp::Div, lit_int(1).boxed(), lit_int(0).boxed());
    let ast = Expr::ListLit(vec![lit_int(1), bad, lit_int(2)]);
    let err = run(ast, &[]).unwrap_err();
    assert_eq!(err.kind, EvalErrorKind::DivideByZero);
}

#[test]
fn map_literal_rejects_duplicate_keys() {
    let ast = Expr::MapLit(vec![(lit_str("a"), lit_int(1)), (lit_str("a"), lit_int(2))]);
    let err = run(ast, &[]).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::DuplicateKey(_)));
}

#[test]
fn conditional_only_evaluates_the_taken_branch() {
    // true ? 1 : (1 / 0)
    let ast = Expr::Conditional(
        Expr::Literal(Literal::Bool(true)).boxed(),
        lit_int(1).boxed(),
        Expr::Binary(BinaryOp::Div, lit_int(1).boxed(), lit_int(0).boxed()).boxed(),
    );
    assert_eq!(run(ast, &[]).unwrap(), Value::Int(1));
}

#[test]
fn logical_and_lets_false_win_over_an_error() {
    // (1 / 0) && false -- false decides regardless of the left Error.
    let left = Expr::Binary(BinaryOp::Div, lit_int(1).boxed(), lit_int(0).boxed());
    let ast = Expr::Binary(BinaryOp::And, left.boxed(), Expr::Literal(Literal::Bool(false)).boxed());
    assert_eq!(run(ast, &[]).unwrap(), Value::Bool(false));
}

#[test]
fn membership_across_a_list() {
    let ast = Expr::Binary(BinaryOp::In, lit_int(2).boxed(), Expr::ListLit(vec![lit_int(1), lit_int(2), lit_int(3)]).boxed());
    assert_eq!(run(ast, &[]).unwrap(), Value::Bool(true));
}

#[test]
fn unary_negation_and_not() {
    assert_eq!(run(Expr::Unary(UnaryOp::Neg, lit_int(5).boxed()), &[]).unwrap(), Value::Int(-5));
    assert_eq!(
        run(Expr::Unary(UnaryOp::Not, Expr::Literal(Literal::Bool(false)).boxed()), &[]).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn bound_identifier_resolves_at_evaluate_time() {
    let ast = Expr::Ident("name".to_string());
    let result = run(ast, &[("name", Value::String("world".into()))]).unwrap();
    assert_eq!(result, Value::String("world".into()));
}

#[test]
fn undeclared_identifier_surfaces_as_a_result_err() {
    let err = run(Expr::Ident("nope".to_string()), &[]).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::UndeclaredReference { .. }));
}

#[test]
fn declared_but_unbound_identifier_resolves_to_its_type() {
    let mut env = Environment::new();
    env.declare("amount", CelType::Int);
    let program = env.program(Expr::Ident("amount".to_string()));
    let result = program.interpreted_runner().evaluate(&[]).unwrap();
    assert_eq!(result, Value::Type(CelType::Int));
}

#[test]
fn field_selection_prefers_declared_namespace_over_map_indexing() {
    // google.type is declared as a namespace; selecting through it should
    // not be confused with indexing a map named "google".
    let mut env = Environment::new();
    env.declare("google.type.Timestamp", CelType::Timestamp);
    let ast = Expr::MemberDot(Expr::Ident("google".to_string()).boxed(), "type".to_string());
    let program = env.program(ast);
    let result = program.interpreted_runner().evaluate(&[]);
    assert!(result.is_ok());
}

#[test]
fn host_function_is_callable_by_name() {
    let mut env = Environment::new();
    env.register_function("double", std::rc::Rc::new(|args: &[Value]| match &args[0] {
        Value::Int(i) => Value::Int(i * 2),
        _ => Value::Null,
    }));
    let ast = Expr::IdentArg("double".to_string(), vec![lit_int(21)]);
    let program = env.program(ast);
    assert_eq!(program.interpreted_runner().evaluate(&[]).unwrap(), Value::Int(42));
}
