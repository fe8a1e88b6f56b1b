//! Checks that `transpiled_runner` produces exactly what `interpreted_runner`
//! produces, across every node kind the transpiler lowers.

use cel::{BinaryOp, Environment, Expr, Literal, UnaryOp, Value};

fn lit_int(v: i64) -> Expr {
    Expr::Literal(Literal::Int(v))
}

fn assert_equivalent(ast: Expr, bindings: &[(&str, Value)]) {
    let env = Environment::new();
    let program = env.program(ast);
    let interpreted = program.interpreted_runner().evaluate(bindings);
    let transpiled = program.transpiled_runner().evaluate(bindings);
    assert_eq!(interpreted, transpiled);
}

#[test]
fn arithmetic_tree() {
    let ast = Expr::Binary(
        BinaryOp::Add,
        lit_int(2).boxed(),
        Expr::Binary(BinaryOp::Mul, lit_int(3).boxed(), lit_int(4).boxed()).boxed(),
    );
    assert_equivalent(ast, &[]);
}

#[test]
fn conditional_and_short_circuit_logic() {
    let cond = Expr::Binary(BinaryOp::Gt, Expr::Ident("x".to_string()).boxed(), lit_int(0).boxed());
    let ast = Expr::Conditional(cond.boxed(), lit_int(1).boxed(), lit_int(-1).boxed());
    assert_equivalent(ast.clone(), &[("x", Value::Int(5))]);
    assert_equivalent(ast, &[("x", Value::Int(-5))]);
}

#[test]
fn list_and_map_literals() {
    let ast = Expr::ListLit(vec![lit_int(1), lit_int(2), Expr::Unary(UnaryOp::Neg, lit_int(3).boxed())]);
    assert_equivalent(ast, &[]);

    let map_ast = Expr::MapLit(vec![(Expr::Literal(Literal::String("k".into())), lit_int(1))]);
    assert_equivalent(map_ast, &[]);
}

#[test]
fn member_dot_chain_through_a_bound_map() {
    let ast = Expr::MemberDot(Expr::Ident("resource".to_string()).boxed(), "owner".to_string());
    let mut map = cel::CelMap::new();
    map.insert_unique(cel::MapKey::String("owner".into()), Value::String("alice".into())).unwrap();
    assert_equivalent(ast, &[("resource", Value::Map(std::sync::Arc::new(map)))]);
}

#[test]
fn index_expression() {
    let ast = Expr::MemberIndex(Expr::ListLit(vec![lit_int(10), lit_int(20)]).boxed(), lit_int(1).boxed());
    assert_equivalent(ast, &[]);
}

#[test]
fn macro_map_and_filter() {
    let source = Expr::ListLit(vec![lit_int(1), lit_int(2), lit_int(3), lit_int(4)]);
    let doubled = Expr::MemberDotArg(
        source.clone().boxed(),
        "map".to_string(),
        vec![Expr::Ident("n".to_string()), Expr::Binary(BinaryOp::Mul, Expr::Ident("n".to_string()).boxed(), lit_int(2).boxed())],
    );
    assert_equivalent(doubled, &[]);

    let evens = Expr::MemberDotArg(
        source.boxed(),
        "filter".to_string(),
        vec![
            Expr::Ident("n".to_string()),
            Expr::Binary(BinaryOp::Eq, Expr::Binary(BinaryOp::Mod, Expr::Ident("n".to_string()).boxed(), lit_int(2).boxed()).boxed(), lit_int(0).boxed()),
        ],
    );
    assert_equivalent(evens, &[]);
}

#[test]
fn macro_reduce_and_min() {
    let source = Expr::ListLit(vec![lit_int(3), lit_int(1), lit_int(4), lit_int(1), lit_int(5)]);
    let sum = Expr::MemberDotArg(
        source.clone().boxed(),
        "reduce".to_string(),
        vec![
            Expr::Ident("acc".to_string()),
            Expr::Ident("n".to_string()),
            lit_int(0),
            Expr::Binary(BinaryOp::Add, Expr::Ident("acc".to_string()).boxed(), Expr::Ident("n".to_string()).boxed()),
        ],
    );
    assert_equivalent(sum, &[]);

    let min = Expr::MemberDotArg(source.boxed(), "min".to_string(), vec![]);
    assert_equivalent(min, &[]);
}

#[test]
fn error_propagation_matches_between_paths() {
    let ast = Expr::Binary(BinaryOp::Div, lit_int(1).boxed(), lit_int(0).boxed());
    assert_equivalent(ast, &[]);
}
