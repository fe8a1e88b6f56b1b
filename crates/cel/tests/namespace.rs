//! End-to-end coverage of longest-prefix name resolution and scoping,
//! exercised both directly against `NameContainer` and through `Activation`
//! via the public `Environment`/`Runner` façade.

use cel::{Activation, CelFunction, CelType, Environment, Expr, NameContainer, Resolved, Value};
use std::rc::Rc;

#[test]
fn package_prefix_resolves_a_shorter_unqualified_name() {
    let root = NameContainer::new_ref(None);
    root.borrow_mut().load_value("policy.region", Value::String("us".into()));
    match NameContainer::resolve_name(&root, Some("policy"), "region").unwrap() {
        Resolved::Value(Value::String(s)) => assert_eq!(&*s, "us"),
        other => panic!("expected Value(String), got {other:?}"),
    }
}

#[test]
fn leading_dot_escapes_the_package_prefix() {
    let activation = Activation::new(Rc::new(indexmap::IndexMap::new())).with_package(Some("policy".to_string()));
    activation.load_value("region", Value::String("root".into()));
    activation.load_value("policy.region", Value::String("nested".into()));
    match activation.resolve(".region").unwrap() {
        Resolved::Value(Value::String(s)) => assert_eq!(&*s, "root"),
        other => panic!("expected Value(String), got {other:?}"),
    }
}

#[test]
fn nested_activation_scopes_a_macro_bound_variable() {
    let base: Rc<indexmap::IndexMap<String, CelFunction>> = Rc::new(indexmap::IndexMap::new());
    let parent = Activation::new(base);
    parent.bind("total", Value::Int(100));
    let child = parent.nested();
    child.bind("n", Value::Int(1));
    assert!(matches!(child.resolve("total"), Ok(Resolved::Value(Value::Int(100)))));
    assert!(matches!(child.resolve("n"), Ok(Resolved::Value(Value::Int(1)))));
    assert!(parent.resolve("n").is_err());
}

#[test]
fn declared_annotation_is_visible_end_to_end_before_a_value_is_bound() {
    let mut env = Environment::new();
    env.declare("untouched", CelType::String);
    let program = env.program(Expr::Ident("untouched".to_string()));
    let result = program.interpreted_runner().evaluate(&[]).unwrap();
    assert_eq!(result, Value::Type(CelType::String));
}

#[test]
fn binding_shadows_the_declared_annotation() {
    let mut env = Environment::new();
    env.declare("untouched", CelType::String);
    let program = env.program(Expr::Ident("untouched".to_string()));
    let result = program.interpreted_runner().evaluate(&[("untouched", Value::String("now bound".into()))]).unwrap();
    assert_eq!(result, Value::String("now bound".into()));
}

#[test]
fn runner_evaluate_binds_fresh_each_call_without_leaking_state() {
    let env = Environment::new();
    let program = env.program(Expr::Ident("flag".to_string()));
    let runner = program.interpreted_runner();
    assert!(runner.evaluate(&[("flag", Value::Bool(true))]).is_ok());
    assert!(runner.evaluate(&[]).is_err());
}
