use std::sync::Arc;

use carmi_compiler::{compile, Program, TopLevelDef};
use carmi_core::{Expression, Kind, Node, Scalar, Token};
use serde_json::json;

use crate::funclib::FuncLib;
use crate::instance::Instance;
use crate::options::VmOptions;

fn op(kind: Kind, args: Vec<Node>) -> Node {
    Node::Expression(Expression::new(Token::bare(kind), args))
}

fn record(value: serde_json::Value) -> Node {
    Node::Scalar(Scalar::Record(value))
}

fn eval_one(body: Node) -> serde_json::Value {
    eval_with_model(body, json!(null))
}

fn eval_with_model(body: Node, model: serde_json::Value) -> serde_json::Value {
    let data = compile(Program {
        top_levels: vec![TopLevelDef { name: Some("out".to_string()), body }],
        setters: Vec::new(),
    })
    .unwrap();
    let instance = Instance::new(Arc::new(data), model, None, VmOptions::new()).unwrap();
    instance.get("out").unwrap()
}

#[test]
fn arithmetic_ops() {
    assert_eq!(eval_one(op(Kind::Add, vec![Node::int(2), Node::int(3)])), json!(5.0));
    assert_eq!(eval_one(op(Kind::Sub, vec![Node::int(5), Node::int(3)])), json!(2.0));
    assert_eq!(eval_one(op(Kind::Mul, vec![Node::int(4), Node::int(3)])), json!(12.0));
    assert_eq!(eval_one(op(Kind::Div, vec![Node::int(9), Node::int(3)])), json!(3.0));
    assert_eq!(eval_one(op(Kind::Mod, vec![Node::int(7), Node::int(3)])), json!(1.0));
}

#[test]
fn comparison_ops() {
    assert_eq!(eval_one(op(Kind::Lt, vec![Node::int(1), Node::int(2)])), json!(true));
    assert_eq!(eval_one(op(Kind::Gte, vec![Node::int(2), Node::int(2)])), json!(true));
    assert_eq!(eval_one(op(Kind::Eq, vec![Node::int(2), Node::int(3)])), json!(false));
    assert_eq!(eval_one(op(Kind::Neq, vec![Node::int(2), Node::int(3)])), json!(true));
}

#[test]
fn and_or_short_circuit_and_return_the_operand_value() {
    // The builder prepends its own per-node identity ahead of the operands
    // written here (§4.2 table); tests supply only the operands themselves.
    let and_false = op(Kind::And, vec![Node::Scalar(Scalar::Bool(false)), Node::int(9)]);
    assert_eq!(eval_one(and_false), json!(false));

    let and_true = op(Kind::And, vec![Node::Scalar(Scalar::Bool(true)), Node::int(9)]);
    assert_eq!(eval_one(and_true), json!(9));

    let or_first = op(Kind::Or, vec![Node::int(5), Node::int(9)]);
    assert_eq!(eval_one(or_first), json!(5));

    let or_second = op(Kind::Or, vec![Node::Scalar(Scalar::Bool(false)), Node::int(9)]);
    assert_eq!(eval_one(or_second), json!(9));
}

#[test]
fn ternary_picks_the_right_branch() {
    let node = op(Kind::Ternary, vec![Node::Scalar(Scalar::Bool(true)), Node::int(1), Node::int(2)]);
    assert_eq!(eval_one(node), json!(1));
}

#[test]
fn range_produces_a_half_open_sequence() {
    let node = op(Kind::Range, vec![Node::int(0), Node::int(5), Node::int(2)]);
    assert_eq!(eval_one(node), json!([0, 2, 4]));
}

#[test]
fn not_negates_truthiness() {
    assert_eq!(eval_one(op(Kind::Not, vec![Node::Scalar(Scalar::Bool(false))])), json!(true));
}

#[test]
fn get_reads_object_and_array_fields() {
    let from_object = op(Kind::Get, vec![record(json!({"a": 1})), Node::str("a")]);
    assert_eq!(eval_one(from_object), json!(1));

    let from_array = op(Kind::Get, vec![record(json!([10, 20])), Node::int(1)]);
    assert_eq!(eval_one(from_array), json!(20));
}

#[test]
fn root_and_context_read_the_model() {
    let node = op(Kind::Root, vec![]);
    assert_eq!(eval_with_model(node, json!({"x": 1})), json!({"x": 1}));
}

#[test]
fn keys_values_and_size_over_an_object() {
    let obj = record(json!({"a": 1, "b": 2}));
    assert_eq!(eval_one(op(Kind::Size, vec![obj.clone()])), json!(2));

    let mut values = eval_one(op(Kind::Values, vec![obj.clone()])).as_array().unwrap().clone();
    values.sort_by_key(|v| v.as_i64().unwrap());
    assert_eq!(values, vec![json!(1), json!(2)]);

    let mut keys = eval_one(op(Kind::Keys, vec![obj]))
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn assign_merges_objects_left_to_right() {
    let node = op(Kind::Assign, vec![record(json!({"a": 1})), record(json!({"a": 2, "b": 3}))]);
    assert_eq!(eval_one(node), json!({"a": 2, "b": 3}));
}

#[test]
fn defaults_merges_objects_right_to_left() {
    let node = op(Kind::Defaults, vec![record(json!({"a": 1})), record(json!({"a": 2, "b": 3}))]);
    assert_eq!(eval_one(node), json!({"a": 1, "b": 3}));
}

#[test]
fn sum_adds_a_numeric_array() {
    let node = op(Kind::Sum, vec![record(json!([1, 2, 3]))]);
    assert_eq!(eval_one(node), json!(6.0));
}

#[test]
fn flatten_merges_one_level_of_nested_arrays() {
    let node = op(Kind::Flatten, vec![record(json!([[1, 2], [3], 4]))]);
    assert_eq!(eval_one(node), json!([1, 2, 3, 4]));
}

#[test]
fn map_applies_a_compiled_body_with_context_and_key_bound() {
    // `context()` is the collection being mapped over, `key()` the current
    // index; `get(context(), key())` recovers the element under it.
    let element = op(Kind::Get, vec![Node::Token(Token::bare(Kind::Context)), Node::Token(Token::bare(Kind::Key))]);
    let body = op(Kind::Get, vec![element, Node::str("n")]);
    let node = op(Kind::Map, vec![record(json!([{"n": 1}, {"n": 2}])), body]);
    assert_eq!(eval_one(node), json!([1, 2]));
}

#[test]
fn map_resolves_its_function_through_func_lib_by_name() {
    let mut lib = FuncLib::new();
    lib.register_plain("double", std::sync::Arc::new(|value: &serde_json::Value, _key, _ctx| {
        Ok(json!(value.as_f64().unwrap_or(0.0) * 2.0))
    }));
    let node = op(Kind::Map, vec![record(json!([1, 2, 3])), Node::str("double")]);
    let data = compile(Program {
        top_levels: vec![TopLevelDef { name: Some("out".to_string()), body: node }],
        setters: Vec::new(),
    })
    .unwrap();
    let instance = Instance::new(Arc::new(data), json!(null), Some(lib), VmOptions::new()).unwrap();
    assert_eq!(instance.get("out").unwrap(), json!([2.0, 4.0, 6.0]));
}

#[test]
fn recursive_map_without_a_registered_func_lib_entry_is_an_error() {
    let node = op(Kind::RecursiveMap, vec![record(json!([1, 2])), Node::str("missing")]);
    let data = compile(Program {
        top_levels: vec![TopLevelDef { name: Some("out".to_string()), body: node }],
        setters: Vec::new(),
    })
    .unwrap();
    let err = Instance::new(Arc::new(data), json!(null), None, VmOptions::new()).unwrap_err();
    assert!(matches!(err, crate::error::RuntimeError::UndefinedFunction { .. }));
}
