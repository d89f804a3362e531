use std::sync::Arc;

use carmi_compiler::{compile, Program, RawSetter, SetterKind, TopLevelDef};
use carmi_core::{Expression, Kind, Node, PathEntry, PathRoot, RawPath, Token};
use serde_json::json;

use crate::instance::Instance;
use crate::options::VmOptions;

/// `get(root(), field)`, annotated with the invalidation path a real front
/// end would attach: "dirty whenever something touches `root()->field`".
fn tracked_get(field: &str) -> Node {
    let token = Token {
        kind: Kind::Get,
        source: None,
        tracked: false,
        invalidates: false,
        id: None,
        paths: vec![PathEntry {
            condition: Node::Scalar(carmi_core::Scalar::Bool(true)),
            path: RawPath { root: PathRoot::Root, steps: vec![Node::str(field)] },
        }],
    };
    Node::Expression(Expression::new(token, vec![Node::Token(Token::bare(Kind::Root)), Node::str(field)]))
}

fn key_setter(name: &str, kind: SetterKind, field: &str) -> RawSetter {
    RawSetter {
        name: name.to_string(),
        kind,
        root: PathRoot::Root,
        steps: vec![Node::str(field), Node::Token(Token::bare(Kind::Key))],
    }
}

fn instance_with(top_level: &str, body: Node, setters: Vec<RawSetter>, model: serde_json::Value) -> Instance {
    let data = compile(Program {
        top_levels: vec![TopLevelDef { name: Some(top_level.to_string()), body }],
        setters,
    })
    .unwrap();
    Instance::new(Arc::new(data), model, None, VmOptions::new()).unwrap()
}

#[test]
fn set_writes_a_scalar_field_and_recalculates() {
    let setter = key_setter("setCount", SetterKind::Set, "count");
    let instance = instance_with("total", tracked_get("count"), vec![setter], json!({"count": 1}));
    assert_eq!(instance.get("total").unwrap(), json!(1));

    instance.call_setter("setCount", &[json!(1), json!(9)]).unwrap();
    assert_eq!(instance.get("total").unwrap(), json!(9));
}

#[test]
fn set_with_null_value_removes_the_key() {
    let setter = key_setter("setCount", SetterKind::Set, "count");
    let instance = instance_with("total", tracked_get("count"), vec![setter], json!({"count": 1}));
    instance.call_setter("setCount", &[json!(1), serde_json::Value::Null]).unwrap();
    assert_eq!(instance.get("total").unwrap(), json!(null));
}

#[test]
fn push_appends_to_an_array_field() {
    let setter = key_setter("pushItem", SetterKind::Push, "list");
    let instance = instance_with("items", tracked_get("list"), vec![setter], json!({"list": [1, 2]}));
    instance.call_setter("pushItem", &[json!(null), json!(3)]).unwrap();
    assert_eq!(instance.get("items").unwrap(), json!([1, 2, 3]));
}

#[test]
fn push_materializes_a_missing_array() {
    let setter = key_setter("pushItem", SetterKind::Push, "list");
    let instance = instance_with("items", tracked_get("list"), vec![setter], json!({}));
    instance.call_setter("pushItem", &[json!(null), json!("a")]).unwrap();
    assert_eq!(instance.get("items").unwrap(), json!(["a"]));
}

#[test]
fn unknown_setter_name_is_rejected() {
    let setter = key_setter("setCount", SetterKind::Set, "count");
    let instance = instance_with("total", tracked_get("count"), vec![setter], json!({"count": 1}));
    let err = instance.call_setter("nope", &[json!(1)]).unwrap_err();
    assert!(matches!(err, crate::error::RuntimeError::UnknownSetter { .. }));
}

#[test]
fn wrong_arity_is_rejected() {
    let setter = key_setter("setCount", SetterKind::Set, "count");
    let instance = instance_with("total", tracked_get("count"), vec![setter], json!({"count": 1}));
    let err = instance.call_setter("setCount", &[json!(9)]).unwrap_err();
    assert!(matches!(err, crate::error::RuntimeError::SetterArityMismatch { .. }));
}

#[test]
fn batched_setters_apply_once_on_end_batch() {
    let setter = key_setter("setCount", SetterKind::Set, "count");
    let instance = instance_with("total", tracked_get("count"), vec![setter], json!({"count": 1}));
    instance
        .run_in_batch(|inst| {
            inst.call_setter("setCount", &[json!(1), json!(2)]).unwrap();
            inst.call_setter("setCount", &[json!(1), json!(3)]).unwrap();
            assert_eq!(inst.get("total").unwrap(), json!(1));
        })
        .unwrap();
    assert_eq!(instance.get("total").unwrap(), json!(3));
}

#[test]
fn setter_on_one_field_leaves_an_unrelated_field_untouched() {
    let setter = key_setter("setCount", SetterKind::Set, "count");
    let data = compile(Program {
        top_levels: vec![
            TopLevelDef { name: Some("total".to_string()), body: tracked_get("count") },
            TopLevelDef { name: Some("other".to_string()), body: tracked_get("unrelated") },
        ],
        setters: vec![setter],
    })
    .unwrap();
    let instance = Instance::new(Arc::new(data), json!({"count": 1, "unrelated": "x"}), None, VmOptions::new()).unwrap();
    instance.call_setter("setCount", &[json!(1), json!(2)]).unwrap();
    assert_eq!(instance.get("total").unwrap(), json!(2));
    assert_eq!(instance.get("other").unwrap(), json!("x"));
}

#[test]
fn push_then_splice_matches_scenario_c() {
    let sum_list = Node::Expression(Expression::new(Token::bare(Kind::Sum), vec![tracked_get("list")]));
    let push = key_setter("pushItem", SetterKind::Push, "list");
    let splice = RawSetter {
        name: "spliceList".to_string(),
        kind: SetterKind::Splice,
        root: PathRoot::Root,
        steps: vec![Node::str("list"), Node::int(1), Node::Token(Token::bare(Kind::Key))],
    };
    let instance = instance_with("total", sum_list, vec![push, splice], json!({"list": [1, 2, 3]}));
    assert_eq!(instance.get("total").unwrap(), json!(6.0));

    instance.call_setter("pushItem", &[json!(null), json!(4)]).unwrap();
    assert_eq!(instance.get("total").unwrap(), json!(10.0));

    instance.call_setter("spliceList", &[json!(null), json!(null), json!(2)]).unwrap();
    assert_eq!(instance.get("total").unwrap(), json!(5.0));
}
