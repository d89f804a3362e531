use carmi_core::{Expression, Kind, Node, PathEntry, PathRoot, RawPath, Token};

use super::*;
use crate::builder::{Builder, TopLevelDef};
use crate::data::SetterKind;
use crate::setters::RawSetter;

fn token_with_root_path(name_step: &str, extra_step: Option<&str>) -> Token {
    let mut steps = vec![Node::str(name_step)];
    if let Some(extra) = extra_step {
        steps.push(Node::str(extra));
    }
    let mut token = Token::bare(Kind::Values);
    token.invalidates = true;
    token.paths = vec![PathEntry {
        condition: Node::Token(Token::bare(Kind::Root)),
        path: RawPath {
            root: PathRoot::Root,
            steps,
        },
    }];
    token
}

fn build_with_setters(defs: &[TopLevelDef], setters: &[RawSetter]) -> ProjectionData {
    let mut builder = Builder::new().unwrap();
    let top_level_refs = builder.build_top_levels(defs).unwrap();
    let compiled_setters = setters
        .iter()
        .map(|s| builder.compile_setter(s).unwrap())
        .collect();
    let output = builder.finish(top_level_refs, compiled_setters);
    pack(output).unwrap()
}

#[test]
fn metadata_sentinel_is_first() {
    let defs = [TopLevelDef {
        name: None,
        body: Node::int(1),
    }];
    let data = build_with_setters(&defs, &[]);
    assert!(data.has_metadata_sentinel());
}

#[test]
fn root_rooted_path_kept_when_a_setter_prefix_matches() {
    let token = token_with_root_path("foo", Some("extra"));
    let defs = [TopLevelDef {
        name: Some("a".into()),
        body: Node::Expression(Expression::new(token, vec![])),
    }];
    let setters = [RawSetter {
        name: "setFoo".into(),
        kind: SetterKind::Set,
        root: PathRoot::Root,
        steps: vec![Node::str("foo"), Node::Token(Token::bare(Kind::Key))],
    }];
    let data = build_with_setters(&defs, &setters);
    let kept = data.meta_data.iter().any(|m| !m.paths.is_empty());
    assert!(kept, "expected the root-rooted path to survive the setter-prefix filter");
}

#[test]
fn root_rooted_path_discarded_without_a_matching_setter() {
    let token = token_with_root_path("foo", None);
    let defs = [TopLevelDef {
        name: Some("a".into()),
        body: Node::Expression(Expression::new(token, vec![])),
    }];
    let data = build_with_setters(&defs, &[]);
    assert!(data.meta_data.iter().all(|m| m.paths.is_empty()));
}

#[test]
fn packing_is_deterministic() {
    let defs = [TopLevelDef {
        name: Some("a".into()),
        body: Node::int(5),
    }];
    let a = build_with_setters(&defs, &[]);
    let b = build_with_setters(&defs, &[]);
    assert_eq!(a, b);
}
