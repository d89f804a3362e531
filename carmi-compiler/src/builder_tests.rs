use carmi_core::{Expression, Kind, Node, Scalar, Token};

use super::*;

fn get(name: &str) -> Node {
    Node::Expression(Expression::new(
        Token::bare(Kind::Get),
        vec![Node::Expression(Expression::new(
            Token::bare(Kind::TopLevel),
            vec![Node::str(name)],
        ))],
    ))
}

fn build(defs: &[TopLevelDef]) -> Result<BuildOutput> {
    let mut builder = Builder::new()?;
    let top_level_refs = builder.build_top_levels(defs)?;
    Ok(builder.finish(top_level_refs, Vec::new()))
}

#[test]
fn structurally_identical_subtrees_dedup_to_the_same_ref() {
    let defs = [
        TopLevelDef {
            name: Some("a".into()),
            body: Node::Expression(Expression::new(
                Token::bare(Kind::Add),
                vec![Node::int(1), Node::int(2)],
            )),
        },
        TopLevelDef {
            name: Some("b".into()),
            body: Node::Expression(Expression::new(
                Token::bare(Kind::Add),
                vec![Node::int(1), Node::int(2)],
            )),
        },
    ];
    let out = build(&defs).unwrap();
    assert_eq!(out.top_level_refs[0], out.top_level_refs[1]);
    assert_eq!(out.projections.len(), 1);
}

#[test]
fn get_top_level_resolves_to_inline_index() {
    let defs = [
        TopLevelDef {
            name: Some("first".into()),
            body: Node::int(42),
        },
        TopLevelDef {
            name: Some("second".into()),
            body: get("first"),
        },
    ];
    let out = build(&defs).unwrap();
    let IntermediateRef::Projection(hash) = out.top_level_refs[1] else {
        panic!("expected a projection ref");
    };
    let ir = out.projections.get_by_hash(hash).unwrap();
    assert_eq!(ir.args, vec![IntermediateRef::Int(0)]);
}

#[test]
fn forward_reference_between_top_levels_resolves() {
    let defs = [
        TopLevelDef {
            name: Some("a".into()),
            body: get("b"),
        },
        TopLevelDef {
            name: Some("b".into()),
            body: Node::int(7),
        },
    ];
    let out = build(&defs).unwrap();
    let IntermediateRef::Projection(hash) = out.top_level_refs[0] else {
        panic!("expected a projection ref");
    };
    let ir = out.projections.get_by_hash(hash).unwrap();
    assert_eq!(ir.args, vec![IntermediateRef::Int(1)]);
}

#[test]
fn unknown_top_level_reference_is_an_error() {
    let defs = [TopLevelDef {
        name: Some("a".into()),
        body: get("missing"),
    }];
    let err = build(&defs).unwrap_err();
    assert!(matches!(err, CompileError::UnknownTopLevel { name } if name == "missing"));
}

#[test]
fn trace_without_inner_kind_is_an_error() {
    let defs = [TopLevelDef {
        name: Some("a".into()),
        body: Node::Expression(Expression::new(Token::bare(Kind::Trace), vec![Node::int(1)])),
    }];
    let err = build(&defs).unwrap_err();
    assert!(matches!(err, CompileError::TraceMissingInnerKind));
}

#[test]
fn trace_inner_kind_is_interned_as_a_primitive_op_kind_tag() {
    let defs = [TopLevelDef {
        name: Some("a".into()),
        body: Node::Expression(Expression::new(
            Token::bare(Kind::Trace),
            vec![Node::Expression(Expression::new(Token::bare(Kind::Root), vec![]))],
        )),
    }];
    let out = build(&defs).unwrap();
    assert!(
        out.primitives
            .iter()
            .any(|value| matches!(value, PrimitiveValue::OpKind(Kind::Root)))
    );
}

#[test]
fn metadata_sentinel_is_always_the_first_entry() {
    let out = build(&[TopLevelDef {
        name: None,
        body: Node::int(1),
    }])
    .unwrap();
    assert_eq!(out.metadata.iter().next(), Some(&MetadataIr::sentinel()));
}
