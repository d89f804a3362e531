//! Setter compiler (§4.3): rewrites a raw setter's terminal `key` step into
//! a synthetic positional argument and resolves its path the same way a
//! projection path is resolved.

use carmi_core::{IntermediateRef, Kind, Node, PathRoot, Token};

use crate::builder::{Builder, RootMarkerIr};
use crate::data::{PrimitiveValue, SetterKind};
use crate::error::{CompileError, Result};

/// A setter as written by the front end (§3 `Setter`): a name, a mutation
/// kind, and a path whose terminal step is a placeholder `key` token bound
/// to the setter's call argument.
pub struct RawSetter {
    pub name: String,
    pub kind: SetterKind,
    pub root: PathRoot,
    pub steps: Vec<Node>,
}

/// Intermediate compiled setter, resolved by the packer into a
/// `PackedSetter` (§3 `Setter`, packed).
pub(crate) struct SetterIr {
    pub(crate) kind_ref: IntermediateRef,
    pub(crate) name_ref: IntermediateRef,
    pub(crate) token_count: u32,
    pub(crate) root: RootMarkerIr,
    pub(crate) steps: Vec<IntermediateRef>,
}

fn is_key_step(node: &Node) -> bool {
    match node {
        Node::Token(token) => token.kind == Kind::Key,
        Node::Expression(expr) => expr.head.kind == Kind::Key,
        Node::Scalar(_) => false,
    }
}

impl Builder {
    /// Compile one raw setter (§4.3): `token_count` is the number of steps
    /// in the path, and every `key`-kind step is rewritten into the
    /// synthetic positional argument `arg{token_count - 1}` before the path
    /// is resolved like any other invalidation path.
    pub(crate) fn compile_setter(&mut self, raw: &RawSetter) -> Result<SetterIr> {
        let token_count = raw.steps.len() as u32;
        let arg_index = token_count.saturating_sub(1);

        let mut saw_key = false;
        let mut steps = Vec::with_capacity(raw.steps.len());
        for step in &raw.steps {
            if is_key_step(step) {
                saw_key = true;
                steps.push(self.build_node(&Node::Token(Token::bare(Kind::Arg(arg_index))))?);
            } else {
                steps.push(self.build_node(step)?);
            }
        }
        if !saw_key {
            return Err(CompileError::SetterMissingTerminalKey {
                name: raw.name.clone(),
            });
        }

        let root = self.resolve_root(&raw.root)?;
        let kind_hash = self.intern_primitive(PrimitiveValue::SetterKindTag(raw.kind))?;
        let name_hash = self.intern_primitive(PrimitiveValue::Str(raw.name.clone()))?;

        Ok(SetterIr {
            kind_ref: IntermediateRef::Primitive(kind_hash),
            name_ref: IntermediateRef::Primitive(name_hash),
            token_count,
            root,
            steps,
        })
    }
}

#[cfg(test)]
#[path = "setters_tests.rs"]
mod setters_tests;
