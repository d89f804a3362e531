//! Projection builder (§4.1, §4.2): walks a front-end expression tree and
//! interns it into the three hash-consing tables (`primitives`,
//! `projections`, `metadata`). Produces a [`BuildOutput`] that the packer
//! resolves into the final [`crate::data::ProjectionData`] tables.

use std::collections::HashMap;

use carmi_core::{HashConsTable, IntermediateRef, Kind, Node, Scalar, SourceLocation, Token};

use crate::data::PrimitiveValue;
use crate::error::{CompileError, Result};

/// One named (or anonymous) top-level definition as written by the front
/// end (§3 "Top-level").
pub struct TopLevelDef {
    /// `None` for an internal derivation hidden from the exported surface.
    pub name: Option<String>,
    pub body: Node,
}

/// Intermediate, un-packed projection row. Becomes a `PackedProjection`
/// once the packer resolves every `IntermediateRef` against the final
/// dense table indices (§4.4).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ProjectionIr {
    pub(crate) type_ref: IntermediateRef,
    pub(crate) meta_hash: u64,
    pub(crate) source: Option<u32>,
    pub(crate) args: Vec<IntermediateRef>,
}

/// Intermediate metadata row, keyed by content hash in the `metadata`
/// table; `path_hashes` index into the `paths` table by content hash too.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct MetadataIr {
    pub(crate) invalidates: bool,
    pub(crate) path_hashes: Vec<u64>,
}

impl MetadataIr {
    /// The reserved "no metadata" sentinel, guaranteed dense index `0`
    /// (§3 invariant, §4.4) by being the first thing ever interned.
    pub(crate) fn sentinel() -> Self {
        Self {
            invalidates: false,
            path_hashes: Vec::new(),
        }
    }
}

/// How an invalidation path's first step identifies a model root (§3
/// "the first step identifies a model root").
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum RootMarkerIr {
    /// Resolved to the referenced top level's dense index.
    TopLevel(u32),
    /// Kept regardless of setters; the packer splices a literal `0` after
    /// the interned `$context` marker (§4.2 step 7).
    Context(IntermediateRef),
    /// Kept only if some registered setter's step sequence is a structural
    /// prefix of this path; the packer performs that filter once every
    /// setter is known.
    Root(IntermediateRef),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PathIr {
    pub(crate) condition_ref: IntermediateRef,
    pub(crate) root: RootMarkerIr,
    pub(crate) steps: Vec<IntermediateRef>,
}

/// Everything the packer needs: the four hash-consing tables plus the
/// top-level index/name/ref arrays.
pub struct BuildOutput {
    pub(crate) primitives: HashConsTable<PrimitiveValue>,
    pub(crate) projections: HashConsTable<ProjectionIr>,
    pub(crate) metadata: HashConsTable<MetadataIr>,
    pub(crate) paths: HashConsTable<PathIr>,
    pub(crate) sources: Vec<String>,
    pub(crate) top_level_names: Vec<Option<String>>,
    pub(crate) top_level_refs: Vec<IntermediateRef>,
    pub(crate) setters: Vec<crate::setters::SetterIr>,
}

pub struct Builder {
    primitives: HashConsTable<PrimitiveValue>,
    projections: HashConsTable<ProjectionIr>,
    metadata: HashConsTable<MetadataIr>,
    paths: HashConsTable<PathIr>,
    sources: Vec<String>,
    source_index: HashMap<String, u32>,
    top_level_index: HashMap<String, u32>,
    top_level_names: Vec<Option<String>>,
}

impl Builder {
    pub fn new() -> Result<Self> {
        let mut metadata = HashConsTable::new("metadata");
        // Seed the sentinel first so it always lands at dense index 0.
        metadata.intern(MetadataIr::sentinel())?;
        Ok(Self {
            primitives: HashConsTable::new("primitives"),
            projections: HashConsTable::new("projections"),
            metadata,
            paths: HashConsTable::new("paths"),
            sources: Vec::new(),
            source_index: HashMap::new(),
            top_level_index: HashMap::new(),
            top_level_names: Vec::new(),
        })
    }

    /// Build every top-level definition in order, returning each top
    /// level's root reference. Names are pre-registered before any body is
    /// built, so forward and mutual references between top levels resolve
    /// correctly (§4.2 `get`/`topLevel`). Call [`Builder::finish`] once this
    /// and every setter have been compiled.
    pub fn build_top_levels(&mut self, defs: &[TopLevelDef]) -> Result<Vec<IntermediateRef>> {
        let base = self.top_level_names.len();
        for (offset, def) in defs.iter().enumerate() {
            self.top_level_names.push(def.name.clone());
            if let Some(name) = &def.name {
                self.top_level_index
                    .insert(name.clone(), (base + offset) as u32);
            }
        }

        defs.iter().map(|def| self.build_node(&def.body)).collect()
    }

    /// Consume the builder into the tables the packer resolves (§4.4).
    pub fn finish(
        self,
        top_level_refs: Vec<IntermediateRef>,
        setters: Vec<crate::setters::SetterIr>,
    ) -> BuildOutput {
        BuildOutput {
            primitives: self.primitives,
            projections: self.projections,
            metadata: self.metadata,
            paths: self.paths,
            sources: self.sources,
            top_level_names: self.top_level_names,
            top_level_refs,
            setters,
        }
    }

    pub(crate) fn resolve_top_level(&self, name: &str) -> Result<u32> {
        self.top_level_index
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::UnknownTopLevel {
                name: name.to_string(),
            })
    }

    pub(crate) fn resolve_root(&mut self, root: &carmi_core::PathRoot) -> Result<RootMarkerIr> {
        Ok(match root {
            carmi_core::PathRoot::TopLevel(name) => RootMarkerIr::TopLevel(self.resolve_top_level(name)?),
            carmi_core::PathRoot::Context => RootMarkerIr::Context(self.marker_ref("$context")?),
            carmi_core::PathRoot::Root => RootMarkerIr::Root(self.marker_ref("$root")?),
        })
    }

    /// Intern a fixed root-marker string (§4.2 step 7).
    fn marker_ref(&mut self, marker: &str) -> Result<IntermediateRef> {
        let hash = self.primitives.intern(PrimitiveValue::Str(marker.to_string()))?;
        Ok(IntermediateRef::Primitive(hash))
    }

    pub(crate) fn intern_primitive(&mut self, value: PrimitiveValue) -> Result<u64> {
        let before = self.primitives.len();
        let hash = self.primitives.intern(value)?;
        tracing::trace!(hash, hit = self.primitives.len() == before, "intern primitive");
        Ok(hash)
    }

    pub(crate) fn build_node(&mut self, node: &Node) -> Result<IntermediateRef> {
        match node {
            Node::Scalar(scalar) => self.build_scalar(scalar),
            Node::Token(token) => self.build_expression(token, &[]),
            Node::Expression(expr) => self.build_expression(&expr.head, &expr.args),
        }
    }

    fn build_scalar(&mut self, scalar: &Scalar) -> Result<IntermediateRef> {
        if let Scalar::Int(n) = scalar {
            if carmi_core::is_inline_representable(*n) {
                return Ok(IntermediateRef::Int(*n as u32));
            }
        }
        let hash = self.primitives.intern(PrimitiveValue::from(scalar.clone()))?;
        Ok(IntermediateRef::Primitive(hash))
    }

    fn build_expression(&mut self, head: &Token, args: &[Node]) -> Result<IntermediateRef> {
        if head.kind == Kind::Trace {
            return self.build_trace(head, args);
        }

        // `get(topLevel("name"))` and a bare `topLevel("name")` both resolve
        // the name argument to the referenced top level's dense index
        // rather than carrying the name through to the VM (§4.2 `get` rule).
        if let Some(name) = top_level_name_arg(head.kind, args) {
            let index = self.resolve_top_level(name)?;
            return self.finish_expression(Kind::TopLevel, head, vec![IntermediateRef::Int(index)]);
        }
        if head.kind == Kind::Get {
            if let [Node::Expression(inner)] = args {
                if let Some(name) = top_level_name_arg(inner.head.kind, &inner.args) {
                    let index = self.resolve_top_level(name)?;
                    return self.finish_expression(
                        Kind::TopLevel,
                        head,
                        vec![IntermediateRef::Int(index)],
                    );
                }
            }
        }

        // `and`/`or`/`ternary` carry a per-node identity ahead of their
        // operands: `$id` for tracked nodes, `-1` otherwise (§4.2 table).
        if matches!(head.kind, Kind::And | Kind::Or | Kind::Ternary) {
            let identity = self.build_scalar(&Scalar::Int(head.id.unwrap_or(-1)))?;
            let mut built_args = Vec::with_capacity(args.len() + 1);
            built_args.push(identity);
            for arg in args {
                built_args.push(self.build_node(arg)?);
            }
            return self.finish_expression(head.kind, head, built_args);
        }

        // `range` defaults a missing `start` to `0` and a missing `step` to
        // `1` (§4.2 table); callers may write `range(stop)`,
        // `range(start, stop)`, or `range(start, stop, step)`.
        if head.kind == Kind::Range {
            let built_args = match args {
                [stop] => vec![self.build_scalar(&Scalar::Int(0))?, self.build_node(stop)?, self.build_scalar(&Scalar::Int(1))?],
                [start, stop] => vec![self.build_node(start)?, self.build_node(stop)?, self.build_scalar(&Scalar::Int(1))?],
                [start, stop, step] => vec![self.build_node(start)?, self.build_node(stop)?, self.build_node(step)?],
                _ => return Err(CompileError::RangeArityMismatch { arg_count: args.len() }),
            };
            return self.finish_expression(Kind::Range, head, built_args);
        }

        let built_args = args
            .iter()
            .map(|arg| self.build_node(arg))
            .collect::<Result<Vec<_>>>()?;
        self.finish_expression(head.kind, head, built_args)
    }

    fn build_trace(&mut self, head: &Token, args: &[Node]) -> Result<IntermediateRef> {
        let inner_kind = match args.first() {
            Some(Node::Token(inner)) => inner.kind,
            Some(Node::Expression(inner)) => inner.head.kind,
            _ => return Err(CompileError::TraceMissingInnerKind),
        };
        let mut built_args = Vec::with_capacity(args.len());
        let kind_hash = self.primitives.intern(PrimitiveValue::OpKind(inner_kind))?;
        built_args.push(IntermediateRef::Primitive(kind_hash));
        for arg in &args[1..] {
            built_args.push(self.build_node(arg)?);
        }
        self.finish_expression(Kind::Trace, head, built_args)
    }

    fn finish_expression(
        &mut self,
        kind: Kind,
        meta_token: &Token,
        args: Vec<IntermediateRef>,
    ) -> Result<IntermediateRef> {
        let _span = tracing::debug_span!("build_projection", ?kind).entered();
        let type_hash = self.intern_primitive(PrimitiveValue::OpKind(kind))?;
        let meta_hash = self.build_metadata(meta_token)?;
        let source = self.intern_source(meta_token.source.as_ref());
        let ir = ProjectionIr {
            type_ref: IntermediateRef::Primitive(type_hash),
            meta_hash,
            source,
            args,
        };
        let hash = self.projections.intern(ir)?;
        Ok(IntermediateRef::Projection(hash))
    }

    fn build_metadata(&mut self, token: &Token) -> Result<u64> {
        if !token.invalidates && token.paths.is_empty() {
            return self.metadata.intern(MetadataIr::sentinel());
        }
        let mut path_hashes = Vec::with_capacity(token.paths.len());
        for entry in &token.paths {
            path_hashes.push(self.build_path(entry)?);
        }
        self.metadata.intern(MetadataIr {
            invalidates: token.invalidates,
            path_hashes,
        })
    }

    fn build_path(&mut self, entry: &carmi_core::PathEntry) -> Result<u64> {
        let condition_ref = self.build_node(&entry.condition)?;
        let root = self.resolve_root(&entry.path.root)?;
        let mut steps = Vec::with_capacity(entry.path.steps.len());
        for step in &entry.path.steps {
            steps.push(self.build_node(step)?);
        }
        self.paths.intern(PathIr {
            condition_ref,
            root,
            steps,
        })
    }

    fn intern_source(&mut self, loc: Option<&SourceLocation>) -> Option<u32> {
        let loc = loc?;
        let key = format!(
            "{}:{}:{}",
            loc.file.as_deref().unwrap_or("<unknown>"),
            loc.line,
            loc.column
        );
        if let Some(&index) = self.source_index.get(&key) {
            return Some(index);
        }
        let index = self.sources.len() as u32;
        self.sources.push(key.clone());
        self.source_index.insert(key, index);
        Some(index)
    }
}

/// `topLevel("name")` written either bare or as the single argument of a
/// kind that carries it verbatim; returns the name argument when present.
fn top_level_name_arg<'a>(kind: Kind, args: &'a [Node]) -> Option<&'a str> {
    if kind != Kind::TopLevel {
        return None;
    }
    match args {
        [Node::Scalar(Scalar::Str(name))] => Some(name.as_str()),
        _ => None,
    }
}

impl From<Scalar> for PrimitiveValue {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Null => PrimitiveValue::Null,
            Scalar::Bool(b) => PrimitiveValue::Bool(b),
            Scalar::Int(n) => PrimitiveValue::Int(n),
            Scalar::Float(bits) => PrimitiveValue::Float(f64::from_bits(bits)),
            Scalar::Str(s) => PrimitiveValue::Str(s),
            Scalar::Record(value) => PrimitiveValue::Record(value),
        }
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod builder_tests;
