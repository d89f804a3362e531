//! The atoms of the expression language.

use crate::expr::Node;

/// A source location attached to a token, carried through to debug output
/// and to `TypeError`/`trace` diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: u32,
    pub column: u32,
}

/// Operator kind. Mirrors `spec.md` §3 exactly: `get`/`topLevel`/`context`/
/// `root`/`key`/`trace`/`and`/`or`/`ternary`/`range`, arithmetic/comparison/
/// logic ops, the collection combinators, and the scalar operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Kind {
    Get,
    TopLevel,
    Context,
    Root,
    Key,
    Trace,
    And,
    Or,
    Ternary,
    Range,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,

    // Logic
    Not,

    // Collection combinators
    MapValues,
    FilterBy,
    GroupBy,
    MapKeys,
    Map,
    Any,
    Filter,
    AnyValues,
    KeyBy,
    RecursiveMap,
    RecursiveMapValues,

    // Scalars
    Keys,
    Values,
    Assign,
    Size,
    Defaults,
    Sum,
    Flatten,

    /// Synthetic positional-argument placeholder, introduced by the setter
    /// compiler (§4.3) when rewriting a setter's terminal `key` step into a
    /// bound free variable. Never produced by the front end.
    Arg(u32),
}

impl Kind {
    /// True for the collection combinators that take a caller-provided
    /// function and a collection, per §4.6 ("apply the corresponding pure
    /// operation over the argument collection").
    pub fn is_combinator(self) -> bool {
        matches!(
            self,
            Kind::MapValues
                | Kind::FilterBy
                | Kind::GroupBy
                | Kind::MapKeys
                | Kind::Map
                | Kind::Any
                | Kind::Filter
                | Kind::AnyValues
                | Kind::KeyBy
                | Kind::RecursiveMap
                | Kind::RecursiveMapValues
        )
    }

    pub fn is_recursive(self) -> bool {
        matches!(self, Kind::RecursiveMap | Kind::RecursiveMapValues)
    }
}

/// One `(condition-expression, invalidated-path)` entry of a token's
/// path-invalidation map (§3).
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PathEntry {
    pub condition: Node,
    pub path: RawPath,
}

/// A raw, unresolved model path as written by the front end: a root marker
/// followed by zero or more key steps.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RawPath {
    pub root: PathRoot,
    pub steps: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PathRoot {
    /// Root is a named top-level projection (front end refers to it by name;
    /// the builder resolves this to a top-level index, §4.2 step 7).
    TopLevel(String),
    /// Root is the `context` marker.
    Context,
    /// Root is the model root.
    Root,
}

/// An atom of the expression language (§3 `Token`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Token {
    pub kind: Kind,
    pub source: Option<SourceLocation>,
    /// Memoize this node by identity.
    pub tracked: bool,
    pub invalidates: bool,
    /// `$id` for tracked nodes.
    pub id: Option<i64>,
    pub paths: Vec<PathEntry>,
}

impl Token {
    /// A bare token with no metadata, useful for leaf operators like `root`.
    pub fn bare(kind: Kind) -> Self {
        Self {
            kind,
            source: None,
            tracked: false,
            invalidates: false,
            id: None,
            paths: Vec::new(),
        }
    }
}
