//! `ProjectionData`: the sole contract between the compiler and the VM
//! runtime (§3, §6).

use carmi_core::{Kind, PackedRef};
use serde::{Deserialize, Serialize};

/// An entry of the packed `primitives` table: a scalar, string, or
/// operator-kind tag (§3 "primitives (scalars, strings, operator-kind
/// tags)").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// An operator-kind tag, e.g. the `type` field of a projection (§3
    /// `Projection.type: primitive-ref`).
    OpKind(Kind),
    /// A setter-mutation-kind tag (§4.3 setter compilation).
    SetterKindTag(SetterKind),
    /// An opaque plain record passed through verbatim.
    Record(serde_json::Value),
}

/// Setter mutation shape (§3 `Setter`, §4.6 "Setters").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetterKind {
    Set,
    Splice,
    Push,
}

/// A packed projection: one row of `ProjectionData.getters` (§3
/// `Projection`, packed).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackedProjection {
    /// Operator-kind tag, always a `primitives` ref.
    pub type_ref: PackedRef,
    /// Index into `ProjectionData.metaData`; `0` is the "no metadata"
    /// sentinel (§3 invariant).
    pub meta_index: u32,
    /// Index into `ProjectionData.sources`, if this projection carries a
    /// source location.
    pub source: Option<u32>,
    pub args: Vec<PackedRef>,
}

/// Per-projection invalidation metadata (§3 `Metadata record`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub invalidates: bool,
    /// Indices into `ProjectionData.paths`.
    pub paths: Vec<u32>,
}

impl MetadataRecord {
    /// The reserved "no metadata" sentinel (§3 invariant, §4.4).
    pub fn sentinel() -> Self {
        Self {
            invalidates: false,
            paths: Vec::new(),
        }
    }
}

/// A compiled, canonical model path: `[condition-ref, step-refs...]`
/// (§3 `Metadata record`).
pub type PackedPath = Vec<PackedRef>;

/// One compiled setter (§3 `Setter`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackedSetter {
    pub kind_ref: PackedRef,
    pub name_ref: PackedRef,
    pub token_count: u32,
    pub steps: Vec<PackedRef>,
}

/// The compiler's sole output artifact (§3, field order fixed by §6):
/// `{ getters, primitives, topLevelNames, topLevelProjections, metaData,
/// paths, setters, sources }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectionData {
    pub getters: Vec<PackedProjection>,
    pub primitives: Vec<PrimitiveValue>,
    /// Name-primitive index per top level, or `-1` for an internal
    /// derivation hidden from the exported surface (§3 "Top-level").
    pub top_level_names: Vec<i32>,
    pub top_level_projections: Vec<PackedRef>,
    pub meta_data: Vec<MetadataRecord>,
    pub paths: Vec<PackedPath>,
    pub setters: Vec<PackedSetter>,
    /// Deduplicated source-location descriptions referenced by
    /// `PackedProjection.source` (debug/AST support, §6 `$ast`/`$source`).
    pub sources: Vec<String>,
}

impl ProjectionData {
    /// §3 invariant: `metaData[0] == (0, [])`.
    pub fn has_metadata_sentinel(&self) -> bool {
        self.meta_data.first() == Some(&MetadataRecord::sentinel())
    }
}
