//! Packer (§4.4): resolves every `IntermediateRef` produced by the builder
//! and the setter compiler into dense, tag-packed `PackedRef`s and
//! assembles the final [`ProjectionData`].

use carmi_core::refs::{pack_int, pack_primitive, pack_projection, unpack};
use carmi_core::{IntermediateRef, Kind, PackedRef, Unpacked};

use crate::builder::{BuildOutput, PathIr, RootMarkerIr};
use crate::data::{
    MetadataRecord, PackedPath, PackedProjection, PackedSetter, PrimitiveValue, ProjectionData,
};
use crate::error::Result;

pub fn pack(output: BuildOutput) -> Result<ProjectionData> {
    let BuildOutput {
        mut primitives,
        projections,
        metadata,
        paths,
        sources,
        top_level_names,
        top_level_refs,
        setters,
    } = output;

    // Intern top-level names up front: this is the last mutation `primitives`
    // ever sees, so every later closure below can borrow it immutably.
    let mut top_level_name_refs = Vec::with_capacity(top_level_names.len());
    for name in &top_level_names {
        match name {
            Some(n) => {
                let hash = primitives.intern(PrimitiveValue::Str(n.clone()))?;
                let index = primitives
                    .index_of(hash)
                    .expect("just-interned name resolves to a dense index");
                top_level_name_refs.push(index as i32);
            }
            None => top_level_name_refs.push(-1),
        }
    }

    let resolve = |r: IntermediateRef| -> Result<PackedRef> {
        match r {
            IntermediateRef::Int(v) => pack_int(v),
            IntermediateRef::Primitive(hash) => {
                let index = primitives
                    .index_of(hash)
                    .expect("every interned primitive hash resolves to a dense index");
                pack_primitive(index)
            }
            IntermediateRef::Projection(hash) => {
                let index = projections
                    .index_of(hash)
                    .expect("every interned projection hash resolves to a dense index");
                pack_projection(index)
            }
        }
    };

    let packed_setters = setters
        .iter()
        .map(|setter| pack_setter(setter, &resolve))
        .collect::<Result<Vec<_>>>()?;

    let getters = projections
        .iter()
        .map(|ir| {
            Ok(PackedProjection {
                type_ref: resolve(ir.type_ref)?,
                meta_index: metadata
                    .index_of(ir.meta_hash)
                    .expect("every interned metadata hash resolves to a dense index"),
                source: ir.source,
                args: ir.args.iter().map(|&a| resolve(a)).collect::<Result<Vec<_>>>()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let primitives_snapshot: Vec<PrimitiveValue> = primitives.iter().cloned().collect();
    let is_arg_placeholder = |step: PackedRef| -> bool {
        let Unpacked::Projection(index) = unpack(step) else {
            return false;
        };
        let Some(projection) = getters.get(index as usize) else {
            return false;
        };
        let Unpacked::Primitive(kind_index) = unpack(projection.type_ref) else {
            return false;
        };
        matches!(
            primitives_snapshot.get(kind_index as usize),
            Some(PrimitiveValue::OpKind(Kind::Arg(_)))
        )
    };

    let paths_ir: Vec<PathIr> = paths.iter().cloned().collect();
    let packed_paths = paths_ir
        .iter()
        .map(|path| pack_path(path, &resolve))
        .collect::<Result<Vec<_>>>()?;

    let path_kept: Vec<bool> = paths_ir
        .iter()
        .zip(&packed_paths)
        .map(|(path, packed)| match &path.root {
            // A setter's last step is always the rewritten value/key
            // argument, never part of the concrete location it writes to
            // (§4.3); compare against the location alone so a read that
            // stops exactly where the setter writes still counts as
            // touched, not just reads nested deeper below it.
            RootMarkerIr::Root(_) => packed_setters.iter().any(|setter| {
                let location = &setter.steps[..setter.steps.len().saturating_sub(1)];
                is_structural_prefix(location, packed, &is_arg_placeholder)
            }),
            _ => true,
        })
        .collect();

    let top_level_projections = top_level_refs
        .iter()
        .map(|&r| resolve(r))
        .collect::<Result<Vec<_>>>()?;

    let meta_data = metadata
        .iter()
        .map(|ir| MetadataRecord {
            invalidates: ir.invalidates,
            paths: ir
                .path_hashes
                .iter()
                .filter_map(|&hash| {
                    let index = paths.index_of(hash)?;
                    path_kept[index as usize].then_some(index)
                })
                .collect(),
        })
        .collect();

    Ok(ProjectionData {
        getters,
        primitives: primitives.into_vec(),
        top_level_names: top_level_name_refs,
        top_level_projections,
        meta_data,
        paths: packed_paths,
        setters: packed_setters,
        sources,
    })
}

fn pack_path(path: &PathIr, resolve: &impl Fn(IntermediateRef) -> Result<PackedRef>) -> Result<PackedPath> {
    let mut packed = Vec::with_capacity(path.steps.len() + 3);
    packed.push(resolve(path.condition_ref)?);
    match &path.root {
        &RootMarkerIr::TopLevel(index) => packed.push(pack_int(index)?),
        &RootMarkerIr::Context(marker) => {
            packed.push(resolve(marker)?);
            packed.push(pack_int(0)?);
        }
        &RootMarkerIr::Root(marker) => packed.push(resolve(marker)?),
    }
    for &step in &path.steps {
        packed.push(resolve(step)?);
    }
    Ok(packed)
}

fn pack_setter(
    setter: &crate::setters::SetterIr,
    resolve: &impl Fn(IntermediateRef) -> Result<PackedRef>,
) -> Result<PackedSetter> {
    let mut steps = Vec::with_capacity(setter.steps.len() + 2);
    match &setter.root {
        &RootMarkerIr::TopLevel(index) => steps.push(pack_int(index)?),
        &RootMarkerIr::Context(marker) => {
            steps.push(resolve(marker)?);
            steps.push(pack_int(0)?);
        }
        &RootMarkerIr::Root(marker) => steps.push(resolve(marker)?),
    }
    for &step in &setter.steps {
        steps.push(resolve(step)?);
    }
    Ok(PackedSetter {
        kind_ref: resolve(setter.kind_ref)?,
        name_ref: resolve(setter.name_ref)?,
        token_count: setter.token_count,
        steps,
    })
}

/// Whether `setter_steps` is a structural prefix of `path`'s steps, i.e.
/// some setter could plausibly touch this invalidation path (§4.2 step 7).
/// `path` carries a leading condition ref that `setter_steps` does not; the
/// comparison starts after it. A setter step that rewrote a `key` into an
/// `arg` placeholder acts as a wildcard.
fn is_structural_prefix(
    setter_steps: &[PackedRef],
    path: &PackedPath,
    is_arg_placeholder: &impl Fn(PackedRef) -> bool,
) -> bool {
    let path_steps = &path[1..];
    if setter_steps.len() > path_steps.len() {
        return false;
    }
    setter_steps
        .iter()
        .zip(path_steps)
        .all(|(&s, &p)| s == p || is_arg_placeholder(s))
}

#[cfg(test)]
#[path = "packer_tests.rs"]
mod packer_tests;
