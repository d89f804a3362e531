//! Reference packing (§3 `Reference`, §4.4 `Packer`, §9 "Reference
//! packing").
//!
//! A reference is, before packing, a tagged pair `(table, key)` where
//! `table ∈ {ints, primitives, projections}`. After packing it is a single
//! non-negative integer whose two most-significant bits carry the tag and
//! whose remaining bits carry the payload — an inline integer, or an index
//! into the `primitives`/`projections` table.

use crate::error::{Error, Result};

/// Packed reference: a tag-and-payload `u32`.
pub type PackedRef = u32;

const TAG_BITS: u32 = 2;
const PAYLOAD_BITS: u32 = u32::BITS - TAG_BITS;

/// Ceiling shared by every tagged table. §9: "implementations should expose
/// the ceiling as a compile-time constant" and the implementation budget in
/// §3 requires at least 2^24 entries per table; 2^30 is what two tag bits on
/// a `u32` payload actually allow.
pub const TABLE_CEILING: u64 = 1 << PAYLOAD_BITS;

const TAG_INT: u32 = 0b00;
const TAG_PRIMITIVE: u32 = 0b01;
const TAG_PROJECTION: u32 = 0b10;

const PAYLOAD_MASK: u32 = (1 << PAYLOAD_BITS) - 1;

/// An intermediate, pre-packing reference: `(table, key)` per §3, with
/// `ints` represented directly (the "small inline-integer fast path" of
/// §4.4) and `primitives`/`projections` keyed by their content hash until
/// the packer assigns dense indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntermediateRef {
    Int(u32),
    Primitive(u64),
    Projection(u64),
}

fn pack(tag: u32, payload: u64) -> Result<PackedRef> {
    if payload >= TABLE_CEILING {
        return Err(Error::RefRangeOverflow {
            table: match tag {
                TAG_INT => "ints",
                TAG_PRIMITIVE => "primitives",
                TAG_PROJECTION => "projections",
                _ => unreachable!(),
            },
            index: payload,
            ceiling: TABLE_CEILING,
        });
    }
    Ok((tag << PAYLOAD_BITS) | (payload as u32 & PAYLOAD_MASK))
}

/// Pack an inline integer (the fast path of §4.2 step 1).
pub fn pack_int(value: u32) -> Result<PackedRef> {
    pack(TAG_INT, value as u64)
}

/// Pack a dense `primitives` table index.
pub fn pack_primitive(index: u32) -> Result<PackedRef> {
    pack(TAG_PRIMITIVE, index as u64)
}

/// Pack a dense `projections` table index.
pub fn pack_projection(index: u32) -> Result<PackedRef> {
    pack(TAG_PROJECTION, index as u64)
}

/// The tag/payload decomposition of a packed ref, for the VM's dispatch
/// (§4.6) and for round-trip tests (§8 property 5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unpacked {
    Int(u32),
    Primitive(u32),
    Projection(u32),
}

pub fn unpack(packed: PackedRef) -> Unpacked {
    let tag = packed >> PAYLOAD_BITS;
    let payload = packed & PAYLOAD_MASK;
    match tag {
        TAG_INT => Unpacked::Int(payload),
        TAG_PRIMITIVE => Unpacked::Primitive(payload),
        TAG_PROJECTION => Unpacked::Projection(payload),
        _ => unreachable!("only two tag bits are ever written"),
    }
}

/// Whether a non-negative integer qualifies for the inline fast path
/// (§4.2 step 1) rather than being interned into `primitives`.
pub fn is_inline_representable(value: i64) -> bool {
    value >= 0 && (value as u64) < TABLE_CEILING
}

#[cfg(test)]
#[path = "refs_tests.rs"]
mod refs_tests;
