//! Core data structures for Carmi: the expression/token data model that the
//! compiler consumes, the hash-consing tables it builds during compilation,
//! and reference packing shared by the packer and the VM.
//!
//! Scope note: this crate owns §3's data model plus §4.1/§4.4's table and
//! ref machinery. It has no opinion on *how* a graph is built — that's
//! `carmi-compiler` — or on how it's executed — that's `carmi-vm`.

pub mod error;
pub mod expr;
pub mod interner;
pub mod refs;
pub mod stable_hash;
pub mod token;

pub use error::{Error, Result};
pub use expr::{Expression, Node, Scalar};
pub use interner::HashConsTable;
pub use refs::{IntermediateRef, PackedRef, TABLE_CEILING, Unpacked, is_inline_representable};
pub use token::{Kind, PathEntry, PathRoot, RawPath, SourceLocation, Token};
