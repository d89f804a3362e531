//! Errors that can surface from the data model and hash-consing layer.
//!
//! Mirrors the teacher's small, data-carrying `thiserror` enums
//! (`plotnik_lib::Error`, `engine::error::RuntimeError`) rather than a
//! single stringly-typed error.

/// Internal compiler-invariant violations. These are fatal: they indicate
/// either a hash collision that structural equality disagrees with, or a
/// table that grew past the packable ref range (§4.4, §9 "Reference
/// packing").
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A hash-consed table already has an entry under this hash whose value
    /// does not match the one being interned (§4.1).
    #[error("hash collision in `{table}` table: hash {hash:#x} is already bound to a different value")]
    IntegrityError { table: &'static str, hash: u64 },

    /// A table grew past the packable index ceiling (§3, §9).
    #[error("`{table}` table overflowed its packable range ({index} >= {ceiling})")]
    RefRangeOverflow {
        table: &'static str,
        index: u64,
        ceiling: u64,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
