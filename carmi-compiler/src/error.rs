//! Compile-time errors (§7).

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    /// A hash-consing or ref-packing invariant was violated while building
    /// the tables.
    #[error(transparent)]
    Core(#[from] carmi_core::Error),

    /// A setter's terminal step sequence does not resolve to a single `key`
    /// token, so it cannot be rewritten into a positional argument (§4.3).
    #[error("setter `{name}` has no terminal key step to rewrite into an argument")]
    SetterMissingTerminalKey { name: String },

    /// A `get` on `topLevel` referenced a name with no matching top-level
    /// projection (§4.2 `get` rule).
    #[error("unknown top-level projection `{name}` referenced by `get`/`topLevel`")]
    UnknownTopLevel { name: String },

    /// A `trace` token's first argument did not resolve to an inner
    /// operator kind (§4.2 `trace` rule).
    #[error("`trace` token's first argument does not name an inner operator kind")]
    TraceMissingInnerKind,

    /// `range` was called with other than 1, 2, or 3 arguments (§4.2 table).
    #[error("`range` expects 1 to 3 arguments, got {arg_count}")]
    RangeArityMismatch { arg_count: usize },
}

pub type Result<T> = std::result::Result<T, CompileError>;
