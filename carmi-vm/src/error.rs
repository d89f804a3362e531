//! Runtime errors (§7).

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A hash-consing or ref-packing invariant was violated while reading
    /// the compiled tables.
    #[error(transparent)]
    Core(#[from] carmi_core::Error),

    /// The bytecode blob handed to [`crate::load`] did not decode into a
    /// well-formed `ProjectionData` (§6 "bytecode back end").
    #[error("failed to load compiled projection: {0}")]
    Load(#[from] carmi_compiler::emit::bytecode::BytecodeError),

    /// A projection evaluated to a value of the wrong shape for its
    /// operator, e.g. `mapValues` over a scalar (§4.6 debug-mode checks).
    #[error("type error: {context} expected {expected}, got {actual}")]
    TypeError {
        context: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    /// No top level is exported under this name (§6 `Instance::get`).
    #[error("unknown top-level projection `{name}`")]
    UnknownTopLevel { name: String },

    /// No setter is registered under this name (§6 `Instance::set`).
    #[error("unknown setter `{name}`")]
    UnknownSetter { name: String },

    /// A setter was called with the wrong number of positional arguments.
    #[error("setter `{name}` expects {expected} argument(s), got {actual}")]
    SetterArityMismatch {
        name: String,
        expected: u32,
        actual: usize,
    },

    /// The dirty-set recalculation loop did not reach a fixpoint within the
    /// configured pass budget (§4.7 "Recalculation").
    #[error("recalculation did not converge after {passes} passes")]
    RecalculationDivergence { passes: u32 },

    /// Debug-mode access to a name missing from `funcLib` (§4.6, §7):
    /// raised whenever a recursive combinator's function argument does not
    /// resolve to a registered `funcLib` entry, since there is no
    /// compiled-body fallback for `loop` (see `funclib` module docs).
    #[error("undefined function `{name}`")]
    UndefinedFunction { name: String },

    /// A setter was invoked against a target shape its kind cannot mutate,
    /// e.g. `push` onto a keyed object (§7 `InvalidSetter`).
    #[error("setter `{name}` cannot apply a {kind:?} mutation to a {actual} value")]
    InvalidSetter {
        name: String,
        kind: carmi_compiler::SetterKind,
        actual: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
