//! Carmi runtime: evaluates compiled projections over a live model (§4.6,
//! §6 "Runtime instance surface").
//!
//! [`carmi_compiler`] turns a front-end expression tree into `ProjectionData`;
//! this crate loads that artifact, tracks a model, and keeps every top-level
//! projection up to date as setters mutate it. [`Instance`] is the
//! entry point: construct one from compiled data plus an initial model,
//! read top levels with [`Instance::get`], and call setters to mutate.

pub mod combinators;
pub mod error;
pub mod eval;
pub mod funclib;
pub mod instance;
pub mod invalidate;
pub mod options;
pub mod setter;

pub use carmi_compiler::ProjectionData;
pub use error::{Result, RuntimeError};
pub use funclib::{FuncLib, LibFn, PlainFn, RecursiveFn};
pub use instance::{BatchingStrategy, Instance, Listener};
pub use options::VmOptions;

/// Decode a compiled bytecode blob (§4.5, §6) into `ProjectionData` ready
/// to hand to [`Instance::new`].
pub fn load(bytes: &[u8]) -> Result<ProjectionData> {
    Ok(carmi_compiler::emit::bytecode::decode(bytes)?)
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn load_roundtrips_what_the_compiler_emits() {
        let data = carmi_compiler::compile(carmi_compiler::Program {
            top_levels: vec![carmi_compiler::TopLevelDef {
                name: Some("answer".to_string()),
                body: carmi_core::Node::int(42),
            }],
            setters: Vec::new(),
        })
        .unwrap();
        let bytes = carmi_compiler::emit::bytecode::emit(&data).unwrap();
        let loaded = load(&bytes).unwrap();
        assert_eq!(data, loaded);
    }

    #[test]
    fn load_rejects_garbage_bytes() {
        let err = load(&[0xff, 0x00, 0x01]).unwrap_err();
        assert!(matches!(err, RuntimeError::Load(_)));
    }
}
