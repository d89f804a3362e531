//! Compiles a front-end expression tree into `ProjectionData` (§4).
//!
//! Pipeline: [`builder`] walks the tree and hash-conses it into the three
//! content-addressed tables; [`setters`] compiles raw setters against the
//! same tables; [`packer`] resolves everything into dense, tag-packed
//! references and assembles the final artifact; [`emit`] serializes it to
//! either back end.

pub mod builder;
pub mod data;
pub mod emit;
pub mod error;
pub mod packer;
pub mod setters;

pub use builder::{Builder, TopLevelDef};
pub use data::{
    MetadataRecord, PackedPath, PackedProjection, PackedSetter, PrimitiveValue, ProjectionData,
    SetterKind,
};
pub use emit::template::TemplateFormat;
pub use error::{CompileError, Result};
pub use setters::RawSetter;

/// A complete program as written by the front end: every top-level
/// definition plus every registered setter (§3).
#[derive(Default)]
pub struct Program {
    pub top_levels: Vec<TopLevelDef>,
    pub setters: Vec<RawSetter>,
}

/// The compiler-side counterpart of `carmi_vm::VmOptions` (§6 "options `{
/// debug, typeCheck, format }`"). `debug`/`type_check` govern the VM's
/// behavior once loaded and are carried here only so a caller has one place
/// to set all three; `compile` itself does not branch on them — the
/// projection graph it builds is the same regardless of debug mode, and the
/// `$ast`/`TypeError` gating they control lives entirely in `carmi_vm`.
/// `format` selects which textual envelope `emit_template` produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    pub debug: bool,
    pub type_check: bool,
    pub format: TemplateFormat,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            debug: false,
            type_check: false,
            format: TemplateFormat::ModuleExport,
        }
    }
}

/// Compile a program into its `ProjectionData` (§4 end to end).
pub fn compile(program: Program) -> Result<ProjectionData> {
    let mut builder = Builder::new()?;
    let top_level_refs = builder.build_top_levels(&program.top_levels)?;
    let compiled_setters = program
        .setters
        .iter()
        .map(|setter| builder.compile_setter(setter))
        .collect::<Result<Vec<_>>>()?;
    let output = builder.finish(top_level_refs, compiled_setters);
    packer::pack(output)
}

#[cfg(test)]
mod lib_tests {
    use carmi_core::Node;

    use super::*;

    #[test]
    fn compile_empty_program_yields_sentinel_only_metadata() {
        let data = compile(Program::default()).unwrap();
        assert!(data.has_metadata_sentinel());
        assert_eq!(data.meta_data.len(), 1);
    }

    #[test]
    fn compile_single_top_level_scalar() {
        let program = Program {
            top_levels: vec![TopLevelDef {
                name: Some("answer".into()),
                body: Node::int(42),
            }],
            setters: Vec::new(),
        };
        let data = compile(program).unwrap();
        assert_eq!(data.top_level_projections.len(), 1);
    }

    #[test]
    fn compile_options_default_to_non_debug_module_export() {
        let opts = CompileOptions::default();
        assert!(!opts.debug);
        assert!(!opts.type_check);
        assert_eq!(opts.format, TemplateFormat::ModuleExport);
    }
}
