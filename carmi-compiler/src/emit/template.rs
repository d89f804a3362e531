//! Textual envelope back end (§4.5, §6): wraps the JSON-encoded tables in a
//! small runtime-loader template, for embedding directly in generated
//! source rather than shipping a side-channel binary blob.

use crate::data::ProjectionData;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to serialize projection data to JSON: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Whether the emitted envelope runs itself immediately or exports a value
/// for a caller to load (§4.5 "self-invoking vs. module-export").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateFormat {
    SelfInvoking,
    ModuleExport,
}

const TEMPLATE_SELF_INVOKING: &str = r#"(function () {
  var NAME = {name};
  var DEBUG_MODE = {debug_mode};
  var LIBRARY = {library};
  var ALL_EXPRESSIONS = {expressions};
  var SETTERS = {setters};
  var DERIVED = {derived};
  var AST = {ast};
  return LIBRARY.load(NAME, ALL_EXPRESSIONS, SETTERS, DERIVED, { debugMode: DEBUG_MODE, ast: AST });
})();
"#;

const TEMPLATE_MODULE_EXPORT: &str = r#"var NAME = {name};
var DEBUG_MODE = {debug_mode};
var LIBRARY = {library};
var ALL_EXPRESSIONS = {expressions};
var SETTERS = {setters};
var DERIVED = {derived};
var AST = {ast};
module.exports = LIBRARY.load(NAME, ALL_EXPRESSIONS, SETTERS, DERIVED, { debugMode: DEBUG_MODE, ast: AST });
"#;

/// Emit `data` as a self-contained text envelope naming the projection
/// `name`. `RESET`/`AST` placeholders are only meaningful in debug mode
/// (§6 `$ast`/`$source`); they're emitted empty otherwise.
pub fn emit(
    data: &ProjectionData,
    name: &str,
    format: TemplateFormat,
    debug_mode: bool,
) -> Result<String, TemplateError> {
    let expressions = serde_json::to_string(&data.getters).map_err(TemplateError::Encode)?;
    let setters = serde_json::to_string(&data.setters).map_err(TemplateError::Encode)?;
    let derived = serde_json::to_string(&DerivedTables {
        primitives: &data.primitives,
        top_level_names: &data.top_level_names,
        top_level_projections: &data.top_level_projections,
        meta_data: &data.meta_data,
        paths: &data.paths,
    })
    .map_err(TemplateError::Encode)?;
    let ast = if debug_mode {
        serde_json::to_string(&data.sources).map_err(TemplateError::Encode)?
    } else {
        "null".to_string()
    };
    let name_json = serde_json::to_string(name).map_err(TemplateError::Encode)?;

    let template = match format {
        TemplateFormat::SelfInvoking => TEMPLATE_SELF_INVOKING,
        TemplateFormat::ModuleExport => TEMPLATE_MODULE_EXPORT,
    };
    Ok(template
        .replace("{name}", &name_json)
        .replace("{debug_mode}", if debug_mode { "true" } else { "false" })
        .replace("{library}", "require(\"carmi/runtime\")")
        .replace("{expressions}", &expressions)
        .replace("{setters}", &setters)
        .replace("{derived}", &derived)
        .replace("{ast}", &ast))
}

/// Every table the emitted expressions reference by index, bundled so the
/// envelope only needs one extra JSON blob alongside `ALL_EXPRESSIONS`.
#[derive(serde::Serialize)]
struct DerivedTables<'a> {
    primitives: &'a [crate::data::PrimitiveValue],
    top_level_names: &'a [i32],
    top_level_projections: &'a [carmi_core::PackedRef],
    meta_data: &'a [crate::data::MetadataRecord],
    paths: &'a [crate::data::PackedPath],
}
