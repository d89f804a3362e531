//! Runtime configuration (§4.10 ambient, §6 `{ debug, typeCheck }`).

/// Runtime-side counterpart of `carmi_compiler::CompileOptions`: what the VM
/// itself needs to know to evaluate a compiled program.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VmOptions {
    /// Enables `$ast`/`$source` and `UndefinedFunction`/`TypeError` checks
    /// regardless of `type_check` (§6 "in debug mode").
    pub debug: bool,
    /// Validates operand shape before math/typed scalar ops even outside
    /// debug mode (§4.6 "in debug mode (or when type-check is enabled)").
    pub type_check: bool,
    /// Safety bound on `recalculate`'s fixpoint loop (§4.6, §7
    /// `RecalculationDivergence`).
    pub recalculation_pass_limit: u32,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            debug: false,
            type_check: false,
            recalculation_pass_limit: 64,
        }
    }
}

impl VmOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_type_check(mut self, type_check: bool) -> Self {
        self.type_check = type_check;
        self
    }

    pub fn with_recalculation_pass_limit(mut self, limit: u32) -> Self {
        self.recalculation_pass_limit = limit;
        self
    }

    /// Whether operand-shape checks should run for this call (§4.6).
    pub fn checks_types(&self) -> bool {
        self.debug || self.type_check
    }
}

#[cfg(test)]
mod options_tests {
    use super::*;

    #[test]
    fn debug_implies_type_checking() {
        let opts = VmOptions::new().with_debug(true);
        assert!(opts.checks_types());
    }

    #[test]
    fn default_has_a_finite_pass_limit() {
        assert!(VmOptions::default().recalculation_pass_limit > 0);
    }
}
