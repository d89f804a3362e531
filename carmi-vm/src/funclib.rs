//! User-provided function library (§4.6 `funcLib`).
//!
//! A combinator's function argument is, in the common case, itself a
//! compiled sub-expression evaluated with `context`/`key` bound to the
//! current element (§4.2's `Token` kinds `context`/`key` are ordinary
//! operators, not magic). `recursiveMap`/`recursiveMapValues` are the
//! exception: their callback needs a reified `loop(key)` (§9 "Cyclic
//! reachability"), which has no representation in the compiled graph, so
//! those two combinators always resolve their function argument through
//! `funcLib` by name instead.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;

/// `(value, key, context) -> result`, called once per element by the
/// non-recursive combinators when their function argument names a host
/// function rather than a compiled sub-expression.
pub type PlainFn = Arc<dyn Fn(&Value, &Value, &Value) -> Result<Value> + Send + Sync>;

/// `(value, key, context, loop) -> result`, where `loop(key)` resolves
/// another element of the same collection, memoized per traversal (§4.6,
/// §9).
pub type RecursiveFn =
    Arc<dyn Fn(&Value, &Value, &Value, &dyn Fn(&Value) -> Result<Value>) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
pub enum LibFn {
    Plain(PlainFn),
    Recursive(RecursiveFn),
}

/// A named table of host functions, looked up by the VM when a combinator's
/// function argument is a primitive string rather than a projection ref.
#[derive(Clone, Default)]
pub struct FuncLib {
    entries: HashMap<String, LibFn>,
}

impl FuncLib {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_plain(&mut self, name: impl Into<String>, f: PlainFn) -> &mut Self {
        self.entries.insert(name.into(), LibFn::Plain(f));
        self
    }

    pub fn register_recursive(&mut self, name: impl Into<String>, f: RecursiveFn) -> &mut Self {
        self.entries.insert(name.into(), LibFn::Recursive(f));
        self
    }

    pub fn get(&self, name: &str) -> Option<&LibFn> {
        self.entries.get(name)
    }
}

#[cfg(test)]
mod funclib_tests {
    use super::*;

    #[test]
    fn registered_plain_function_is_retrievable() {
        let mut lib = FuncLib::new();
        lib.register_plain("double", Arc::new(|v, _k, _ctx| Ok(v.clone())));
        assert!(matches!(lib.get("double"), Some(LibFn::Plain(_))));
        assert!(lib.get("missing").is_none());
    }
}
