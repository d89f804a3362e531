//! Invalidation and recalculation (§4.6 "Invalidation", §4.7 state machine).
//!
//! The cache is conservatively invalidated (§3 "Lifecycle": "a derived cache
//! that is conservatively invalidated by setters and rebuilt within
//! `recalculate`") rather than dependency-tracked per projection: once any
//! tracked invalidation path overlaps a location a setter touched, the
//! whole projection cache is cleared and every top level is recomputed
//! fresh against the now-mutated model. Every projection is still evaluated
//! at most once per settle (§8 property 3), because the getter cache
//! memoizes each index the first time it's reached during that recompute.

use carmi_compiler::{PackedPath, PackedSetter, PrimitiveValue};
use carmi_core::{PackedRef, Unpacked, unpack};
use serde_json::Value;

use crate::error::Result;
use crate::instance::{Instance, PendingSetter};

fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Resolves a path/setter's leading root marker into a namespace tag and
/// the offset its generic steps start at (§3 invariant "the first step
/// identifies a model root").
fn root_namespace(instance: &Instance, refs: &[PackedRef]) -> Result<(Value, usize)> {
    match unpack(refs[0]) {
        Unpacked::Int(top_level_index) => Ok((Value::String(format!("$top:{top_level_index}")), 1)),
        Unpacked::Primitive(index) => match instance.data.primitives.get(index as usize) {
            Some(PrimitiveValue::Str(marker)) if marker == "$context" => {
                Ok((Value::String("$context".to_string()), 2))
            }
            Some(PrimitiveValue::Str(marker)) if marker == "$root" => Ok((Value::String("$root".to_string()), 1)),
            _ => Err(carmi_core::Error::IntegrityError { table: "primitives", hash: index as u64 }.into()),
        },
        Unpacked::Projection(_) => Err(carmi_core::Error::IntegrityError { table: "paths", hash: refs[0] as u64 }.into()),
    }
}

/// Whether `a` and `b` agree on every position they both have, i.e. one is
/// a structural prefix of the other — touching a container also dirties
/// everything nested under it.
fn locations_overlap(a: &[Value], b: &[Value]) -> bool {
    let n = a.len().min(b.len());
    a[..n] == b[..n]
}

impl Instance {
    /// Concrete, evaluated form of a compiled invalidation path: `None` if
    /// its condition is falsy (§4.6 "the condition is a projection that
    /// must produce a truthy value").
    fn resolve_path_location(&self, path: &PackedPath) -> Result<Option<Vec<Value>>> {
        let condition = self.eval(path[0])?;
        if !truthy(&condition) {
            return Ok(None);
        }
        let (namespace, start) = root_namespace(self, &path[1..])?;
        let mut location = vec![namespace];
        for &step in &path[1 + start..] {
            location.push(self.eval(step)?);
        }
        Ok(Some(location))
    }

    /// Concrete location a setter call just wrote to, and the value it
    /// wrote (§4.3, §4.6 "Setters"): the setter's steps are `[root,
    /// ...path, value]`, where `value` is always the rewritten terminal
    /// `key` resolved against `args` via the arg stack.
    pub(crate) fn resolve_setter_write(&self, setter: &PackedSetter, args: &[Value]) -> Result<(Vec<Value>, Vec<Value>, Value)> {
        self.state.borrow_mut().arg_stack = args.to_vec();
        let result = (|| {
            let (namespace, start) = root_namespace(self, &setter.steps)?;
            let body = &setter.steps[start..];
            let (key_steps, value_step) = body.split_at(body.len().saturating_sub(1));
            let mut location = vec![namespace.clone()];
            let mut path_components = Vec::with_capacity(key_steps.len());
            for &step in key_steps {
                let v = self.eval(step)?;
                location.push(v.clone());
                path_components.push(v);
            }
            let value = self.eval(value_step[0])?;
            Ok((location, path_components, value))
        })();
        self.state.borrow_mut().arg_stack.clear();
        result
    }

    /// Mark every invalidation path that overlaps `touched` as dirty by
    /// queuing a full recompute; returns whether anything matched.
    fn any_path_touches(&self, touched: &[Value]) -> Result<bool> {
        for record in &self.data.meta_data {
            for &path_index in &record.paths {
                let Some(path) = self.data.paths.get(path_index as usize) else { continue };
                if let Some(location) = self.resolve_path_location(path)? {
                    if locations_overlap(&location, touched) {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// `recalculate` (§4.6, §4.7): a no-op while batching; otherwise
    /// iterates to a fixpoint (no newly touched location matches a tracked
    /// path), refreshes every top-level field, and fires listeners once.
    pub(crate) fn recalculate(&self) -> Result<()> {
        if self.in_batch.get() {
            return Ok(());
        }
        self.in_recalculate.set(true);
        let outcome = self.recalculate_inner();
        self.in_recalculate.set(false);
        outcome?;

        if !self.batch_pending.borrow().is_empty() {
            self.drain_batch_pending()?;
            return self.recalculate();
        }
        Ok(())
    }

    fn recalculate_inner(&self) -> Result<()> {
        let mut pass = 0u32;
        loop {
            let touched = std::mem::take(&mut *self.touched_locations.borrow_mut());
            if touched.is_empty() {
                break;
            }
            pass += 1;
            if pass > self.options.recalculation_pass_limit {
                return Err(crate::error::RuntimeError::RecalculationDivergence { passes: pass - 1 });
            }
            let mut any_dirty = false;
            for location in &touched {
                if self.any_path_touches(location)? {
                    any_dirty = true;
                }
            }
            tracing::debug!(pass, touched = touched.len(), dirty = any_dirty, "recalculate pass");
            if !any_dirty {
                break;
            }
            for slot in self.state.borrow_mut().values.iter_mut() {
                *slot = None;
            }
        }

        let mut fresh = std::collections::HashMap::new();
        for name in self.top_level_by_name.keys() {
            fresh.insert(name.clone(), self.get_uncached(name)?);
        }
        *self.exported.borrow_mut() = fresh;

        for (_, listener) in self.listeners.borrow().iter() {
            listener();
        }
        Ok(())
    }

    fn get_uncached(&self, name: &str) -> Result<Value> {
        let &index = self.top_level_by_name.get(name).expect("name drawn from top_level_by_name itself");
        let r = self.data.top_level_projections[index as usize];
        self.eval(r)
    }

    /// Runs one setter's mutation, then queues the touched location so
    /// `recalculate` knows whether anything downstream is dirty.
    pub(crate) fn apply_setter_call(&self, setter_index: u32, args: &[Value]) -> Result<()> {
        let setter = &self.data.setters[setter_index as usize];
        self.apply_setter_mutation(setter, args)?;
        Ok(())
    }

    /// Queues `setter_index(args)` for batched application (§4.6, §4.7).
    pub(crate) fn enqueue_setter(&self, setter_index: u32, args: Vec<Value>) {
        self.batch_pending.borrow_mut().push_back(PendingSetter { setter_index, args });
    }
}

#[cfg(test)]
#[path = "invalidate_tests.rs"]
mod invalidate_tests;
