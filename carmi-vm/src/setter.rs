//! Setter invocation, `ensurePath`, `applySetter`, and batching (§4.6
//! "Setters", §4.7 state machine).
//!
//! A compiled setter's `steps` are `[root, ...path, value]`: every step but
//! the last identifies where to write (the last component of `path` is the
//! slot `applySetter` writes at, or — for `splice` — the slot holding the
//! array plus the start index), and the last step is always the rewritten
//! `arg{token_count - 1}` (§4.3). A call passes `token_count` positional
//! arguments — one per path step — though only the last is ever read, since
//! every `key`-kind step shares that same rewritten slot; `splice`'s final
//! argument is the delete count, `set`/`push`'s is the value.

use carmi_compiler::{PackedSetter, SetterKind};
use serde_json::{Map, Value};

use crate::error::{Result, RuntimeError};
use crate::instance::{primitive_string, Instance};

impl Instance {
    /// Invoke a named setter (§4.6 "Setters", §4.7). Applies immediately
    /// and recomputes when idle; otherwise queues for the next drain.
    pub fn call_setter(&self, name: &str, args: &[Value]) -> Result<()> {
        let &setter_index = self
            .setters_by_name
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownSetter { name: name.to_string() })?;
        let setter = &self.data.setters[setter_index as usize];
        if args.len() != setter.token_count as usize {
            return Err(RuntimeError::SetterArityMismatch {
                name: name.to_string(),
                expected: setter.token_count,
                actual: args.len(),
            });
        }

        if self.in_batch.get() || self.in_recalculate.get() {
            self.enqueue_setter(setter_index, args.to_vec());
            return Ok(());
        }

        let strategy = self.batching_strategy.borrow().clone();
        if let Some(strategy) = strategy {
            self.in_batch.set(true);
            self.enqueue_setter(setter_index, args.to_vec());
            strategy();
            return Ok(());
        }

        self.apply_setter_call(setter_index, args)?;
        self.recalculate()
    }

    pub(crate) fn apply_setter_mutation(&self, setter: &PackedSetter, args: &[Value]) -> Result<()> {
        let (location, path_components, value) = self.resolve_setter_write(setter, args)?;
        let name = primitive_string(&self.data, setter_ref_index(setter.name_ref))?;
        let kind = setter_kind(&self.data, setter)?;

        {
            let mut state = self.state.borrow_mut();
            match kind {
                SetterKind::Set | SetterKind::Push => {
                    if path_components.is_empty() {
                        return Err(RuntimeError::InvalidSetter { name, kind, actual: "empty path" });
                    }
                    let split = path_components.len() - 1;
                    let (container_path, final_key) = path_components.split_at(split);
                    let container = ensure_path(&mut state.model, container_path)?;
                    match kind {
                        SetterKind::Set => set_at(container, &final_key[0], &value, &name)?,
                        SetterKind::Push => push_at(container, &final_key[0], &value, &name)?,
                        SetterKind::Splice => unreachable!(),
                    }
                }
                SetterKind::Splice => {
                    if path_components.len() < 2 {
                        return Err(RuntimeError::InvalidSetter { name, kind, actual: "path too short for splice" });
                    }
                    let split = path_components.len() - 2;
                    let (container_path, rest) = path_components.split_at(split);
                    let container = ensure_path(&mut state.model, container_path)?;
                    splice_at(container, &rest[0], &rest[1], &value, &name)?;
                }
            }
        }

        self.touched_locations.borrow_mut().push(location);
        Ok(())
    }
}

fn setter_ref_index(r: carmi_core::PackedRef) -> u32 {
    match carmi_core::unpack(r) {
        carmi_core::Unpacked::Primitive(index) => index,
        _ => u32::MAX,
    }
}

fn setter_kind(data: &carmi_compiler::ProjectionData, setter: &PackedSetter) -> Result<SetterKind> {
    let index = setter_ref_index(setter.kind_ref);
    match data.primitives.get(index as usize) {
        Some(carmi_compiler::PrimitiveValue::SetterKindTag(kind)) => Ok(*kind),
        _ => Err(carmi_core::Error::IntegrityError { table: "primitives", hash: index as u64 }.into()),
    }
}

/// Walks `components`, materializing any missing intermediate container:
/// an array if the next key is a non-negative integer, an object otherwise
/// (§4.6 "Setters" `ensurePath`). Idempotent (§8 property 4): re-walking an
/// already-materialized path touches nothing.
fn ensure_path<'a>(model: &'a mut Value, components: &[Value]) -> Result<&'a mut Value> {
    let mut current = model;
    for key in components {
        if current.is_null() {
            *current = if key.as_u64().is_some() { Value::Array(Vec::new()) } else { Value::Object(Map::new()) };
        }
        current = match current {
            Value::Array(items) => {
                let index = key.as_u64().ok_or(RuntimeError::TypeError { context: "ensurePath", expected: "array index", actual: "other" })? as usize;
                while items.len() <= index {
                    items.push(Value::Null);
                }
                &mut items[index]
            }
            Value::Object(map) => {
                let key = key.as_str().ok_or(RuntimeError::TypeError { context: "ensurePath", expected: "object key", actual: "other" })?;
                map.entry(key.to_string()).or_insert(Value::Null)
            }
            _ => return Err(RuntimeError::TypeError { context: "ensurePath", expected: "array or object", actual: "scalar" }),
        };
    }
    Ok(current)
}

/// `applySetter(container, key, value)`: writes `value`, or removes the key
/// entirely if `value` is `null` (§4.6).
fn set_at(container: &mut Value, key: &Value, value: &Value, name: &str) -> Result<()> {
    match container {
        Value::Array(items) => {
            let index = key
                .as_u64()
                .ok_or_else(|| RuntimeError::InvalidSetter { name: name.to_string(), kind: SetterKind::Set, actual: "non-integer key" })? as usize;
            if value.is_null() {
                if index < items.len() {
                    items.remove(index);
                }
            } else {
                while items.len() <= index {
                    items.push(Value::Null);
                }
                items[index] = value.clone();
            }
        }
        Value::Object(map) => {
            let key = key
                .as_str()
                .ok_or_else(|| RuntimeError::InvalidSetter { name: name.to_string(), kind: SetterKind::Set, actual: "non-string key" })?;
            if value.is_null() {
                map.remove(key);
            } else {
                map.insert(key.to_string(), value.clone());
            }
        }
        other => {
            return Err(RuntimeError::InvalidSetter { name: name.to_string(), kind: SetterKind::Set, actual: kind_name(other) });
        }
    }
    Ok(())
}

fn push_at(container: &mut Value, key: &Value, value: &Value, name: &str) -> Result<()> {
    let array = array_slot(container, key, name, SetterKind::Push)?;
    array.push(value.clone());
    Ok(())
}

fn splice_at(container: &mut Value, key: &Value, start_index: &Value, delete_count: &Value, name: &str) -> Result<()> {
    let array = array_slot(container, key, name, SetterKind::Splice)?;
    let start = start_index.as_u64().unwrap_or(0) as usize;
    let count = delete_count.as_u64().unwrap_or(0) as usize;
    if start < array.len() {
        let end = (start + count).min(array.len());
        array.drain(start..end);
    }
    Ok(())
}

fn array_slot<'a>(container: &'a mut Value, key: &Value, name: &str, kind: SetterKind) -> Result<&'a mut Vec<Value>> {
    let slot = match container {
        Value::Object(map) => {
            let key = key
                .as_str()
                .ok_or_else(|| RuntimeError::InvalidSetter { name: name.to_string(), kind, actual: "non-string key" })?;
            map.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new()))
        }
        Value::Array(items) => {
            let index = key
                .as_u64()
                .ok_or_else(|| RuntimeError::InvalidSetter { name: name.to_string(), kind, actual: "non-integer key" })? as usize;
            while items.len() <= index {
                items.push(Value::Array(Vec::new()));
            }
            &mut items[index]
        }
        other => return Err(RuntimeError::InvalidSetter { name: name.to_string(), kind, actual: kind_name(other) }),
    };
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut()
        .ok_or_else(|| RuntimeError::InvalidSetter { name: name.to_string(), kind, actual: kind_name(slot) })
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "setter_tests.rs"]
mod setter_tests;
