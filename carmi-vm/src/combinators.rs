//! Pure collection combinators (§4.6 "Collection combinators").
//!
//! Each function takes the argument collection and a per-element callback
//! and returns the transformed collection; none of them touch `Instance`
//! state, so they're trivially unit-testable in isolation. The caller is
//! responsible for resolving the compiled function argument (projection
//! body vs. `funcLib` name) before calling in here — see `eval::dispatch`.

use serde_json::{Map, Value};

use crate::error::{Result, RuntimeError};

fn type_error(op: &'static str, expected: &'static str, actual: &Value) -> RuntimeError {
    RuntimeError::TypeError {
        context: op,
        expected,
        actual: kind_name(actual),
    }
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

fn as_object<'a>(op: &'static str, input: &'a Value) -> Result<&'a Map<String, Value>> {
    input.as_object().ok_or_else(|| type_error(op, "object", input))
}

fn as_array<'a>(op: &'static str, input: &'a Value) -> Result<&'a Vec<Value>> {
    input.as_array().ok_or_else(|| type_error(op, "array", input))
}

fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

fn key_str(op: &'static str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(type_error(op, "string or number", &other)),
    }
}

type Callback<'a> = dyn Fn(&Value, &Value) -> Result<Value> + 'a;

pub fn map_values(input: &Value, f: &Callback) -> Result<Value> {
    let object = as_object("mapValues", input)?;
    let mut out = Map::with_capacity(object.len());
    for (key, value) in object {
        out.insert(key.clone(), f(value, &Value::String(key.clone()))?);
    }
    Ok(Value::Object(out))
}

pub fn filter_by(input: &Value, f: &Callback) -> Result<Value> {
    let object = as_object("filterBy", input)?;
    let mut out = Map::new();
    for (key, value) in object {
        if truthy(&f(value, &Value::String(key.clone()))?) {
            out.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::Object(out))
}

pub fn group_by(input: &Value, f: &Callback) -> Result<Value> {
    let array = as_array("groupBy", input)?;
    let mut out = Map::new();
    for (index, value) in array.iter().enumerate() {
        let key = key_str("groupBy", f(value, &Value::from(index))?)?;
        out.entry(key)
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .expect("just-inserted entry is always an array")
            .push(value.clone());
    }
    Ok(Value::Object(out))
}

pub fn map_keys(input: &Value, f: &Callback) -> Result<Value> {
    let object = as_object("mapKeys", input)?;
    let mut out = Map::with_capacity(object.len());
    for (key, value) in object {
        let new_key = key_str("mapKeys", f(value, &Value::String(key.clone()))?)?;
        out.insert(new_key, value.clone());
    }
    Ok(Value::Object(out))
}

pub fn map(input: &Value, f: &Callback) -> Result<Value> {
    let array = as_array("map", input)?;
    array
        .iter()
        .enumerate()
        .map(|(index, value)| f(value, &Value::from(index)))
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

pub fn any(input: &Value, f: &Callback) -> Result<Value> {
    let array = as_array("any", input)?;
    for (index, value) in array.iter().enumerate() {
        if truthy(&f(value, &Value::from(index))?) {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

pub fn filter(input: &Value, f: &Callback) -> Result<Value> {
    let array = as_array("filter", input)?;
    let mut out = Vec::new();
    for (index, value) in array.iter().enumerate() {
        if truthy(&f(value, &Value::from(index))?) {
            out.push(value.clone());
        }
    }
    Ok(Value::Array(out))
}

pub fn any_values(input: &Value, f: &Callback) -> Result<Value> {
    let object = as_object("anyValues", input)?;
    for (key, value) in object {
        if truthy(&f(value, &Value::String(key.clone()))?) {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

pub fn key_by(input: &Value, f: &Callback) -> Result<Value> {
    let array = as_array("keyBy", input)?;
    let mut out = Map::new();
    for (index, value) in array.iter().enumerate() {
        let key = key_str("keyBy", f(value, &Value::from(index))?)?;
        out.insert(key, value.clone());
    }
    Ok(Value::Object(out))
}

/// `(value, key, loop) -> result`, where `loop(key)` resolves another
/// element of the same collection (§4.6, §9).
type RecursiveCallback<'a> = dyn Fn(&Value, &Value, &dyn Fn(&Value) -> Result<Value>) -> Result<Value> + 'a;

enum MemoState {
    InProgress,
    Done(Value),
}

/// Single-evaluation-per-key traversal helper (§9 "Cyclic reachability"):
/// re-entering a key still being computed returns `null` rather than
/// recursing forever.
struct RecursiveMemo<'a> {
    cache: std::cell::RefCell<std::collections::HashMap<String, MemoState>>,
    lookup: &'a dyn Fn(&str) -> Option<Value>,
}

impl<'a> RecursiveMemo<'a> {
    fn resolve(&self, key: &str, f: &RecursiveCallback) -> Result<Value> {
        if let Some(state) = self.cache.borrow().get(key) {
            return Ok(match state {
                MemoState::Done(v) => v.clone(),
                MemoState::InProgress => Value::Null,
            });
        }
        self.cache.borrow_mut().insert(key.to_string(), MemoState::InProgress);
        let value = (self.lookup)(key).unwrap_or(Value::Null);
        let loop_fn = |k: &Value| -> Result<Value> {
            let key_str = key_str("recursiveMap", k.clone())?;
            self.resolve(&key_str, f)
        };
        let result = f(&value, &Value::String(key.to_string()), &loop_fn)?;
        self.cache
            .borrow_mut()
            .insert(key.to_string(), MemoState::Done(result.clone()));
        Ok(result)
    }
}

pub fn recursive_map(input: &Value, f: &RecursiveCallback) -> Result<Value> {
    let array = as_array("recursiveMap", input)?;
    let lookup = |key: &str| -> Option<Value> { key.parse::<usize>().ok().and_then(|i| array.get(i).cloned()) };
    let memo = RecursiveMemo {
        cache: std::cell::RefCell::new(std::collections::HashMap::new()),
        lookup: &lookup,
    };
    (0..array.len())
        .map(|index| memo.resolve(&index.to_string(), f))
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

pub fn recursive_map_values(input: &Value, f: &RecursiveCallback) -> Result<Value> {
    let object = as_object("recursiveMapValues", input)?;
    let lookup = |key: &str| -> Option<Value> { object.get(key).cloned() };
    let memo = RecursiveMemo {
        cache: std::cell::RefCell::new(std::collections::HashMap::new()),
        lookup: &lookup,
    };
    let mut out = Map::with_capacity(object.len());
    for key in object.keys() {
        out.insert(key.clone(), memo.resolve(key, f)?);
    }
    Ok(Value::Object(out))
}

#[cfg(test)]
#[path = "combinators_tests.rs"]
mod combinators_tests;
