//! Projection evaluation (§4.6 "Evaluation").

use carmi_compiler::{PackedProjection, PrimitiveValue};
use carmi_core::{Kind, PackedRef, Unpacked, unpack};
use serde_json::{Map, Value};

use crate::combinators;
use crate::error::{Result, RuntimeError};
use crate::funclib::LibFn;
use crate::instance::Instance;

fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

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

fn as_number(op: &'static str, checks_types: bool, value: &Value) -> Result<f64> {
    match value.as_f64() {
        Some(n) => Ok(n),
        None if checks_types => Err(type_error(op, "number", value)),
        None => Ok(f64::NAN),
    }
}

impl Instance {
    /// Dereference any packed ref: an inline integer, a `primitives` entry,
    /// or a (cached) `projections` entry.
    pub(crate) fn eval(&self, r: PackedRef) -> Result<Value> {
        match unpack(r) {
            Unpacked::Int(v) => Ok(Value::from(v)),
            Unpacked::Primitive(index) => self.eval_primitive(index),
            Unpacked::Projection(index) => self.eval_projection(index),
        }
    }

    fn eval_primitive(&self, index: u32) -> Result<Value> {
        let Some(value) = self.data.primitives.get(index as usize) else {
            return Err(RuntimeError::Core(carmi_core::Error::IntegrityError {
                table: "primitives",
                hash: index as u64,
            }));
        };
        Ok(match value {
            PrimitiveValue::Null => Value::Null,
            PrimitiveValue::Bool(b) => Value::Bool(*b),
            PrimitiveValue::Int(n) => Value::from(*n),
            PrimitiveValue::Float(f) => Value::from(*f),
            PrimitiveValue::Str(s) => Value::String(s.clone()),
            PrimitiveValue::Record(v) => v.clone(),
            // Operator-kind / setter-kind tags are read directly by their
            // owning projection; evaluating one as a plain value is an
            // internal invariant violation, never user-reachable.
            PrimitiveValue::OpKind(_) | PrimitiveValue::SetterKindTag(_) => Value::Null,
        })
    }

    fn eval_projection(&self, index: u32) -> Result<Value> {
        if let Some(Some(cached)) = self.state.borrow().values.get(index as usize) {
            return Ok(cached.clone());
        }
        let projection = self
            .data
            .getters
            .get(index as usize)
            .ok_or_else(|| RuntimeError::Core(carmi_core::Error::IntegrityError { table: "getters", hash: index as u64 }))?;
        let kind = self.projection_kind(projection)?;
        let value = self.dispatch(kind, projection)?;
        self.state.borrow_mut().values[index as usize] = Some(value.clone());
        Ok(value)
    }

    fn projection_kind(&self, projection: &PackedProjection) -> Result<Kind> {
        let Unpacked::Primitive(index) = unpack(projection.type_ref) else {
            return Err(RuntimeError::Core(carmi_core::Error::IntegrityError {
                table: "primitives",
                hash: projection.type_ref as u64,
            }));
        };
        match self.data.primitives.get(index as usize) {
            Some(PrimitiveValue::OpKind(kind)) => Ok(*kind),
            _ => Err(RuntimeError::Core(carmi_core::Error::IntegrityError { table: "primitives", hash: index as u64 })),
        }
    }

    fn dispatch(&self, kind: Kind, projection: &PackedProjection) -> Result<Value> {
        let args = &projection.args;
        match kind {
            Kind::Get => self.eval_get(args),
            Kind::TopLevel => self.eval_top_level(args),
            Kind::Context => Ok(self.state.borrow().context_stack.last().cloned().unwrap_or_else(|| self.state.borrow().model.clone())),
            Kind::Root => Ok(self.state.borrow().model.clone()),
            Kind::Key => Ok(self.state.borrow().key_stack.last().cloned().unwrap_or(Value::Null)),
            Kind::Arg(n) => Ok(self.state.borrow().arg_stack.get(n as usize).cloned().unwrap_or(Value::Null)),
            Kind::Trace => self.eval_trace(args, projection.source),
            Kind::And => self.eval_and(args),
            Kind::Or => self.eval_or(args),
            Kind::Ternary => self.eval_ternary(args),
            Kind::Range => self.eval_range(args),
            Kind::Add | Kind::Sub | Kind::Mul | Kind::Div | Kind::Mod => self.eval_arith(kind, args),
            Kind::Eq => Ok(Value::Bool(self.eval(args[0])? == self.eval(args[1])?)),
            Kind::Neq => Ok(Value::Bool(self.eval(args[0])? != self.eval(args[1])?)),
            Kind::Lt | Kind::Lte | Kind::Gt | Kind::Gte => self.eval_compare(kind, args),
            Kind::Not => Ok(Value::Bool(!truthy(&self.eval(args[0])?))),
            Kind::MapValues
            | Kind::FilterBy
            | Kind::GroupBy
            | Kind::MapKeys
            | Kind::Map
            | Kind::Any
            | Kind::Filter
            | Kind::AnyValues
            | Kind::KeyBy => self.eval_combinator(kind, args),
            Kind::RecursiveMap | Kind::RecursiveMapValues => self.eval_recursive_combinator(kind, args),
            Kind::Keys => self.eval_keys(args),
            Kind::Values => self.eval_values(args),
            Kind::Assign => self.eval_assign(args),
            Kind::Defaults => self.eval_defaults(args),
            Kind::Size => self.eval_size(args),
            Kind::Sum => self.eval_sum(args),
            Kind::Flatten => self.eval_flatten(args),
        }
    }

    fn eval_get(&self, args: &[PackedRef]) -> Result<Value> {
        let object = self.eval(args[0])?;
        let key = self.eval(args[1])?;
        Ok(match &object {
            Value::Array(items) => key
                .as_u64()
                .and_then(|i| items.get(i as usize))
                .cloned()
                .unwrap_or(Value::Null),
            Value::Object(map) => key
                .as_str()
                .and_then(|k| map.get(k))
                .cloned()
                .unwrap_or(Value::Null),
            _ => Value::Null,
        })
    }

    fn eval_top_level(&self, args: &[PackedRef]) -> Result<Value> {
        let Unpacked::Int(index) = unpack(args[0]) else {
            return Err(RuntimeError::Core(carmi_core::Error::IntegrityError { table: "topLevelProjections", hash: args[0] as u64 }));
        };
        let r = *self
            .data
            .top_level_projections
            .get(index as usize)
            .ok_or_else(|| RuntimeError::Core(carmi_core::Error::IntegrityError { table: "topLevelProjections", hash: index as u64 }))?;
        self.eval(r)
    }

    fn eval_trace(&self, args: &[PackedRef], source: Option<u32>) -> Result<Value> {
        let value = self.eval(args[1])?;
        let op = match unpack(args[0]) {
            Unpacked::Primitive(index) => match self.data.primitives.get(index as usize) {
                Some(PrimitiveValue::OpKind(k)) => format!("{k:?}"),
                _ => "<unknown>".to_string(),
            },
            _ => "<unknown>".to_string(),
        };
        let location = source.and_then(|i| self.data.sources.get(i as usize));
        tracing::info!(op = %op, source = ?location, value = %value, "trace");
        Ok(value)
    }

    fn eval_and(&self, args: &[PackedRef]) -> Result<Value> {
        let operands = &args[1..];
        let lhs = self.eval(operands[0])?;
        if !truthy(&lhs) {
            return Ok(lhs);
        }
        self.eval(operands[1])
    }

    fn eval_or(&self, args: &[PackedRef]) -> Result<Value> {
        let operands = &args[1..];
        let lhs = self.eval(operands[0])?;
        if truthy(&lhs) {
            return Ok(lhs);
        }
        self.eval(operands[1])
    }

    fn eval_ternary(&self, args: &[PackedRef]) -> Result<Value> {
        let operands = &args[1..];
        if truthy(&self.eval(operands[0])?) {
            self.eval(operands[1])
        } else {
            self.eval(operands[2])
        }
    }

    fn eval_range(&self, args: &[PackedRef]) -> Result<Value> {
        let start = self.eval(args[0])?.as_i64().unwrap_or(0);
        let stop = self.eval(args[1])?.as_i64().unwrap_or(0);
        let step = self.eval(args[2])?.as_i64().unwrap_or(1);
        let mut out = Vec::new();
        if step > 0 {
            let mut n = start;
            while n < stop {
                out.push(Value::from(n));
                n += step;
            }
        } else if step < 0 {
            let mut n = start;
            while n > stop {
                out.push(Value::from(n));
                n += step;
            }
        }
        Ok(Value::Array(out))
    }

    fn eval_arith(&self, kind: Kind, args: &[PackedRef]) -> Result<Value> {
        let checks = self.options.checks_types();
        let op = arith_op_name(kind);
        let lhs = as_number(op, checks, &self.eval(args[0])?)?;
        let rhs = as_number(op, checks, &self.eval(args[1])?)?;
        let result = match kind {
            Kind::Add => lhs + rhs,
            Kind::Sub => lhs - rhs,
            Kind::Mul => lhs * rhs,
            Kind::Div => lhs / rhs,
            Kind::Mod => lhs % rhs,
            _ => unreachable!(),
        };
        if !result.is_finite() && checks {
            tracing::warn!(op, "arithmetic produced a non-finite result");
        }
        Ok(Value::from(result))
    }

    fn eval_compare(&self, kind: Kind, args: &[PackedRef]) -> Result<Value> {
        let checks = self.options.checks_types();
        let op = compare_op_name(kind);
        let lhs = as_number(op, checks, &self.eval(args[0])?)?;
        let rhs = as_number(op, checks, &self.eval(args[1])?)?;
        let result = match kind {
            Kind::Lt => lhs < rhs,
            Kind::Lte => lhs <= rhs,
            Kind::Gt => lhs > rhs,
            Kind::Gte => lhs >= rhs,
            _ => unreachable!(),
        };
        Ok(Value::Bool(result))
    }

    fn eval_combinator(&self, kind: Kind, args: &[PackedRef]) -> Result<Value> {
        let collection = self.eval(args[0])?;
        let fn_ref = args[1];
        let call = |value: &Value, key: &Value| self.invoke_combinator_fn(fn_ref, value, key, &collection);
        match kind {
            Kind::MapValues => combinators::map_values(&collection, &call),
            Kind::FilterBy => combinators::filter_by(&collection, &call),
            Kind::GroupBy => combinators::group_by(&collection, &call),
            Kind::MapKeys => combinators::map_keys(&collection, &call),
            Kind::Map => combinators::map(&collection, &call),
            Kind::Any => combinators::any(&collection, &call),
            Kind::Filter => combinators::filter(&collection, &call),
            Kind::AnyValues => combinators::any_values(&collection, &call),
            Kind::KeyBy => combinators::key_by(&collection, &call),
            _ => unreachable!("non-combinator kind routed to eval_combinator"),
        }
    }

    fn eval_recursive_combinator(&self, kind: Kind, args: &[PackedRef]) -> Result<Value> {
        let collection = self.eval(args[0])?;
        let name = self.combinator_fn_name(args[1])?;
        let LibFn::Recursive(f) = self
            .func_lib
            .get(&name)
            .ok_or_else(|| RuntimeError::UndefinedFunction { name: name.clone() })?
        else {
            return Err(RuntimeError::UndefinedFunction { name });
        };
        let call = |value: &Value, key: &Value, recurse: &dyn Fn(&Value) -> Result<Value>| f(value, key, &collection, recurse);
        match kind {
            Kind::RecursiveMap => combinators::recursive_map(&collection, &call),
            Kind::RecursiveMapValues => combinators::recursive_map_values(&collection, &call),
            _ => unreachable!("non-recursive kind routed to eval_recursive_combinator"),
        }
    }

    /// Resolves a combinator's function argument against `funcLib` when it
    /// names a registered host function, falling back to evaluating it as a
    /// compiled sub-expression with `context`/`key` bound to the current
    /// element otherwise (see module docs on `funclib`).
    fn invoke_combinator_fn(&self, fn_ref: PackedRef, value: &Value, key: &Value, context: &Value) -> Result<Value> {
        if let Ok(name) = self.combinator_fn_name(fn_ref) {
            if let Some(LibFn::Plain(f)) = self.func_lib.get(&name) {
                return f(value, key, context);
            }
        }
        self.state.borrow_mut().context_stack.push(context.clone());
        self.state.borrow_mut().key_stack.push(key.clone());
        let result = self.eval(fn_ref);
        self.state.borrow_mut().context_stack.pop();
        self.state.borrow_mut().key_stack.pop();
        result
    }

    fn combinator_fn_name(&self, fn_ref: PackedRef) -> Result<String> {
        match unpack(fn_ref) {
            Unpacked::Primitive(index) => match self.data.primitives.get(index as usize) {
                Some(PrimitiveValue::Str(s)) => Ok(s.clone()),
                _ => Err(RuntimeError::TypeError { context: "combinator function", expected: "string", actual: "other" }),
            },
            _ => Err(RuntimeError::TypeError { context: "combinator function", expected: "string", actual: "other" }),
        }
    }

    fn eval_keys(&self, args: &[PackedRef]) -> Result<Value> {
        match self.eval(args[0])? {
            Value::Object(map) => Ok(Value::Array(map.keys().map(|k| Value::String(k.clone())).collect())),
            Value::Array(items) => Ok(Value::Array((0..items.len()).map(|i| Value::String(i.to_string())).collect())),
            other => Err(type_error("keys", "object or array", &other)),
        }
    }

    fn eval_values(&self, args: &[PackedRef]) -> Result<Value> {
        match self.eval(args[0])? {
            Value::Object(map) => Ok(Value::Array(map.values().cloned().collect())),
            Value::Array(items) => Ok(Value::Array(items)),
            other => Err(type_error("values", "object or array", &other)),
        }
    }

    fn eval_assign(&self, args: &[PackedRef]) -> Result<Value> {
        let mut out = Map::new();
        for &a in args {
            let object = self.eval(a)?;
            let Value::Object(map) = object else {
                return Err(type_error("assign", "object", &object));
            };
            out.extend(map);
        }
        Ok(Value::Object(out))
    }

    fn eval_defaults(&self, args: &[PackedRef]) -> Result<Value> {
        let mut out = Map::new();
        for &a in args.iter().rev() {
            let object = self.eval(a)?;
            let Value::Object(map) = object else {
                return Err(type_error("defaults", "object", &object));
            };
            out.extend(map);
        }
        Ok(Value::Object(out))
    }

    fn eval_size(&self, args: &[PackedRef]) -> Result<Value> {
        match self.eval(args[0])? {
            Value::Object(map) => Ok(Value::from(map.len())),
            Value::Array(items) => Ok(Value::from(items.len())),
            other => Err(type_error("size", "object or array", &other)),
        }
    }

    fn eval_sum(&self, args: &[PackedRef]) -> Result<Value> {
        let checks = self.options.checks_types();
        let Value::Array(items) = self.eval(args[0])? else {
            return Err(type_error("sum", "array", &self.eval(args[0])?));
        };
        let mut total = 0.0;
        for item in &items {
            total += as_number("sum", checks, item)?;
        }
        Ok(Value::from(total))
    }

    fn eval_flatten(&self, args: &[PackedRef]) -> Result<Value> {
        let Value::Array(items) = self.eval(args[0])? else {
            return Err(type_error("flatten", "array", &self.eval(args[0])?));
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Array(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        Ok(Value::Array(out))
    }
}

fn arith_op_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Add => "add",
        Kind::Sub => "sub",
        Kind::Mul => "mul",
        Kind::Div => "div",
        Kind::Mod => "mod",
        _ => "arith",
    }
}

fn compare_op_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Lt => "lt",
        Kind::Lte => "lte",
        Kind::Gt => "gt",
        Kind::Gte => "gte",
        _ => "compare",
    }
}

#[cfg(test)]
#[path = "eval_tests.rs"]
mod eval_tests;
