//! The runtime instance (§4.6, §6 "Runtime instance surface").
//!
//! Evaluation state sits behind `RefCell`s rather than requiring `&mut
//! self`: combinator callbacks (`combinators::map`, etc.) are plain `Fn`
//! closures that capture `&Instance`, and recursive projection evaluation
//! needs to re-enter the cache and the context/key stacks from inside those
//! closures. Listener/batch bookkeeping follows the same shape for
//! consistency, even though nothing there is ever called reentrantly.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use carmi_compiler::{PrimitiveValue, ProjectionData};
use carmi_core::{Unpacked, unpack};
use serde_json::Value;

use crate::error::{Result, RuntimeError};
use crate::funclib::FuncLib;
use crate::options::VmOptions;

pub type Listener = Arc<dyn Fn() + Send + Sync>;
pub type BatchingStrategy = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct EvalState {
    pub(crate) model: Value,
    pub(crate) values: Vec<Option<Value>>,
    pub(crate) context_stack: Vec<Value>,
    pub(crate) key_stack: Vec<Value>,
    pub(crate) arg_stack: Vec<Value>,
}

/// A queued setter call, replayed in FIFO order when a batch drains (§4.6
/// "Batching").
pub(crate) struct PendingSetter {
    pub(crate) setter_index: u32,
    pub(crate) args: Vec<Value>,
}

/// A live, stateful projection of a compiled program over one model (§6).
pub struct Instance {
    pub(crate) data: Arc<ProjectionData>,
    pub(crate) options: VmOptions,
    pub(crate) func_lib: FuncLib,
    pub(crate) state: RefCell<EvalState>,
    pub(crate) exported: RefCell<HashMap<String, Value>>,
    pub(crate) top_level_by_name: HashMap<String, u32>,
    pub(crate) setters_by_name: HashMap<String, u32>,
    pub(crate) touched_locations: RefCell<Vec<Vec<Value>>>,
    pub(crate) listeners: RefCell<Vec<(u64, Listener)>>,
    next_listener_id: Cell<u64>,
    pub(crate) in_batch: Cell<bool>,
    pub(crate) in_recalculate: Cell<bool>,
    pub(crate) batch_pending: RefCell<VecDeque<PendingSetter>>,
    pub(crate) batching_strategy: RefCell<Option<BatchingStrategy>>,
    settled_once: Cell<bool>,
}

impl Instance {
    /// Construct a fresh instance and run the initial settle so every
    /// top-level field is populated before the caller observes it (§4.6
    /// "Recalculation loop", Scenario A "initial settle").
    pub fn new(
        projection_data: Arc<ProjectionData>,
        model: Value,
        func_lib: Option<FuncLib>,
        options: VmOptions,
    ) -> Result<Self> {
        let mut top_level_by_name = HashMap::new();
        for (index, &name_ref) in projection_data.top_level_names.iter().enumerate() {
            if name_ref < 0 {
                continue;
            }
            let name = primitive_string(&projection_data, name_ref as u32)?;
            top_level_by_name.insert(name, index as u32);
        }

        let mut setters_by_name = HashMap::new();
        for (index, setter) in projection_data.setters.iter().enumerate() {
            let Unpacked::Primitive(name_index) = unpack(setter.name_ref) else {
                continue;
            };
            let name = primitive_string(&projection_data, name_index)?;
            setters_by_name.insert(name, index as u32);
        }

        let values = vec![None; projection_data.getters.len()];
        let instance = Self {
            data: projection_data,
            options,
            func_lib: func_lib.unwrap_or_default(),
            state: RefCell::new(EvalState {
                model,
                values,
                context_stack: Vec::new(),
                key_stack: Vec::new(),
                arg_stack: Vec::new(),
            }),
            exported: RefCell::new(HashMap::new()),
            top_level_by_name,
            setters_by_name,
            touched_locations: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            next_listener_id: Cell::new(0),
            in_batch: Cell::new(false),
            in_recalculate: Cell::new(false),
            batch_pending: RefCell::new(VecDeque::new()),
            batching_strategy: RefCell::new(None),
            settled_once: Cell::new(false),
        };
        instance.recalculate()?;
        Ok(instance)
    }

    /// Current value of a named top-level projection (§6). Returns an owned
    /// clone rather than `&Value`: the cache lives behind a `RefCell` so
    /// combinator callbacks can re-enter it.
    pub fn get(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.exported.borrow().get(name) {
            return Ok(value.clone());
        }
        let &index = self
            .top_level_by_name
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownTopLevel { name: name.to_string() })?;
        let r = self.data.top_level_projections[index as usize];
        self.eval(r)
    }

    pub fn add_listener(&self, listener: Listener) -> u64 {
        let id = self.next_listener_id.get();
        self.next_listener_id.set(id + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: u64) {
        self.listeners.borrow_mut().retain(|(entry_id, _)| *entry_id != id);
    }

    pub fn set_batching_strategy(&self, strategy: Option<BatchingStrategy>) {
        *self.batching_strategy.borrow_mut() = strategy;
    }

    /// `$startBatch` (§4.6, §4.7).
    pub fn start_batch(&self) {
        self.in_batch.set(true);
    }

    /// `$endBatch` (§4.6, §4.7): drains `batchPending` in FIFO order, then
    /// recomputes once.
    pub fn end_batch(&self) -> Result<()> {
        self.in_batch.set(false);
        self.drain_batch_pending()?;
        self.recalculate()
    }

    /// `$runInBatch(f)`, the scoped form of `start_batch`/`end_batch`.
    pub fn run_in_batch(&self, f: impl FnOnce(&Instance)) -> Result<()> {
        self.start_batch();
        f(self);
        self.end_batch()
    }

    /// Debug-mode embedded AST (§6 `$ast`); `None` outside debug mode.
    pub fn ast(&self) -> Option<&[String]> {
        self.options.debug.then(|| self.data.sources.as_slice())
    }

    /// `$source` (§6): reserved, always `None`.
    pub fn source(&self) -> Option<&str> {
        None
    }

    pub(crate) fn drain_batch_pending(&self) -> Result<()> {
        loop {
            let next = self.batch_pending.borrow_mut().pop_front();
            let Some(pending) = next else { break };
            self.apply_setter_call(pending.setter_index, &pending.args)?;
        }
        Ok(())
    }
}

pub(crate) fn primitive_string(data: &ProjectionData, index: u32) -> Result<String> {
    match data.primitives.get(index as usize) {
        Some(PrimitiveValue::Str(s)) => Ok(s.clone()),
        _ => Err(RuntimeError::Core(carmi_core::Error::IntegrityError {
            table: "primitives",
            hash: index as u64,
        })),
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod instance_tests;
