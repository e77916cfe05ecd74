//! The filter framework: the init/proc/fini contract, the registry of
//! named implementations, and the resolved, runnable filter instance.

use std::collections::HashMap;

use crate::error::{ConfigError, RuntimeError};
use crate::value::{Parameter, ParameterSpec, Value, ValueKind};

/// Whether an endpoint carries a per-tick sample stream or a single
/// computed value. Purely descriptive in this implementation; both
/// kinds occupy an ordinary pipeline slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    /// A value that changes on (and is meaningful at) every tick.
    Stream,
    /// A value computed once and read as a scalar.
    Value,
}

/// One named input or output port on a filter spec.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSpec {
    /// Endpoint name, unique within its direction on a given filter.
    pub name: String,
    /// Stream vs value role.
    pub role: EndpointRole,
}

impl EndpointSpec {
    /// Construct a stream-role endpoint, the role every built-in filter uses.
    pub fn stream(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: EndpointRole::Stream,
        }
    }
}

/// An immutable, shared library entry: a filter's name, its endpoint
/// shape, and its parameter surface.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    /// Filter name, unique within the registry.
    pub name: String,
    /// Declared input endpoints, in declaration order.
    pub inputs: Vec<EndpointSpec>,
    /// Declared output endpoints, in declaration order.
    pub outputs: Vec<EndpointSpec>,
    /// Declared parameters, in declaration order.
    pub parameters: Vec<ParameterSpec>,
}

/// Per-instance state and stepping logic for one filter implementation.
///
/// This is the private-state half of the init/proc/fini contract: the
/// framework constructs one of these in `init` and calls `proc` once
/// per tick. `fini` is simply this value's `Drop`.
pub trait FilterState: Send {
    /// Read `inputs` (in spec-declared input order), write `outputs`
    /// (in spec-declared output order). Must not allocate, must be
    /// deterministic given the same inputs and prior state.
    fn proc(&mut self, inputs: &[Value], outputs: &mut [Value]) -> Result<(), RuntimeError>;
}

/// The name-to-implementation half of the init/proc/fini contract.
///
/// A `FilterFactory` is stateless and shared; `init` validates
/// parameters against the spec and produces the per-instance
/// [`FilterState`].
pub trait FilterFactory: Send + Sync {
    /// The immutable spec this factory implements.
    fn spec(&self) -> &FilterSpec;

    /// Validate `params` against `self.spec().parameters` and construct
    /// fresh private state for one instantiation.
    fn init(&self, params: &[Parameter], frequency: f64) -> Result<Box<dyn FilterState>, ConfigError>;
}

/// Validate that `params` supplies exactly the parameters `spec` declares,
/// each with the right kind. Built-in filters call this at the top of
/// `init` so a malformed spec fails with a specific, named error instead
/// of a confusing type error deeper in the filter's own logic.
pub fn validate_parameters(spec: &FilterSpec, params: &[Parameter]) -> Result<(), ConfigError> {
    for decl in &spec.parameters {
        let bound = params
            .iter()
            .find(|p| p.name == decl.name)
            .ok_or_else(|| ConfigError::MissingParameter {
                name: decl.name.clone(),
            })?;
        if bound.value.kind() != decl.kind {
            return Err(ConfigError::ParameterKindMismatch {
                name: decl.name.clone(),
                expected: decl.kind,
                actual: bound.value.kind(),
            });
        }
    }
    Ok(())
}

fn typed_param(params: &[Parameter], name: &str, kind: ValueKind) -> Result<Value, ConfigError> {
    crate::value::lookup(params, name, kind).copied()
}

/// Look up a `double`-kinded parameter by name.
pub fn double_param(params: &[Parameter], name: &str) -> Result<f64, ConfigError> {
    typed_param(params, name, ValueKind::Double)?.as_double()
}

/// Look up a `bool`-kinded parameter by name.
pub fn bool_param(params: &[Parameter], name: &str) -> Result<bool, ConfigError> {
    typed_param(params, name, ValueKind::Bool)?.as_bool()
}

/// Lifecycle of a [`FilterInstance`], tracked for assertion and debug
/// purposes only — `proc` asserts it is never called before `init` or
/// after `fini`, mirroring the reference device's module lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterLifecycle {
    /// Constructed but never stepped.
    Created,
    /// `init` has produced private state; not yet stepped.
    Initialized,
    /// At least one `proc` call has completed.
    Running,
    /// Dropped; state is gone. Never observed on a live instance.
    Finalized,
}

/// A resolved, runnable filter: the spec-shaped slot wiring plus the
/// opaque private state, ready to be stepped once per tick.
pub struct FilterInstance {
    /// The instantiation label from the pipeline definition, kept for
    /// diagnostics (FIFO overflow assertions name the offending filter).
    pub label: String,
    /// Slot indices this instance reads from, in spec input order.
    pub input_slots: Vec<usize>,
    /// Slot indices this instance writes to, in spec output order.
    pub output_slots: Vec<usize>,
    input_scratch: Vec<Value>,
    output_scratch: Vec<Value>,
    state: Box<dyn FilterState>,
    lifecycle: FilterLifecycle,
}

impl FilterInstance {
    /// Wrap resolved slot arrays and constructed state into a runnable
    /// instance. Scratch buffers are allocated once here; `proc` never
    /// grows them.
    pub fn new(
        label: String,
        input_slots: Vec<usize>,
        output_slots: Vec<usize>,
        state: Box<dyn FilterState>,
    ) -> Self {
        let input_scratch = vec![Value::Unsigned(0); input_slots.len()];
        let output_scratch = vec![Value::Unsigned(0); output_slots.len()];
        Self {
            label,
            input_slots,
            output_slots,
            input_scratch,
            output_scratch,
            state,
            lifecycle: FilterLifecycle::Initialized,
        }
    }

    /// The instance's current lifecycle state.
    pub fn lifecycle(&self) -> FilterLifecycle {
        self.lifecycle
    }

    /// Gather inputs from `values`, step the filter, scatter outputs
    /// back into `values`. Called once per tick, in resolver-fixed
    /// execution order.
    pub fn proc(&mut self, values: &mut [Value]) -> Result<(), RuntimeError> {
        debug_assert_ne!(
            self.lifecycle,
            FilterLifecycle::Finalized,
            "proc called on a finalized filter instance"
        );
        for (slot_idx, slot) in self.input_slots.iter().enumerate() {
            self.input_scratch[slot_idx] = values[*slot];
        }
        self.state.proc(&self.input_scratch, &mut self.output_scratch)?;
        for (slot_idx, slot) in self.output_slots.iter().enumerate() {
            values[*slot] = self.output_scratch[slot_idx];
        }
        self.lifecycle = FilterLifecycle::Running;
        Ok(())
    }
}

impl Drop for FilterInstance {
    fn drop(&mut self) {
        self.lifecycle = FilterLifecycle::Finalized;
    }
}

/// Name -> implementation table. Immutable after process start.
pub struct FilterRegistry {
    factories: HashMap<String, Box<dyn FilterFactory>>,
}

impl FilterRegistry {
    /// An empty registry with no filters registered.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry pre-populated with the built-in `Average` and
    /// `Derivative` filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::filters::average::AverageFactory));
        registry.register(Box::new(crate::filters::derivative::DerivativeFactory));
        registry
    }

    /// Register `factory` under its spec's name, overwriting any prior
    /// registration with the same name.
    pub fn register(&mut self, factory: Box<dyn FilterFactory>) {
        self.factories
            .insert(factory.spec().name.clone(), factory);
    }

    /// Look up a factory by filter name.
    pub fn get(&self, name: &str) -> Option<&dyn FilterFactory> {
        self.factories.get(name).map(|b| b.as_ref())
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
