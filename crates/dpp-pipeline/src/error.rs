//! Configuration and runtime errors for the filter framework, resolver,
//! and engine.

use thiserror::Error;

use crate::value::ValueKind;

/// Errors surfaced while resolving a declarative pipeline spec into a
/// flat execution plan. All of these abort `start()` and leave the
/// caller in `Idle`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A pipeline referenced a filter library entry that does not exist.
    #[error("unknown filter in library: {name}")]
    UnknownFilter {
        /// The unresolved filter spec name.
        name: String,
    },

    /// A setup referenced a pipeline that does not exist.
    #[error("unknown pipeline: {name}")]
    UnknownPipeline {
        /// The unresolved pipeline name.
        name: String,
    },

    /// A stage referenced a filter-endpoint node whose label has no
    /// matching instantiation in the pipeline.
    #[error("unknown filter instantiation referenced by label: {label}")]
    UnknownFilterLabel {
        /// The unresolved label.
        label: String,
    },

    /// A stage referenced a filter endpoint name the filter's spec does
    /// not declare.
    #[error("filter {label} has no {endpoint_kind} endpoint named {endpoint}")]
    UnresolvedEndpoint {
        /// The filter instantiation's label.
        label: String,
        /// `"input"` or `"output"`.
        endpoint_kind: &'static str,
        /// The endpoint name that was not found.
        endpoint: String,
    },

    /// A stage referenced a channel label no context binding declares.
    #[error("unresolved channel label: {label}")]
    UnresolvedChannel {
        /// The unresolved label.
        label: String,
    },

    /// A stage referenced a graph label no context binding declares.
    #[error("unresolved graph label: {label}")]
    UnresolvedGraph {
        /// The unresolved label.
        label: String,
    },

    /// An endpoint was wired by more than one stage.
    #[error("filter {label} endpoint {endpoint} is wired more than once")]
    DuplicateWiring {
        /// The filter instantiation's label.
        label: String,
        /// The endpoint name wired twice.
        endpoint: String,
    },

    /// A stage's `from` node was a graph, which is a sink-only variant.
    #[error("graph {label} used as a stage source; graphs are sinks only")]
    GraphAsSource {
        /// The offending graph label.
        label: String,
    },

    /// After the wiring sweep, some filter endpoint was never set —
    /// this also catches back-edges, since an edge into an unset input
    /// can only come from a producer that has not run yet.
    #[error("filter {label} {endpoint_kind} endpoint {endpoint} was never wired")]
    UnwiredEndpoint {
        /// The filter instantiation's label.
        label: String,
        /// `"input"` or `"output"`.
        endpoint_kind: &'static str,
        /// The endpoint name left unset.
        endpoint: String,
    },

    /// A parameter required by a filter's spec was not supplied.
    #[error("missing parameter: {name}")]
    MissingParameter {
        /// The missing parameter's name.
        name: String,
    },

    /// A parameter was supplied with the wrong value kind.
    #[error("parameter {name} expected kind {expected}, got {actual}")]
    ParameterKindMismatch {
        /// The parameter's name.
        name: String,
        /// The kind its spec declares.
        expected: ValueKind,
        /// The kind actually bound.
        actual: ValueKind,
    },

    /// A `Value` was read through the wrong accessor.
    #[error("value kind mismatch: expected {expected}, got {actual}")]
    ValueKindMismatch {
        /// The kind the caller expected.
        expected: ValueKind,
        /// The kind actually stored.
        actual: ValueKind,
    },

    /// A filter's `init` rejected its wiring or parameters for a reason
    /// specific to that filter (e.g. a non-positive window size).
    #[error("filter {label} failed to initialize: {reason}")]
    FilterInit {
        /// The filter instantiation's label.
        label: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A filter's input is wired from a filter output that has not been
    /// instantiated yet in first-encounter order — the stage graph
    /// contains a back-edge.
    #[error(
        "back-edge: {consumer_label}'s input {input_endpoint} is wired from {producer_label}, \
         which is not instantiated before it"
    )]
    BackEdge {
        /// The filter instantiation whose input is mis-wired.
        consumer_label: String,
        /// The input endpoint name.
        input_endpoint: String,
        /// The filter instantiation that would need to run first.
        producer_label: String,
    },
}

/// Per-sample assertion failures. These indicate a programming error
/// (an invariant the resolver was supposed to guarantee did not hold)
/// and are fatal to the controller per §7.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// A filter's FIFO was asked to hold more samples than its
    /// resolver-assigned capacity. Sizing is derived from the
    /// acquisition frequency at `init` time; this must not occur.
    #[error("FIFO overflow in filter {label}: capacity {capacity} exceeded")]
    FifoOverflow {
        /// The filter instantiation's label.
        label: String,
        /// The FIFO's fixed capacity.
        capacity: usize,
    },

    /// A filter's FIFO was read while empty.
    #[error("FIFO underflow in filter {label}")]
    FifoUnderflow {
        /// The filter instantiation's label.
        label: String,
    },
}
