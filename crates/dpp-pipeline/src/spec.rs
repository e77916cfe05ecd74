//! The declarative configuration: filter library, pipeline definitions,
//! and setups (§6). These types are plain `serde`-derived structs; the
//! actual YAML parsing is an external loader's job (non-goal), so this
//! module only defines the shape it must produce.

use serde::{Deserialize, Serialize};

use crate::color::ColorSpec;
use crate::value::{Parameter, ValueKind};

/// A library-wide filter declaration: name, endpoint shape, and
/// parameter surface. Immutable and shared across every pipeline that
/// references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterLibraryEntry {
    /// Filter name, unique within the library and matched against the
    /// [`crate::filter::FilterRegistry`].
    pub name: String,
    /// Declared input endpoint names.
    pub inputs: Vec<String>,
    /// Declared output endpoint names.
    pub outputs: Vec<String>,
}

/// One filter instantiation inside a pipeline definition: a label unique
/// within the pipeline, the library filter it instantiates, and its
/// bound parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterInstantiation {
    /// Label used by stages to refer to this instantiation.
    pub label: String,
    /// Name of the library filter this instantiates.
    pub filter: String,
    /// Bound parameters, validated against the filter's spec at
    /// resolve time.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// One endpoint of a stage edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    /// A raw acquisition channel, identified by its context-local label.
    Channel {
        /// Context-local channel label.
        label: String,
    },
    /// A named endpoint on a filter instantiation.
    Filter {
        /// The filter instantiation's label.
        label: String,
        /// The endpoint name on that filter's spec.
        endpoint: String,
    },
    /// A graph sink, identified by its context-local label.
    Graph {
        /// Context-local graph label.
        label: String,
    },
}

/// One wiring edge in a pipeline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Source node. Never a `Graph` — graphs are sinks only.
    pub from: Node,
    /// Destination node. May be any variant.
    pub to: Node,
}

/// A named graph of filter instantiations and wiring stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDef {
    /// Pipeline name, referenced by contexts.
    pub name: String,
    /// Filter instantiations used by this pipeline's stages.
    pub filters: Vec<FilterInstantiation>,
    /// Wiring edges.
    pub stages: Vec<Stage>,
}

/// One graph sink binding within a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphBinding {
    /// Context-local label, matched against `Node::Graph` in stages.
    pub label: String,
    /// Human-readable name shown in the UI.
    pub display_name: String,
    /// Display colour.
    pub color: ColorSpec,
}

/// One raw-channel binding within a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBinding {
    /// Context-local label, matched against `Node::Channel` in stages.
    pub label: String,
    /// Concrete acquisition channel index.
    pub channel_index: u8,
}

/// Binds a pipeline to concrete acquisition channels and graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Name of the [`PipelineDef`] this context instantiates.
    pub pipeline: String,
    /// Channel label bindings.
    pub channels: Vec<ChannelBinding>,
    /// Graph label bindings.
    pub graphs: Vec<GraphBinding>,
}

/// Continuous vs LED-multiplexed flash acquisition, selected per setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmissionMode {
    /// All enabled sources sample simultaneously.
    Continuous,
    /// LED-multiplexed; the channel mask indexes LEDs instead of sources.
    Flash,
}

/// The user-selectable top-level entity: a pipeline's emission mode and
/// its bound contexts. Fully determines the executed DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    /// Setup name, shown to the user.
    pub name: String,
    /// Continuous vs flash emission.
    pub emission_mode: EmissionMode,
    /// Contexts making up this setup.
    pub contexts: Vec<Context>,
}

/// The full declarative spec: filter library, pipeline definitions, and
/// setups, as loaded from a configuration file by an external loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DppSpec {
    /// Library of filter declarations.
    pub filters: Vec<FilterLibraryEntry>,
    /// Pipeline definitions, referenced by contexts.
    pub pipelines: Vec<PipelineDef>,
    /// Selectable setups.
    pub setup: Vec<Setup>,
}

impl DppSpec {
    /// Look up a filter library entry by name.
    pub fn find_filter(&self, name: &str) -> Option<&FilterLibraryEntry> {
        self.filters.iter().find(|f| f.name == name)
    }

    /// Look up a pipeline definition by name.
    pub fn find_pipeline(&self, name: &str) -> Option<&PipelineDef> {
        self.pipelines.iter().find(|p| p.name == name)
    }
}

/// Value kind tag used only in the declarative text form (`bool`,
/// `double`, `unsigned`); the [`ValueKind`] type this mirrors is the
/// runtime representation.
pub fn value_kind_name(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Bool => "bool",
        ValueKind::Double => "double",
        ValueKind::Unsigned => "unsigned",
    }
}
