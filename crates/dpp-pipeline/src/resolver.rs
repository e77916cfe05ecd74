//! The pipeline resolver: turns a [`DppSpec`]'s declarative filters,
//! pipelines, and setup into a flat, per-tick-runnable execution plan
//! (§4.3). Resolution is a pure function of its inputs — no I/O, no
//! mutable global state — so resolving the same setup twice produces
//! byte-for-byte identical slot assignments and instantiation order.

use std::collections::HashMap;

use crate::color::Rgb;
use crate::error::ConfigError;
use crate::filter::{FilterInstance, FilterRegistry};
use crate::spec::{Context, DppSpec, Node, PipelineDef, Setup, Stage};
use crate::value::Parameter;

/// Where a slot's value comes from. Kept only for diagnostics; the
/// engine itself just indexes a flat `Vec<Value>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    /// A raw acquisition channel, identified by its device-level index.
    Channel {
        /// The device channel index this slot mirrors.
        channel_index: u8,
    },
    /// A filter instantiation's output endpoint.
    FilterOutput {
        /// Index of the owning context within the setup.
        context_index: usize,
        /// The filter instantiation's label within that context.
        label: String,
        /// The output endpoint name.
        endpoint: String,
    },
}

/// A graph sink: a resolved slot paired with the display metadata a
/// context's `GraphBinding` declared for it.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSink {
    /// Index of the owning context within the setup.
    pub context_index: usize,
    /// Context-local graph label.
    pub label: String,
    /// Human-readable name for display.
    pub display_name: String,
    /// Resolved display colour.
    pub color: Rgb,
    /// The slot this sink reads every tick.
    pub slot: usize,
}

/// The flat execution plan a [`crate::engine::Engine`] runs.
pub struct ResolvedPipeline {
    /// Total number of slots; the engine's value table has this length.
    pub slot_count: usize,
    /// Origin of every slot, indexed by slot number. Diagnostic only.
    pub slot_table: Vec<Origin>,
    /// Device channel index -> slot, for writing in fresh raw samples
    /// each tick.
    pub channel_slots: HashMap<u8, usize>,
    /// Runnable filter instances, in resolver-fixed execution order.
    pub filters: Vec<FilterInstance>,
    /// Graph sinks, in the order their wiring stage was encountered.
    pub graph_sinks: Vec<GraphSink>,
}

/// Bookkeeping for one filter instantiation while it is being wired.
/// Promoted to a [`FilterInstance`] in the final instantiation pass.
struct FilterTable {
    context_index: usize,
    label: String,
    library_name: String,
    input_names: Vec<String>,
    output_names: Vec<String>,
    input_slots: Vec<Option<usize>>,
    output_slots: Vec<Option<usize>>,
    parameters: Vec<Parameter>,
}

/// Resolve `setup` against `spec` into a flat plan, instantiating
/// filters via `registry` at `frequency` Hz. On the first error,
/// resolution stops and any filters already constructed are dropped —
/// there is nothing partially built left to tear down by hand.
pub fn resolve(
    spec: &DppSpec,
    setup: &Setup,
    frequency: f64,
    registry: &FilterRegistry,
) -> Result<ResolvedPipeline, ConfigError> {
    let mut slot_table: Vec<Origin> = Vec::new();
    let mut channel_slots: HashMap<u8, usize> = HashMap::new();

    // Pass 1: channel scan. Every distinct device channel referenced by
    // any context's bindings gets exactly one slot, regardless of how
    // many context-local labels point at it.
    for context in &setup.contexts {
        for binding in &context.channels {
            channel_slots.entry(binding.channel_index).or_insert_with(|| {
                let slot = slot_table.len();
                slot_table.push(Origin::Channel {
                    channel_index: binding.channel_index,
                });
                slot
            });
        }
    }

    let mut tables: Vec<FilterTable> = Vec::new();
    let mut table_index: HashMap<(usize, String), usize> = HashMap::new();
    let mut slot_producer: HashMap<usize, usize> = HashMap::new();
    let mut graph_stages: Vec<(usize, usize, String)> = Vec::new();

    // Pass 2: filter scan. Walk every context's pipeline's stages in
    // declaration order, interning filter output slots on first
    // reference and wiring filter inputs as they're encountered.
    for (context_index, context) in setup.contexts.iter().enumerate() {
        let pipeline = spec
            .find_pipeline(&context.pipeline)
            .ok_or_else(|| ConfigError::UnknownPipeline {
                name: context.pipeline.clone(),
            })?;

        for stage in &pipeline.stages {
            let from_slot = resolve_from(
                spec,
                context_index,
                context,
                pipeline,
                &stage.from,
                &channel_slots,
                &mut tables,
                &mut table_index,
                &mut slot_table,
                &mut slot_producer,
                registry,
            )?;

            match &stage.to {
                Node::Filter { label, endpoint } => {
                    let consumer_index = get_or_create_table(
                        spec,
                        context_index,
                        pipeline,
                        label,
                        &mut tables,
                        &mut table_index,
                        registry,
                    )?;
                    if let Some(&producer_index) = slot_producer.get(&from_slot) {
                        if producer_index >= consumer_index {
                            return Err(ConfigError::BackEdge {
                                consumer_label: label.clone(),
                                input_endpoint: endpoint.clone(),
                                producer_label: tables[producer_index].label.clone(),
                            });
                        }
                    }
                    let table = &mut tables[consumer_index];
                    let pos = table
                        .input_names
                        .iter()
                        .position(|n| n == endpoint)
                        .ok_or_else(|| ConfigError::UnresolvedEndpoint {
                            label: label.clone(),
                            endpoint_kind: "input",
                            endpoint: endpoint.clone(),
                        })?;
                    if table.input_slots[pos].is_some() {
                        return Err(ConfigError::DuplicateWiring {
                            label: label.clone(),
                            endpoint: endpoint.clone(),
                        });
                    }
                    table.input_slots[pos] = Some(from_slot);
                }
                Node::Graph { label } => {
                    graph_stages.push((context_index, from_slot, label.clone()));
                }
                Node::Channel { .. } => {
                    // Writing into a raw channel is not a meaningful
                    // operation; channel slots are already fixed by
                    // pass 1, so there is nothing further to resolve.
                }
            }
        }
    }

    // Every declared endpoint of every filter instantiation we touched
    // must have been set by some stage.
    for table in &tables {
        for (pos, slot) in table.input_slots.iter().enumerate() {
            if slot.is_none() {
                return Err(ConfigError::UnwiredEndpoint {
                    label: table.label.clone(),
                    endpoint_kind: "input",
                    endpoint: table.input_names[pos].clone(),
                });
            }
        }
        for (pos, slot) in table.output_slots.iter().enumerate() {
            if slot.is_none() {
                return Err(ConfigError::UnwiredEndpoint {
                    label: table.label.clone(),
                    endpoint_kind: "output",
                    endpoint: table.output_names[pos].clone(),
                });
            }
        }
    }

    // Pass 3: graph scan. Every stage that targeted a graph node is now
    // resolvable to a sink with display metadata from the owning
    // context's graph binding.
    let mut graph_sinks = Vec::with_capacity(graph_stages.len());
    for (context_index, slot, label) in graph_stages {
        let context = &setup.contexts[context_index];
        let binding = context
            .graphs
            .iter()
            .find(|g| g.label == label)
            .ok_or_else(|| ConfigError::UnresolvedGraph {
                label: label.clone(),
            })?;
        graph_sinks.push(GraphSink {
            context_index,
            label,
            display_name: binding.display_name.clone(),
            color: binding.color.to_rgb(),
            slot,
        });
    }

    // Pass 4: instantiation, in first-encounter order (the same order
    // `tables` was populated in, since that only ever grows by append).
    let mut filters = Vec::with_capacity(tables.len());
    for table in tables {
        let factory = registry
            .get(&table.library_name)
            .ok_or_else(|| ConfigError::UnknownFilter {
                name: table.library_name.clone(),
            })?;
        let input_slots: Vec<usize> = table
            .input_slots
            .into_iter()
            .map(|s| s.expect("validated above: every input was set"))
            .collect();
        let output_slots: Vec<usize> = table
            .output_slots
            .into_iter()
            .map(|s| s.expect("validated above: every output was set"))
            .collect();
        let state = factory
            .init(&table.parameters, frequency)
            .map_err(|err| ConfigError::FilterInit {
                label: table.label.clone(),
                reason: err.to_string(),
            })?;
        filters.push(FilterInstance::new(
            table.label,
            input_slots,
            output_slots,
            state,
        ));
    }

    Ok(ResolvedPipeline {
        slot_count: slot_table.len(),
        slot_table,
        channel_slots,
        filters,
        graph_sinks,
    })
}

/// Resolve a stage's `from` node to a slot index, interning a fresh
/// slot for a filter output endpoint the first time it is referenced.
#[allow(clippy::too_many_arguments)]
fn resolve_from(
    spec: &DppSpec,
    context_index: usize,
    context: &Context,
    pipeline: &PipelineDef,
    node: &Node,
    channel_slots: &HashMap<u8, usize>,
    tables: &mut Vec<FilterTable>,
    table_index: &mut HashMap<(usize, String), usize>,
    slot_table: &mut Vec<Origin>,
    slot_producer: &mut HashMap<usize, usize>,
    registry: &FilterRegistry,
) -> Result<usize, ConfigError> {
    match node {
        Node::Graph { label } => Err(ConfigError::GraphAsSource {
            label: label.clone(),
        }),
        Node::Channel { label } => {
            let binding = context
                .channels
                .iter()
                .find(|c| &c.label == label)
                .ok_or_else(|| ConfigError::UnresolvedChannel {
                    label: label.clone(),
                })?;
            Ok(*channel_slots
                .get(&binding.channel_index)
                .expect("pass 1 interned every channel binding's device index"))
        }
        Node::Filter { label, endpoint } => {
            let idx = get_or_create_table(
                spec,
                context_index,
                pipeline,
                label,
                tables,
                table_index,
                registry,
            )?;
            let pos = tables[idx]
                .output_names
                .iter()
                .position(|n| n == endpoint)
                .ok_or_else(|| ConfigError::UnresolvedEndpoint {
                    label: label.clone(),
                    endpoint_kind: "output",
                    endpoint: endpoint.clone(),
                })?;
            if let Some(slot) = tables[idx].output_slots[pos] {
                return Ok(slot);
            }
            let slot = slot_table.len();
            slot_table.push(Origin::FilterOutput {
                context_index,
                label: label.clone(),
                endpoint: endpoint.clone(),
            });
            tables[idx].output_slots[pos] = Some(slot);
            slot_producer.insert(slot, idx);
            Ok(slot)
        }
    }
}

/// Look up the [`FilterTable`] for `(context_index, label)`, creating
/// it from the pipeline's instantiation list and the filter library on
/// first reference. This is the moment a filter instantiation is
/// considered "first encountered" for execution-order purposes.
fn get_or_create_table(
    spec: &DppSpec,
    context_index: usize,
    pipeline: &PipelineDef,
    label: &str,
    tables: &mut Vec<FilterTable>,
    table_index: &mut HashMap<(usize, String), usize>,
    registry: &FilterRegistry,
) -> Result<usize, ConfigError> {
    let key = (context_index, label.to_string());
    if let Some(&idx) = table_index.get(&key) {
        return Ok(idx);
    }

    let instantiation = pipeline
        .filters
        .iter()
        .find(|f| f.label == label)
        .ok_or_else(|| ConfigError::UnknownFilterLabel {
            label: label.to_string(),
        })?;
    let library_entry = spec
        .find_filter(&instantiation.filter)
        .ok_or_else(|| ConfigError::UnknownFilter {
            name: instantiation.filter.clone(),
        })?;
    if registry.get(&library_entry.name).is_none() {
        return Err(ConfigError::UnknownFilter {
            name: library_entry.name.clone(),
        });
    }

    let idx = tables.len();
    tables.push(FilterTable {
        context_index,
        label: label.to_string(),
        library_name: library_entry.name.clone(),
        input_names: library_entry.inputs.clone(),
        output_names: library_entry.outputs.clone(),
        input_slots: vec![None; library_entry.inputs.len()],
        output_slots: vec![None; library_entry.outputs.len()],
        parameters: instantiation.parameters.clone(),
    });
    table_index.insert(key, idx);
    Ok(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorSpec;
    use crate::spec::{
        ChannelBinding, EmissionMode, FilterInstantiation, FilterLibraryEntry, GraphBinding,
    };

    fn channel_ctx(pipeline: &str, label: &str, index: u8, graph_label: &str) -> Context {
        Context {
            pipeline: pipeline.to_string(),
            channels: vec![ChannelBinding {
                label: label.to_string(),
                channel_index: index,
            }],
            graphs: vec![GraphBinding {
                label: graph_label.to_string(),
                display_name: "Channel".to_string(),
                color: ColorSpec::Rgb(Rgb { r: 0, g: 0, b: 0 }),
            }],
        }
    }

    #[test]
    fn passthrough_wires_channel_directly_to_graph() {
        let pipeline = PipelineDef {
            name: "passthrough".to_string(),
            filters: vec![],
            stages: vec![Stage {
                from: Node::Channel {
                    label: "chan".to_string(),
                },
                to: Node::Graph {
                    label: "graph".to_string(),
                },
            }],
        };
        let spec = DppSpec {
            filters: vec![],
            pipelines: vec![pipeline],
            setup: vec![],
        };
        let setup = Setup {
            name: "s".to_string(),
            emission_mode: EmissionMode::Continuous,
            contexts: vec![channel_ctx("passthrough", "chan", 3, "graph")],
        };
        let registry = FilterRegistry::with_builtins();
        let resolved = resolve(&spec, &setup, 100.0, &registry).expect("resolves");

        assert_eq!(resolved.slot_count, 1);
        assert_eq!(resolved.filters.len(), 0);
        assert_eq!(resolved.graph_sinks.len(), 1);
        assert_eq!(resolved.graph_sinks[0].slot, resolved.channel_slots[&3]);
    }

    #[test]
    fn derivative_chain_instantiates_one_filter_and_wires_graph() {
        let pipeline = PipelineDef {
            name: "deriv".to_string(),
            filters: vec![FilterInstantiation {
                label: "d1".to_string(),
                filter: "Derivative".to_string(),
                parameters: vec![],
            }],
            stages: vec![
                Stage {
                    from: Node::Channel {
                        label: "chan".to_string(),
                    },
                    to: Node::Filter {
                        label: "d1".to_string(),
                        endpoint: "input".to_string(),
                    },
                },
                Stage {
                    from: Node::Filter {
                        label: "d1".to_string(),
                        endpoint: "output".to_string(),
                    },
                    to: Node::Graph {
                        label: "graph".to_string(),
                    },
                },
            ],
        };
        let spec = DppSpec {
            filters: vec![FilterLibraryEntry {
                name: "Derivative".to_string(),
                inputs: vec!["input".to_string()],
                outputs: vec!["output".to_string()],
            }],
            pipelines: vec![pipeline],
            setup: vec![],
        };
        let setup = Setup {
            name: "s".to_string(),
            emission_mode: EmissionMode::Continuous,
            contexts: vec![channel_ctx("deriv", "chan", 0, "graph")],
        };
        let registry = FilterRegistry::with_builtins();
        let resolved = resolve(&spec, &setup, 100.0, &registry).expect("resolves");

        assert_eq!(resolved.slot_count, 2);
        assert_eq!(resolved.filters.len(), 1);
        assert_eq!(resolved.filters[0].input_slots, vec![0]);
        assert_eq!(resolved.filters[0].output_slots, vec![1]);
        assert_eq!(resolved.graph_sinks[0].slot, 1);
    }

    #[test]
    fn unwired_input_is_rejected() {
        let pipeline = PipelineDef {
            name: "broken".to_string(),
            filters: vec![FilterInstantiation {
                label: "d1".to_string(),
                filter: "Derivative".to_string(),
                parameters: vec![],
            }],
            stages: vec![Stage {
                from: Node::Filter {
                    label: "d1".to_string(),
                    endpoint: "output".to_string(),
                },
                to: Node::Graph {
                    label: "graph".to_string(),
                },
            }],
        };
        let spec = DppSpec {
            filters: vec![FilterLibraryEntry {
                name: "Derivative".to_string(),
                inputs: vec!["input".to_string()],
                outputs: vec!["output".to_string()],
            }],
            pipelines: vec![pipeline],
            setup: vec![],
        };
        let setup = Setup {
            name: "s".to_string(),
            emission_mode: EmissionMode::Continuous,
            contexts: vec![channel_ctx("broken", "chan", 0, "graph")],
        };
        let registry = FilterRegistry::with_builtins();
        let err = resolve(&spec, &setup, 100.0, &registry).expect_err("must reject");
        assert_eq!(
            err,
            ConfigError::UnwiredEndpoint {
                label: "d1".to_string(),
                endpoint_kind: "input",
                endpoint: "input".to_string(),
            }
        );
    }

    #[test]
    fn back_edge_is_rejected() {
        // b's input is wired from a's output, but a's input is wired
        // from b's output: whichever is encountered second creates a
        // cycle the execution order cannot satisfy.
        let pipeline = PipelineDef {
            name: "cycle".to_string(),
            filters: vec![
                FilterInstantiation {
                    label: "a".to_string(),
                    filter: "Derivative".to_string(),
                    parameters: vec![],
                },
                FilterInstantiation {
                    label: "b".to_string(),
                    filter: "Derivative".to_string(),
                    parameters: vec![],
                },
            ],
            stages: vec![
                Stage {
                    from: Node::Filter {
                        label: "a".to_string(),
                        endpoint: "output".to_string(),
                    },
                    to: Node::Filter {
                        label: "b".to_string(),
                        endpoint: "input".to_string(),
                    },
                },
                Stage {
                    from: Node::Filter {
                        label: "b".to_string(),
                        endpoint: "output".to_string(),
                    },
                    to: Node::Filter {
                        label: "a".to_string(),
                        endpoint: "input".to_string(),
                    },
                },
            ],
        };
        let spec = DppSpec {
            filters: vec![FilterLibraryEntry {
                name: "Derivative".to_string(),
                inputs: vec!["input".to_string()],
                outputs: vec!["output".to_string()],
            }],
            pipelines: vec![pipeline],
            setup: vec![],
        };
        let setup = Setup {
            name: "s".to_string(),
            emission_mode: EmissionMode::Continuous,
            contexts: vec![Context {
                pipeline: "cycle".to_string(),
                channels: vec![],
                graphs: vec![],
            }],
        };
        let registry = FilterRegistry::with_builtins();
        let err = resolve(&spec, &setup, 100.0, &registry).expect_err("must reject cycle");
        assert!(matches!(err, ConfigError::BackEdge { .. }));
    }

    #[test]
    fn resolution_is_idempotent() {
        let pipeline = PipelineDef {
            name: "deriv".to_string(),
            filters: vec![FilterInstantiation {
                label: "d1".to_string(),
                filter: "Derivative".to_string(),
                parameters: vec![],
            }],
            stages: vec![
                Stage {
                    from: Node::Channel {
                        label: "chan".to_string(),
                    },
                    to: Node::Filter {
                        label: "d1".to_string(),
                        endpoint: "input".to_string(),
                    },
                },
                Stage {
                    from: Node::Filter {
                        label: "d1".to_string(),
                        endpoint: "output".to_string(),
                    },
                    to: Node::Graph {
                        label: "graph".to_string(),
                    },
                },
            ],
        };
        let spec = DppSpec {
            filters: vec![FilterLibraryEntry {
                name: "Derivative".to_string(),
                inputs: vec!["input".to_string()],
                outputs: vec!["output".to_string()],
            }],
            pipelines: vec![pipeline],
            setup: vec![],
        };
        let setup = Setup {
            name: "s".to_string(),
            emission_mode: EmissionMode::Continuous,
            contexts: vec![channel_ctx("deriv", "chan", 0, "graph")],
        };
        let registry = FilterRegistry::with_builtins();
        let first = resolve(&spec, &setup, 100.0, &registry).expect("resolves");
        let second = resolve(&spec, &setup, 100.0, &registry).expect("resolves");
        assert_eq!(first.slot_count, second.slot_count);
        assert_eq!(first.slot_table, second.slot_table);
        assert_eq!(first.filters[0].input_slots, second.filters[0].input_slots);
        assert_eq!(
            first.filters[0].output_slots,
            second.filters[0].output_slots
        );
    }
}
