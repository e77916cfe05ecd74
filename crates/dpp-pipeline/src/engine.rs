//! The pipeline engine: steps a [`ResolvedPipeline`] once per sample
//! tick (§4.4). Purely synchronous — one `tick` call processes exactly
//! one set of fresh raw-channel samples through every filter in
//! resolver-fixed order and exposes the resulting graph sink values.

use std::collections::HashMap;

use crate::color::Rgb;
use crate::error::RuntimeError;
use crate::resolver::ResolvedPipeline;
use crate::value::{Value, ValueKind};

/// A graph sink's resolved value after a tick, paired with its display
/// metadata so a caller doesn't need to re-consult the resolved plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphSample {
    /// The sink's current value.
    pub value: Value,
    /// Display colour, resolved once at build time.
    pub color: Rgb,
}

/// A running pipeline: the flat slot table plus scratch needed to
/// drive it one tick at a time.
pub struct Engine {
    plan: ResolvedPipeline,
    values: Vec<Value>,
}

impl Engine {
    /// Wrap a resolved plan, zero-initializing every slot. Raw channel
    /// slots default to `Value::Unsigned(0)` since acquisition channels
    /// always carry unsigned samples; see [`crate::filter::FilterInstance::new`]
    /// for the analogous choice on filter scratch.
    pub fn new(plan: ResolvedPipeline) -> Self {
        let values = vec![Value::zeroed(ValueKind::Unsigned); plan.slot_count];
        Self { plan, values }
    }

    /// The number of slots in the underlying plan.
    pub fn slot_count(&self) -> usize {
        self.plan.slot_count
    }

    /// Device channel indices this plan reads raw samples for.
    pub fn channel_indices(&self) -> impl Iterator<Item = u8> + '_ {
        self.plan.channel_slots.keys().copied()
    }

    /// Step the pipeline once: write `samples` into their interned raw
    /// channel slots, then run every filter in execution order.
    ///
    /// `samples` need not cover every channel the plan knows about —
    /// channels absent this tick simply keep their previous slot value,
    /// matching the controller's "advance only on channels that
    /// produced a fresh sample this tick" assembly policy.
    pub fn tick(&mut self, samples: &HashMap<u8, u32>) -> Result<(), RuntimeError> {
        for (&channel_index, &slot) in &self.plan.channel_slots {
            if let Some(&sample) = samples.get(&channel_index) {
                self.values[slot] = Value::Unsigned(sample);
            }
        }
        for filter in &mut self.plan.filters {
            filter.proc(&mut self.values)?;
        }
        Ok(())
    }

    /// Read every graph sink's current value after a tick.
    pub fn graph_samples(&self) -> Vec<GraphSample> {
        self.plan
            .graph_sinks
            .iter()
            .map(|sink| GraphSample {
                value: self.values[sink.slot],
                color: sink.color,
            })
            .collect()
    }

    /// Read a single slot's current value, for diagnostics and tests.
    pub fn slot(&self, slot: usize) -> Value {
        self.values[slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorSpec;
    use crate::filter::FilterRegistry;
    use crate::resolver::resolve;
    use crate::spec::{
        ChannelBinding, Context, DppSpec, EmissionMode, FilterInstantiation, FilterLibraryEntry,
        GraphBinding, Node, PipelineDef, Setup, Stage,
    };

    fn build_engine(pipeline: PipelineDef, library: Vec<FilterLibraryEntry>) -> Engine {
        let spec = DppSpec {
            filters: library,
            pipelines: vec![pipeline.clone()],
            setup: vec![],
        };
        let setup = Setup {
            name: "s".to_string(),
            emission_mode: EmissionMode::Continuous,
            contexts: vec![Context {
                pipeline: pipeline.name.clone(),
                channels: vec![ChannelBinding {
                    label: "chan".to_string(),
                    channel_index: 0,
                }],
                graphs: vec![GraphBinding {
                    label: "graph".to_string(),
                    display_name: "Channel 0".to_string(),
                    color: ColorSpec::Rgb(Rgb { r: 1, g: 2, b: 3 }),
                }],
            }],
        };
        let registry = FilterRegistry::with_builtins();
        let plan = resolve(&spec, &setup, 4.0, &registry).expect("resolves");
        Engine::new(plan)
    }

    #[test]
    fn passthrough_mirrors_raw_channel() {
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
        let mut engine = build_engine(pipeline, vec![]);

        let mut samples = HashMap::new();
        samples.insert(0u8, 42u32);
        engine.tick(&samples).expect("tick");

        let sinks = engine.graph_samples();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].value, Value::Unsigned(42));
        assert_eq!(sinks[0].color, Rgb { r: 1, g: 2, b: 3 });
    }

    #[test]
    fn average_filter_tracks_spec_example_over_five_ticks() {
        let pipeline = PipelineDef {
            name: "avg".to_string(),
            filters: vec![FilterInstantiation {
                label: "a1".to_string(),
                filter: "Average".to_string(),
                parameters: vec![
                    crate::value::Parameter {
                        name: "frequency".to_string(),
                        value: Value::Double(1.0),
                    },
                    crate::value::Parameter {
                        name: "normalise".to_string(),
                        value: Value::Bool(false),
                    },
                ],
            }],
            stages: vec![
                Stage {
                    from: Node::Channel {
                        label: "chan".to_string(),
                    },
                    to: Node::Filter {
                        label: "a1".to_string(),
                        endpoint: "input".to_string(),
                    },
                },
                Stage {
                    from: Node::Filter {
                        label: "a1".to_string(),
                        endpoint: "output".to_string(),
                    },
                    to: Node::Graph {
                        label: "graph".to_string(),
                    },
                },
            ],
        };
        let library = vec![FilterLibraryEntry {
            name: "Average".to_string(),
            inputs: vec!["input".to_string()],
            outputs: vec!["output".to_string()],
        }];
        // frequency=1.0 at 4.0 Hz acquisition -> window_len = 4.
        let mut engine = build_engine(pipeline, library);

        let inputs = [4u32, 8, 12, 16, 100];
        let expected = [4u32, 6, 8, 10, 34];
        for (input, want) in inputs.iter().zip(expected.iter()) {
            let mut samples = HashMap::new();
            samples.insert(0u8, *input);
            engine.tick(&samples).expect("tick");
            let sinks = engine.graph_samples();
            assert_eq!(sinks[0].value, Value::Unsigned(*want));
        }
    }

    #[test]
    fn channel_holds_its_value_when_absent_from_a_tick() {
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
        let mut engine = build_engine(pipeline, vec![]);

        let mut samples = HashMap::new();
        samples.insert(0u8, 7u32);
        engine.tick(&samples).expect("tick");
        engine.tick(&HashMap::new()).expect("tick with no samples");

        assert_eq!(engine.graph_samples()[0].value, Value::Unsigned(7));
    }
}
