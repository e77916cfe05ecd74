//! The filter framework, declarative pipeline spec, resolver, and
//! engine that turn acquisition samples into graph-ready values
//! between the device and the diagnostic tooling.
//!
//! [`spec`] defines the shape a declarative configuration loads into;
//! [`resolver::resolve`] turns one [`spec::Setup`] into a flat
//! [`resolver::ResolvedPipeline`]; [`engine::Engine`] steps that plan
//! one sample tick at a time.

mod color;
mod engine;
mod error;
mod fifo;
mod filter;
mod filters;
mod resolver;
mod spec;
mod value;

pub use color::{hsv_to_rgb, ColorSpec, Rgb};
pub use engine::{Engine, GraphSample};
pub use error::{ConfigError, RuntimeError};
pub use fifo::Fifo;
pub use filter::{
    bool_param, double_param, validate_parameters, EndpointRole, EndpointSpec, FilterFactory,
    FilterInstance, FilterLifecycle, FilterRegistry, FilterSpec, FilterState,
};
pub use filters::INT32_MAX;
pub use resolver::{resolve, GraphSink, Origin, ResolvedPipeline};
pub use spec::{
    value_kind_name, ChannelBinding, Context, DppSpec, EmissionMode, FilterInstantiation,
    FilterLibraryEntry, GraphBinding, Node, PipelineDef, Setup, Stage,
};
pub use value::{lookup, Parameter, ParameterSpec, Value, ValueKind};
