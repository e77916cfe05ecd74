//! Command and outcome types for mailbox-style dispatch into the
//! controller.
//!
//! The controller's primary API is its direct `&mut self` methods; this
//! module exists for callers that want to queue commands from a reader
//! thread and drain them on the main thread's idle handler, per §5's
//! single-mailbox concurrency model. Unlike a multi-threaded actor,
//! dispatch here is synchronous: there is no channel or response
//! future, just an owned value in and an owned value out.

use std::time::Instant;

use dpp_pipeline::{DppSpec, FilterRegistry, GraphSample};
use dpp_wire::Response;

use crate::controller::UserConfig;

/// One command the controller can process.
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    /// Begin calibrating the sources named in `channel_sources`.
    StartCalibration {
        /// The device configuration to (re-)send before calibrating.
        config: UserConfig,
        /// `(channel, source)` pairs to track.
        channel_sources: Vec<(u8, u8)>,
    },
    /// Begin acquisition against a declarative setup.
    StartAcquisition {
        /// The device configuration to send before starting.
        config: UserConfig,
        /// Index into `spec.setup` naming the setup to run.
        setup_index: usize,
    },
    /// Request an orderly stop of the active engine.
    Stop,
    /// An inbound `Response` frame from the device.
    Response(Response),
    /// Fresh samples for one channel, in device emission order.
    Samples {
        /// The channel these samples belong to.
        channel: u8,
        /// Samples, oldest first.
        data: Vec<u32>,
    },
    /// Drive the abort timeout check from the caller's idle handler.
    CheckAbortTimeout {
        /// The current time.
        now: Instant,
    },
}

/// Something that happened in response to an inbound `Response` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    /// A non-`Abort` response was acknowledged; nothing else to do.
    Acknowledged,
    /// The device reported an error for a request that is not fatal to
    /// the controller.
    ResponseError {
        /// The `MessageType` discriminant the response answers.
        response_to: u8,
        /// The device's reported error code.
        error_code: dpp_wire::ErrorCode,
    },
    /// The pending `Abort` round-trip completed successfully; the
    /// controller has torn down and returned to `Idle`.
    Aborted,
}

/// The result of dispatching one [`ControllerCommand`].
#[derive(Debug, Clone)]
pub enum ControllerOutcome {
    /// Frames the caller must send to the device, in order.
    Send(Vec<dpp_wire::Message>),
    /// An event derived from an inbound `Response`.
    Event(ControllerEvent),
    /// Graph sink values produced by zero or more pipeline ticks this
    /// call triggered.
    Ticks(Vec<Vec<GraphSample>>),
    /// The abort timeout fired and the controller was force-reset.
    TimedOut,
    /// Nothing further to report (e.g. the abort deadline has not
    /// passed yet).
    Nothing,
}

/// Extra context `StartAcquisition` needs that does not fit the
/// command's own fields: the declarative spec and filter registry it
/// resolves against. Kept as a separate argument to
/// [`crate::controller::AcquisitionController::dispatch`] rather than
/// cloned into every command, since both are normally shared for the
/// whole process lifetime.
pub struct DispatchContext<'a> {
    /// The full declarative spec `setup_index` is resolved within.
    pub spec: &'a DppSpec,
    /// The filter implementations available to the resolver.
    pub registry: &'a FilterRegistry,
}
