//! The acquisition controller: the `Idle -> Configuring -> Active ->
//! (Aborting ->) Idle` state machine described in §4.6. Single-threaded
//! and fully synchronous, per §5 — every method here returns as soon as
//! its work is done; nothing blocks or suspends.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dpp_calibration::{CalibrationEngine, CalibrationError, CalibrationReport, SourceCapabilities};
use dpp_pipeline::{resolve, DppSpec, Engine, Fifo, FilterRegistry, GraphSample};
use dpp_wire::{ChannelConfig, ErrorCode, Message, MessageType, Response, SourceConfig, Start};

use crate::error::ControllerError;
use crate::messages::{ControllerCommand, ControllerEvent, ControllerOutcome, DispatchContext};

/// Default depth of each channel's reassembly FIFO. Chosen generously
/// relative to the largest oversample ratios §4.5 deals in; a channel
/// genuinely outrunning this by more than a full buffer indicates the
/// slowest channel has stalled, which is itself the fatal condition
/// §7 wants surfaced loudly.
pub const DEFAULT_CHANNEL_BACKLOG: usize = 64;

/// Default time the controller waits for the device's `Abort`
/// acknowledgement before forcing a hard teardown.
pub const DEFAULT_ABORT_TIMEOUT: Duration = Duration::from_secs(10);

/// The device configuration the controller (re-)sends at the start of
/// calibration or acquisition: whatever `SourceConfig`/`ChannelConfig`
/// frames currently describe the hardware, plus the `Start` parameters
/// for the run about to begin.
#[derive(Debug, Clone)]
pub struct UserConfig {
    /// Per-source analog configuration currently in effect.
    pub source_configs: Vec<SourceConfig>,
    /// Per-channel digital configuration currently in effect.
    pub channel_configs: Vec<ChannelConfig>,
    /// Parameters for the `Start` frame this run will issue.
    pub start: Start,
}

/// The controller's state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No engine running; the device is not acquiring.
    Idle,
    /// A `start_*` call is resolving or validating; transient.
    Configuring,
    /// An engine (pipeline or calibration) is running.
    Active,
    /// `Abort` has been sent; waiting for the device's response.
    Aborting,
}

impl ControllerState {
    fn name(self) -> &'static str {
        match self {
            ControllerState::Idle => "Idle",
            ControllerState::Configuring => "Configuring",
            ControllerState::Active => "Active",
            ControllerState::Aborting => "Aborting",
        }
    }
}

enum ActiveEngine {
    Pipeline {
        engine: Engine,
        buffers: HashMap<u8, Fifo<u32>>,
        enabled_channels: Vec<u8>,
    },
    Calibration(CalibrationEngine),
}

/// Drives exactly one pipeline or calibration engine at a time, per the
/// device's current acquisition state.
pub struct AcquisitionController {
    state: ControllerState,
    active: Option<ActiveEngine>,
    channel_backlog: usize,
    abort_timeout: Duration,
    abort_deadline: Option<Instant>,
}

impl Default for AcquisitionController {
    fn default() -> Self {
        Self::new()
    }
}

impl AcquisitionController {
    /// A fresh, idle controller with default backlog and abort-timeout
    /// settings.
    pub fn new() -> Self {
        Self {
            state: ControllerState::Idle,
            active: None,
            channel_backlog: DEFAULT_CHANNEL_BACKLOG,
            abort_timeout: DEFAULT_ABORT_TIMEOUT,
            abort_deadline: None,
        }
    }

    /// Override the per-channel reassembly FIFO depth.
    pub fn with_channel_backlog(mut self, capacity: usize) -> Self {
        self.channel_backlog = capacity;
        self
    }

    /// Override how long `stop()` waits for the device's `Abort`
    /// acknowledgement before forcing a hard teardown.
    pub fn with_abort_timeout(mut self, timeout: Duration) -> Self {
        self.abort_timeout = timeout;
        self
    }

    /// The controller's current state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    fn require_idle(&self, operation: &'static str) -> Result<(), ControllerError> {
        if self.state != ControllerState::Idle {
            return Err(ControllerError::InvalidState {
                operation,
                state: self.state.name(),
            });
        }
        Ok(())
    }

    fn config_frames(config: &UserConfig) -> Vec<Message> {
        let mut frames = Vec::with_capacity(config.source_configs.len() + config.channel_configs.len() + 1);
        frames.extend(config.source_configs.iter().copied().map(Message::SourceConfig));
        frames.extend(config.channel_configs.iter().copied().map(Message::ChannelConfig));
        frames.push(Message::Start(config.start));
        frames
    }

    /// Instantiate a calibration engine tracking `channel_sources`, and
    /// return the frames to send: the current config, then `Start`.
    pub fn start_calibration(
        &mut self,
        config: UserConfig,
        channel_sources: &[(u8, u8)],
    ) -> Result<Vec<Message>, ControllerError> {
        self.require_idle("start_calibration")?;
        self.state = ControllerState::Configuring;

        let engine = CalibrationEngine::new(config.start.frequency as f64, channel_sources);
        let frames = Self::config_frames(&config);

        self.active = Some(ActiveEngine::Calibration(engine));
        self.state = ControllerState::Active;
        Ok(frames)
    }

    /// Resolve `setup_index` from `spec` via `registry`, instantiate a
    /// pipeline engine, and return the frames to send.
    pub fn start_acquisition(
        &mut self,
        config: UserConfig,
        spec: &DppSpec,
        setup_index: usize,
        registry: &FilterRegistry,
    ) -> Result<Vec<Message>, ControllerError> {
        self.require_idle("start_acquisition")?;

        let setup = spec
            .setup
            .get(setup_index)
            .ok_or(ControllerError::UnknownSetup { index: setup_index })?;

        self.state = ControllerState::Configuring;
        let plan = match resolve(spec, setup, config.start.frequency as f64, registry) {
            Ok(plan) => plan,
            Err(err) => {
                self.state = ControllerState::Idle;
                return Err(ControllerError::Config(err));
            }
        };

        let enabled_channels: Vec<u8> = plan.channel_slots.keys().copied().collect();
        let buffers = enabled_channels
            .iter()
            .map(|&ch| (ch, Fifo::new(self.channel_backlog, format!("channel {ch}"))))
            .collect();
        let engine = Engine::new(plan);
        let frames = Self::config_frames(&config);

        self.active = Some(ActiveEngine::Pipeline {
            engine,
            buffers,
            enabled_channels,
        });
        self.state = ControllerState::Active;
        Ok(frames)
    }

    /// Begin an orderly stop: send `Abort` and move to `Aborting`.
    /// Idempotent — repeat calls while already `Aborting` just resend
    /// `Abort` without disturbing the deadline.
    pub fn stop(&mut self, now: Instant) -> Result<Message, ControllerError> {
        match self.state {
            ControllerState::Active => {
                self.state = ControllerState::Aborting;
                self.abort_deadline = Some(now + self.abort_timeout);
                Ok(Message::Abort)
            }
            ControllerState::Aborting => Ok(Message::Abort),
            _ => Err(ControllerError::InvalidState {
                operation: "stop",
                state: self.state.name(),
            }),
        }
    }

    /// Handle an inbound `Response` frame.
    pub fn handle_response(&mut self, response: Response) -> ControllerEvent {
        let is_abort_ack = response.response_to == MessageType::Abort.to_val();
        if is_abort_ack && self.state == ControllerState::Aborting {
            if response.error_code == ErrorCode::Success {
                self.teardown();
                return ControllerEvent::Aborted;
            }
        }
        if response.error_code != ErrorCode::Success {
            return ControllerEvent::ResponseError {
                response_to: response.response_to,
                error_code: response.error_code,
            };
        }
        ControllerEvent::Acknowledged
    }

    /// Force a hard teardown if the `Abort` acknowledgement has not
    /// arrived within the configured timeout. Returns whether it fired.
    pub fn check_abort_timeout(&mut self, now: Instant) -> bool {
        if self.state != ControllerState::Aborting {
            return false;
        }
        match self.abort_deadline {
            Some(deadline) if now >= deadline => {
                self.teardown();
                true
            }
            _ => false,
        }
    }

    fn teardown(&mut self) {
        self.active = None;
        self.abort_deadline = None;
        self.state = ControllerState::Idle;
    }

    /// Feed fresh samples for `channel`, in device emission order.
    ///
    /// In pipeline mode this buffers into the channel's reassembly FIFO
    /// and drives one engine tick per complete round (every enabled
    /// channel has a buffered sample), returning the graph sink values
    /// for each tick produced. In calibration mode every sample is
    /// folded into the running min/max immediately and this always
    /// returns an empty list.
    pub fn push_samples(
        &mut self,
        channel: u8,
        samples: &[u32],
    ) -> Result<Vec<Vec<GraphSample>>, ControllerError> {
        match self.active.as_mut() {
            Some(ActiveEngine::Calibration(engine)) => {
                for &sample in samples {
                    engine.observe(channel, sample)?;
                }
                Ok(Vec::new())
            }
            Some(ActiveEngine::Pipeline {
                engine,
                buffers,
                enabled_channels,
            }) => {
                let buffer = buffers
                    .get_mut(&channel)
                    .ok_or(ControllerError::UnconfiguredChannel { channel })?;
                for &sample in samples {
                    buffer.write(sample)?;
                }

                let mut ticks = Vec::new();
                loop {
                    let all_ready = enabled_channels
                        .iter()
                        .all(|ch| !buffers[ch].is_empty());
                    if !all_ready {
                        break;
                    }
                    let mut round = HashMap::with_capacity(enabled_channels.len());
                    for &ch in enabled_channels.iter() {
                        let value = buffers
                            .get_mut(&ch)
                            .expect("enabled channel always has a buffer")
                            .read()?;
                        round.insert(ch, value);
                    }
                    engine.tick(&round)?;
                    ticks.push(engine.graph_samples());
                }
                Ok(ticks)
            }
            None => Err(ControllerError::InvalidState {
                operation: "push_samples",
                state: self.state.name(),
            }),
        }
    }

    /// Derive the calibration report from everything observed so far.
    /// Valid only while a calibration engine is active; does not by
    /// itself change state — call `stop()` afterward to tear down.
    pub fn finalize_calibration(
        &self,
        sources: &[SourceCapabilities],
    ) -> Result<CalibrationReport, ControllerError> {
        match &self.active {
            Some(ActiveEngine::Calibration(engine)) => {
                engine.finalize(sources).map_err(ControllerError::Calibration)
            }
            _ => Err(ControllerError::InvalidState {
                operation: "finalize_calibration",
                state: self.state.name(),
            }),
        }
    }

    /// Dispatch a [`ControllerCommand`], the mailbox-style entry point
    /// for callers queuing work from a reader thread. `ctx` is only
    /// consulted by `StartAcquisition`.
    pub fn dispatch(
        &mut self,
        command: ControllerCommand,
        ctx: &DispatchContext<'_>,
    ) -> Result<ControllerOutcome, ControllerError> {
        match command {
            ControllerCommand::StartCalibration {
                config,
                channel_sources,
            } => self
                .start_calibration(config, &channel_sources)
                .map(ControllerOutcome::Send),
            ControllerCommand::StartAcquisition { config, setup_index } => self
                .start_acquisition(config, ctx.spec, setup_index, ctx.registry)
                .map(ControllerOutcome::Send),
            ControllerCommand::Stop => self.stop(Instant::now()).map(|m| ControllerOutcome::Send(vec![m])),
            ControllerCommand::Response(response) => {
                Ok(ControllerOutcome::Event(self.handle_response(response)))
            }
            ControllerCommand::Samples { channel, data } => {
                self.push_samples(channel, &data).map(ControllerOutcome::Ticks)
            }
            ControllerCommand::CheckAbortTimeout { now } => {
                if self.check_abort_timeout(now) {
                    Ok(ControllerOutcome::TimedOut)
                } else {
                    Ok(ControllerOutcome::Nothing)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpp_pipeline::{
        ChannelBinding, Context, EmissionMode, FilterRegistry as Registry, GraphBinding, Node,
        PipelineDef, Rgb, Setup, Stage,
    };
    use dpp_wire::{DetectionMode, FlashMode};

    fn passthrough_config() -> (DppSpec, usize) {
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
            setup: vec![Setup {
                name: "s".to_string(),
                emission_mode: EmissionMode::Continuous,
                contexts: vec![Context {
                    pipeline: "passthrough".to_string(),
                    channels: vec![ChannelBinding {
                        label: "chan".to_string(),
                        channel_index: 0,
                    }],
                    graphs: vec![GraphBinding {
                        label: "graph".to_string(),
                        display_name: "Channel 0".to_string(),
                        color: dpp_pipeline::ColorSpec::Rgb(Rgb { r: 0, g: 0, b: 0 }),
                    }],
                }],
            }],
        };
        (spec, 0)
    }

    fn user_config() -> UserConfig {
        UserConfig {
            source_configs: vec![],
            channel_configs: vec![],
            start: Start {
                detection_mode: DetectionMode::Reflective,
                flash_mode: FlashMode::Continuous,
                frequency: 100,
                led_mask: 0,
                src_mask: 1,
            },
        }
    }

    #[test]
    fn full_lifecycle_reaches_idle_again() {
        let (spec, setup_index) = passthrough_config();
        let registry = Registry::with_builtins();
        let mut controller = AcquisitionController::new();

        let frames = controller
            .start_acquisition(user_config(), &spec, setup_index, &registry)
            .expect("start_acquisition");
        assert!(matches!(frames.last(), Some(Message::Start(_))));
        assert_eq!(controller.state(), ControllerState::Active);

        let ticks = controller.push_samples(0, &[7, 8]).expect("push_samples");
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0][0].value, dpp_pipeline::Value::Unsigned(7));
        assert_eq!(ticks[1][0].value, dpp_pipeline::Value::Unsigned(8));

        let now = Instant::now();
        let abort = controller.stop(now).expect("stop");
        assert!(matches!(abort, Message::Abort));
        assert_eq!(controller.state(), ControllerState::Aborting);

        let event = controller.handle_response(Response {
            response_to: MessageType::Abort.to_val(),
            error_code: ErrorCode::Success,
        });
        assert_eq!(event, ControllerEvent::Aborted);
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn cannot_start_while_active() {
        let (spec, setup_index) = passthrough_config();
        let registry = Registry::with_builtins();
        let mut controller = AcquisitionController::new();
        controller
            .start_acquisition(user_config(), &spec, setup_index, &registry)
            .expect("start_acquisition");

        let err = controller
            .start_acquisition(user_config(), &spec, setup_index, &registry)
            .expect_err("must reject a second start");
        assert!(matches!(err, ControllerError::InvalidState { .. }));
    }

    #[test]
    fn abort_timeout_forces_teardown() {
        let (spec, setup_index) = passthrough_config();
        let registry = Registry::with_builtins();
        let mut controller = AcquisitionController::new().with_abort_timeout(Duration::from_secs(1));
        controller
            .start_acquisition(user_config(), &spec, setup_index, &registry)
            .expect("start_acquisition");

        let t0 = Instant::now();
        controller.stop(t0).expect("stop");
        assert!(!controller.check_abort_timeout(t0));
        assert!(controller.check_abort_timeout(t0 + Duration::from_secs(2)));
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn non_success_response_is_reported_but_not_fatal() {
        let (spec, setup_index) = passthrough_config();
        let registry = Registry::with_builtins();
        let mut controller = AcquisitionController::new();
        controller
            .start_acquisition(user_config(), &spec, setup_index, &registry)
            .expect("start_acquisition");

        let event = controller.handle_response(Response {
            response_to: MessageType::SourceConfig.to_val(),
            error_code: ErrorCode::OutOfRange,
        });
        assert_eq!(
            event,
            ControllerEvent::ResponseError {
                response_to: MessageType::SourceConfig.to_val(),
                error_code: ErrorCode::OutOfRange,
            }
        );
        assert_eq!(controller.state(), ControllerState::Active);
    }

    #[test]
    fn unconfigured_channel_is_rejected() {
        let (spec, setup_index) = passthrough_config();
        let registry = Registry::with_builtins();
        let mut controller = AcquisitionController::new();
        controller
            .start_acquisition(user_config(), &spec, setup_index, &registry)
            .expect("start_acquisition");

        let err = controller.push_samples(5, &[1]).expect_err("must reject");
        assert!(matches!(
            err,
            ControllerError::UnconfiguredChannel { channel: 5 }
        ));
    }
}
