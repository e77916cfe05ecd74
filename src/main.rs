//! `dpp-host`: a host runner tying [`bloodlight_dpp::config::AppConfig`]
//! and a [`bloodlight_dpp::transport::Transport`] to the acquisition
//! controller's event loop (§6 supplemental). Serial-port discovery
//! remains a non-goal, so `--demo` is the only way to drive this binary
//! today: it runs the controller against an in-process
//! [`bloodlight_dpp::transport::MockTransport`] instead of real
//! hardware.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bloodlight_dpp::{AppConfig, MockTransport, Transport};
use dpp_controller::{
    AcquisitionController, ControllerCommand, ControllerEvent, ControllerOutcome, DispatchContext,
    UserConfig,
};
use dpp_pipeline::{DppSpec, FilterRegistry};
use dpp_wire::{DetectionMode, ErrorCode, FlashMode, Message, MessageType, Response, Start};

/// Host-side runner for the acquisition device's data processing pipeline.
#[derive(Parser, Debug)]
#[command(name = "dpp-host", version, about)]
struct Cli {
    /// Path to the application config file (TOML).
    #[arg(long, default_value = "dpp-host.toml")]
    config: PathBuf,

    /// Path to the declarative pipeline spec (filters, pipelines, setups).
    #[arg(long)]
    spec: PathBuf,

    /// Index into the spec's `setup` list to run.
    #[arg(long, default_value_t = 0)]
    setup: usize,

    /// Drive the pipeline against the in-process mock transport,
    /// replaying a handful of synthetic sample ticks instead of reading
    /// from real hardware.
    #[arg(long)]
    demo: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let filter = EnvFilter::try_new(&config.application.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let spec_text = fs::read_to_string(&cli.spec)
        .with_context(|| format!("reading pipeline spec from {}", cli.spec.display()))?;
    let spec: DppSpec = serde_yaml::from_str(&spec_text).context("parsing pipeline spec")?;

    if !cli.demo {
        bail!("no serial transport is implemented yet; pass --demo to drive the mock transport fixture");
    }

    run_demo(&config, &spec, cli.setup)
}

fn run_demo(config: &AppConfig, spec: &DppSpec, setup_index: usize) -> Result<()> {
    let registry = FilterRegistry::with_builtins();
    let ctx = DispatchContext {
        spec,
        registry: &registry,
    };
    let mut controller = AcquisitionController::new()
        .with_channel_backlog(config.acquisition.channel_backlog)
        .with_abort_timeout(Duration::from_millis(config.acquisition.abort_timeout_ms));
    let mut transport = MockTransport::new();

    let channels = enabled_channel_indices(spec, setup_index)?;
    let user_config = UserConfig {
        source_configs: Vec::new(),
        channel_configs: Vec::new(),
        start: Start {
            detection_mode: DetectionMode::Reflective,
            flash_mode: FlashMode::Continuous,
            frequency: config.acquisition.default_frequency,
            led_mask: 0,
            src_mask: 1,
        },
    };

    match controller.dispatch(
        ControllerCommand::StartAcquisition {
            config: user_config,
            setup_index,
        },
        &ctx,
    )? {
        ControllerOutcome::Send(frames) => send_frames(&mut transport, &frames)?,
        other => tracing::warn!(?other, "unexpected outcome starting acquisition"),
    }

    for tick in 0..5u32 {
        for &channel in &channels {
            let sample = tick * 4 + u32::from(channel);
            match controller.dispatch(
                ControllerCommand::Samples {
                    channel,
                    data: vec![sample],
                },
                &ctx,
            )? {
                ControllerOutcome::Ticks(ticks) => {
                    for graph in ticks {
                        tracing::info!(?graph, tick, "pipeline tick");
                    }
                }
                other => tracing::warn!(?other, "unexpected outcome pushing samples"),
            }
        }
    }

    match controller.dispatch(ControllerCommand::Stop, &ctx)? {
        ControllerOutcome::Send(frames) => send_frames(&mut transport, &frames)?,
        other => tracing::warn!(?other, "unexpected outcome stopping"),
    }

    let abort_ack = Response {
        response_to: MessageType::Abort.to_val(),
        error_code: ErrorCode::Success,
    };
    match controller.dispatch(ControllerCommand::Response(abort_ack), &ctx)? {
        ControllerOutcome::Event(ControllerEvent::Aborted) => {
            tracing::info!("acquisition stopped cleanly");
        }
        other => tracing::warn!(?other, "unexpected outcome acknowledging abort"),
    }

    Ok(())
}

fn send_frames(transport: &mut dyn Transport, frames: &[Message]) -> Result<()> {
    for frame in frames {
        let bytes = dpp_wire::encode_to_vec(frame).context("encoding outbound frame")?;
        transport.write(&bytes)?;
    }
    Ok(())
}

fn enabled_channel_indices(spec: &DppSpec, setup_index: usize) -> Result<Vec<u8>> {
    let setup = spec
        .setup
        .get(setup_index)
        .with_context(|| format!("no setup at index {setup_index}"))?;
    let mut channels = Vec::new();
    for context in &setup.contexts {
        for binding in &context.channels {
            if !channels.contains(&binding.channel_index) {
                channels.push(binding.channel_index);
            }
        }
    }
    Ok(channels)
}
